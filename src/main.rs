//! lensfx: live video effects driven by runtime control requests

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use color_eyre::Result;
use flume::bounded;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use lensfx::capture::TestPattern;
use lensfx::control::ControlSurface;
use lensfx::detect::{ClassNames, Detector, StaticBackend};
use lensfx::pipeline::{EffectDispatcher, FramePipeline};
use lensfx::{Config, Frame, TaskState};

#[derive(Debug, Parser)]
#[command(version, about = "Apply selectable effects to a live frame stream")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "LENSFX_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configured filter
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let filter = if cli.verbose {
        EnvFilter::new("lensfx=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("lensfx launching...");
    debug!(?config, "Configuration loaded");

    let state = TaskState::new(config.control.initial());
    let names = Arc::new(ClassNames::load(config.detector.class_names.as_deref())?);
    info!(classes = names.len(), "Class names loaded");

    let detector = Detector::spawn(
        Box::new(StaticBackend::from_config(&config.detector)),
        names,
        &config.detector,
    )?;
    let dispatcher = EffectDispatcher::new(state.reader(), config.effects.clone(), detector);

    let (source_tx, source_rx) = bounded::<Frame>(config.pipeline.channel_capacity);
    let (sink_tx, sink_rx) = bounded::<Frame>(config.pipeline.channel_capacity);

    tokio::spawn(TestPattern::new(config.source.clone()).run(source_tx));
    let reporter = tokio::spawn(report(sink_rx, config.pipeline.report_every));
    let control = ControlSurface::new(state);
    thread::Builder::new()
        .name("control".into())
        .spawn(move || control_loop(control))?;
    let pipeline = tokio::spawn(FramePipeline::new(dispatcher).run(source_rx, sink_tx));

    tokio::select! {
        joined = pipeline => {
            let stats = joined??;
            reporter.await?;
            info!(
                frames = stats.frames,
                elapsed_s = stats.elapsed.as_secs_f64(),
                "Stream finished"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted");
        }
    }

    info!("lensfx shutting down");
    Ok(())
}

/// Drain processed frames, logging throughput every `every` frames.
async fn report(frames: flume::Receiver<Frame>, every: u64) {
    let started = Instant::now();
    let mut count = 0u64;

    while let Ok(frame) = frames.recv_async().await {
        count += 1;
        let latency = frame.captured_at.elapsed();
        metrics::histogram!("frame_latency_us").record(latency.as_micros() as f64);

        if every > 0 && count % every == 0 {
            info!(
                frames = count,
                fps = count as f64 / started.elapsed().as_secs_f64(),
                latency_ms = latency.as_secs_f64() * 1_000.0,
                pts = ?frame.timing.pts,
                "Throughput"
            );
        }
    }
}

/// Apply newline-delimited JSON control requests from stdin, answering each
/// on stdout. Blocks on stdin, so it gets a thread of its own.
fn control_loop(control: ControlSurface) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("Control input failed: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match control.handle_json(&line) {
            Ok(response) => serde_json::to_value(response),
            Err(err) => Ok(serde_json::json!({ "error": err.to_string() })),
        };
        let Ok(reply) = reply else { continue };

        let mut stdout = io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{reply}").and_then(|()| stdout.flush()) {
            warn!("Control output failed: {err}");
            break;
        }
    }

    debug!("Control input closed");
}
