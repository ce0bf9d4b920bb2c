use std::time::Instant;

use tracing::trace;

/// Run `f`, recording its duration under the `stage_time_us` histogram.
pub fn timed<T>(stage: &'static str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    let elapsed = start.elapsed();
    metrics::histogram!("stage_time_us", "stage" => stage).record(elapsed.as_micros() as f64);
    trace!("{} took {:.3} ms", stage, elapsed.as_secs_f64() * 1_000.0);
    out
}
