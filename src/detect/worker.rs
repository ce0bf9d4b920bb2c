//! Detection worker owning at most one in-flight inference job per stream.
//!
//! The frame cycle calls [`Detector::submit_and_get_annotated`] once per
//! frame. When the worker is idle the frame is copied, annotated with the
//! previous result and handed to the background thread; when a job is
//! already running nothing is queued and the last result is drawn again.
//! Either way the call returns immediately.
//!
//! The background thread publishes into a mutex-guarded slot it only
//! references weakly, so a detector can be dropped mid-inference: the job
//! runs to completion and its result is discarded.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::capture::Frame;
use crate::detect::annotate::Renderer;
use crate::detect::backend::InferenceBackend;
use crate::detect::result::{ClassNames, DetectionResult};
use crate::error::{Error, InferenceError, Result};
use crate::{DetectorConfig, StaleFramePolicy};

static NEXT_DETECTOR_ID: AtomicU64 = AtomicU64::new(1);

/// A frame copy with the detections that were drawn onto it.
#[derive(Debug, Clone)]
pub struct AnnotatedSnapshot {
    /// Pixels as captured, without annotations.
    pub source: Frame,
    pub annotated: Frame,
    pub result: Arc<DetectionResult>,
}

#[derive(Default)]
struct Slot {
    busy: bool,
    job_started: Option<Instant>,
    stall_reported: bool,
    worker_gone: bool,
    result: Arc<DetectionResult>,
    snapshot: Option<AnnotatedSnapshot>,
}

struct Job {
    frame: Frame,
}

/// Per-stream detector: the caller side of the worker.
pub struct Detector {
    id: u64,
    slot: Arc<Mutex<Slot>>,
    jobs: Sender<Job>,
    renderer: Arc<Renderer>,
    policy: StaleFramePolicy,
    stall_warning: Option<Duration>,
}

impl Detector {
    /// Start the worker thread for `backend`.
    pub fn spawn(
        backend: Box<dyn InferenceBackend>,
        names: Arc<ClassNames>,
        config: &DetectorConfig,
    ) -> Result<Self> {
        let id = NEXT_DETECTOR_ID.fetch_add(1, Ordering::Relaxed);
        let (jobs_tx, jobs_rx) = flume::bounded(1);
        let slot = Arc::new(Mutex::new(Slot::default()));
        let renderer = Arc::new(Renderer::new(names, config.label_scale));

        let worker = Worker {
            id,
            backend,
            jobs: jobs_rx,
            slot: Arc::downgrade(&slot),
            renderer: renderer.clone(),
            confidence_threshold: config.confidence_threshold,
            suppression_threshold: config.suppression_threshold,
        };

        // Never joined: the thread exits on its own once `jobs` is closed.
        thread::Builder::new()
            .name(format!("detector-{id}"))
            .spawn(move || worker.run())
            .map_err(Error::WorkerSpawn)?;

        info!(detector = id, policy = ?config.stale_frames, "Detector started");

        Ok(Self {
            id,
            slot,
            jobs: jobs_tx,
            renderer,
            policy: config.stale_frames,
            stall_warning: config.stall_warning_ms.map(Duration::from_millis),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Annotated frame for this cycle. Starts a new inference job on `frame`
    /// when none is running. Never waits for inference.
    pub fn submit_and_get_annotated(&self, frame: Frame) -> Frame {
        let mut slot = lock(&self.slot);

        if slot.busy {
            self.check_stall(&mut slot);
            let base = match (self.policy, slot.snapshot.as_ref()) {
                (StaleFramePolicy::Frozen, Some(snapshot)) => snapshot.source.clone(),
                _ => frame,
            };
            return self.renderer.render(base, &slot.result);
        }

        let result = slot.result.clone();
        let source = frame.clone();
        let annotated = self.renderer.render(frame.clone(), &result);

        match self.jobs.try_send(Job { frame }) {
            Ok(()) => {
                slot.busy = true;
                slot.job_started = Some(Instant::now());
                slot.stall_reported = false;
            }
            Err(TrySendError::Full(_)) => {
                debug!(detector = self.id, "Job queue unexpectedly full, skipping frame");
            }
            Err(TrySendError::Disconnected(_)) => {
                if !slot.worker_gone {
                    warn!(
                        detector = self.id,
                        "Detector worker has stopped; serving the last result"
                    );
                    slot.worker_gone = true;
                }
            }
        }

        slot.snapshot = Some(AnnotatedSnapshot {
            source,
            annotated: annotated.clone(),
            result,
        });
        annotated
    }

    /// True while an inference job is in flight.
    pub fn is_busy(&self) -> bool {
        lock(&self.slot).busy
    }

    pub fn latest_result(&self) -> Arc<DetectionResult> {
        lock(&self.slot).result.clone()
    }

    pub fn snapshot(&self) -> Option<AnnotatedSnapshot> {
        lock(&self.slot).snapshot.clone()
    }

    fn check_stall(&self, slot: &mut Slot) {
        let (Some(limit), Some(started)) = (self.stall_warning, slot.job_started) else {
            return;
        };
        let elapsed = started.elapsed();
        if !slot.stall_reported && elapsed >= limit {
            warn!(
                detector = self.id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Inference is taking unusually long; still serving the previous result"
            );
            slot.stall_reported = true;
        }
    }
}

struct Worker {
    id: u64,
    backend: Box<dyn InferenceBackend>,
    jobs: Receiver<Job>,
    slot: Weak<Mutex<Slot>>,
    renderer: Arc<Renderer>,
    confidence_threshold: f32,
    suppression_threshold: f32,
}

impl Worker {
    fn run(mut self) {
        if let Err(err) = self.backend.warm_up() {
            warn!(detector = self.id, backend = self.backend.name(), "Warm-up failed: {err}");
        }

        while let Ok(job) = self.jobs.recv() {
            let started = Instant::now();
            let result = Arc::new(self.infer(&job.frame));
            let elapsed = started.elapsed();
            metrics::histogram!("inference_time_us").record(elapsed.as_micros() as f64);
            debug!(
                detector = self.id,
                detections = result.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Inference finished"
            );

            let Some(slot) = self.slot.upgrade() else {
                debug!(detector = self.id, "Detector released mid-inference, dropping result");
                break;
            };

            let (result, annotated) = self.annotate(&job.frame, result);
            let mut slot = lock(&slot);
            slot.result = result.clone();
            slot.snapshot = Some(AnnotatedSnapshot {
                source: job.frame,
                annotated,
                result,
            });
            slot.busy = false;
            slot.job_started = None;
        }

        debug!(detector = self.id, "Detector worker exiting");
    }

    /// Draw `result` onto a copy of `frame`. A renderer panic publishes an
    /// empty result instead, so the slot always returns to idle.
    fn annotate(
        &self,
        frame: &Frame,
        result: Arc<DetectionResult>,
    ) -> (Arc<DetectionResult>, Frame) {
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
            self.renderer.render(frame.clone(), &result)
        }));
        match rendered {
            Ok(annotated) => (result, annotated),
            Err(payload) => {
                warn!(
                    detector = self.id,
                    "Drawing detections failed, treating as no detections: {}",
                    panic_message(payload.as_ref())
                );
                (Arc::default(), frame.clone())
            }
        }
    }

    /// Failures and panics become an empty result.
    fn infer(&mut self, frame: &Frame) -> DetectionResult {
        metrics::counter!("inference_runs_total").increment(1);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.backend
                .infer(frame, self.confidence_threshold, self.suppression_threshold)
        }))
        .unwrap_or_else(|payload| Err(InferenceError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(result) => result,
            Err(err) => {
                metrics::counter!("inference_failures_total").increment(1);
                warn!(
                    detector = self.id,
                    backend = self.backend.name(),
                    "Inference failed, treating as no detections: {err}"
                );
                DetectionResult::default()
            }
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".into()
    }
}
