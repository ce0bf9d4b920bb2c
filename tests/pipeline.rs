use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{imageops, Rgb, RgbImage};
use lensfx::control::ControlSurface;
use lensfx::detect::{BoundingBox, ClassNames, Detection, DetectionResult, Detector, StaticBackend};
use lensfx::error::InferenceError;
use lensfx::pipeline::{EffectDispatcher, FramePipeline};
use lensfx::{DetectorConfig, Effect, EffectsConfig, Frame, FrameTiming, TaskState, TimeBase};

const RED: Rgb<u8> = Rgb([255, 0, 0]);

fn detector_config(detections: Vec<Detection>) -> DetectorConfig {
    DetectorConfig {
        static_latency_ms: 0,
        static_detections: detections,
        ..DetectorConfig::default()
    }
}

fn dispatcher(state: &TaskState, config: &DetectorConfig) -> EffectDispatcher {
    let detector = Detector::spawn(
        Box::new(StaticBackend::from_config(config)),
        Arc::new(ClassNames::coco()),
        config,
    )
    .unwrap();
    EffectDispatcher::new(state.reader(), EffectsConfig::default(), detector)
}

fn frame(sequence: u64) -> Frame {
    let image = RgbImage::from_fn(96, 72, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, 40]));
    let pts = sequence as i64 * 3_000;
    Frame::new(image, FrameTiming::new(pts, TimeBase::VIDEO_90KHZ)).with_sequence(sequence)
}

fn wait_idle(detector: &Detector) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while detector.is_busy() {
        assert!(Instant::now() < deadline, "inference never finished");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[tokio::test]
async fn control_changes_apply_on_the_next_frame() {
    let state = TaskState::default();
    let control = ControlSurface::new(state.clone());
    let pipeline = FramePipeline::new(dispatcher(&state, &detector_config(Vec::new())));

    let (in_tx, in_rx) = flume::bounded(1);
    let (out_tx, out_rx) = flume::bounded(1);
    let handle = tokio::spawn(pipeline.run(in_rx, out_tx));

    in_tx.send_async(frame(0)).await.unwrap();
    let first = out_rx.recv_async().await.unwrap();
    assert_eq!(first.image, frame(0).image);

    control.handle_json(r#"{"mirror": "true"}"#).unwrap();
    in_tx.send_async(frame(1)).await.unwrap();
    let second = out_rx.recv_async().await.unwrap();
    assert_eq!(second.image, imageops::flip_horizontal(&frame(1).image));
    assert_eq!(second.timing, frame(1).timing);

    control.set_effect("edges").unwrap();
    in_tx.send_async(frame(2)).await.unwrap();
    let third = out_rx.recv_async().await.unwrap();
    assert_ne!(third.image, second.image);
    assert_eq!(third.sequence, 2);

    drop(in_tx);
    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.frames, 3);
}

#[test]
fn detections_appear_on_the_following_frame() {
    let state = TaskState::default();
    let control = ControlSurface::new(state.clone());
    control.set_effect("detect").unwrap();

    let config = detector_config(vec![Detection::new(
        0,
        0.9,
        BoundingBox::new(20, 30, 40, 30),
    )]);
    let dispatcher = dispatcher(&state, &config);

    // Nothing has been detected yet.
    let first = dispatcher.process(frame(0));
    assert_eq!(first.image, frame(0).image);

    wait_idle(dispatcher.detector());
    let second = dispatcher.process(frame(1));
    assert_eq!(second.timing, frame(1).timing);
    assert_eq!(second.image.get_pixel(20, 45), &RED);
    assert_eq!(second.image.get_pixel(59, 45), &RED);
    // Interior keeps the source pixels.
    assert_eq!(second.image.get_pixel(40, 45), frame(1).image.get_pixel(40, 45));
}

#[test]
fn empty_results_clear_previous_boxes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    // One box on the first run, nothing afterwards.
    let backend = move |_: &Frame, _: f32, _: f32| -> Result<DetectionResult, InferenceError> {
        let detections = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            vec![Detection::new(0, 0.9, BoundingBox::new(20, 30, 40, 30))]
        } else {
            Vec::new()
        };
        Ok(DetectionResult::new(detections))
    };
    let config = detector_config(Vec::new());
    let detector = Detector::spawn(Box::new(backend), Arc::new(ClassNames::coco()), &config).unwrap();
    let state = TaskState::default();
    state.set_effect(Effect::Detect);
    let dispatcher = EffectDispatcher::new(state.reader(), EffectsConfig::default(), detector);

    assert_eq!(dispatcher.process(frame(0)).image, frame(0).image);
    wait_idle(dispatcher.detector());

    let boxed = dispatcher.process(frame(1));
    assert_eq!(boxed.image.get_pixel(20, 45), &RED);
    wait_idle(dispatcher.detector());
    assert!(dispatcher.detector().latest_result().is_empty());

    let cleared = dispatcher.process(frame(2));
    assert_eq!(cleared.image, frame(2).image);
    wait_idle(dispatcher.detector());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
