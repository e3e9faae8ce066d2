//! End-to-end pipeline scenarios over mock audio sources and recognizers.

use larynx::audio::source::MockAudioSource;
use larynx::config::Config;
use larynx::error::LarynxError;
use larynx::pipeline::controller::{PipelineController, PipelineState};
use larynx::pipeline::types::RecognitionEvent;
use larynx::stt::recognizer::MockRecognizer;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

fn test_config() -> Config {
    let mut config = Config::default();
    // Small frames keep the mocks compact: 20ms at 16kHz = 320 samples.
    config.audio.frame_duration_ms = 20;
    config
}

fn partial(text: &str) -> RecognitionEvent {
    RecognitionEvent::Partial {
        text: text.to_string(),
    }
}

fn final_ev(text: &str) -> RecognitionEvent {
    RecognitionEvent::Final {
        text: text.to_string(),
    }
}

/// Controller over a finite mock source yielding `frames` frame-sized chunks.
fn controller_with(
    frames: usize,
    recognizer: MockRecognizer,
    config: Config,
) -> PipelineController {
    let frame_len = config.audio.frame_len();
    PipelineController::new(config, Box::new(recognizer), move |_audio| {
        Ok(Box::new(
            MockAudioSource::new().with_silence(frames, frame_len),
        ))
    })
    .unwrap()
}

fn wait_for_idle(controller: &PipelineController) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while controller.state() != PipelineState::Idle {
        assert!(Instant::now() < deadline, "pipeline never reached Idle");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn partials_then_final_commit_formatted_text() {
    let recognizer = MockRecognizer::new().with_script(vec![
        Some(partial("hel")),
        Some(partial("hello")),
        Some(final_ev("hello world")),
    ]);
    let controller = controller_with(3, recognizer, test_config());

    controller.start().unwrap();
    controller.stop().unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.committed, "Hello world.");
    assert_eq!(snapshot.pending, "");
    assert_eq!(controller.word_count(), 2);
}

#[test]
fn stop_flushes_in_progress_utterance() {
    // The engine never endpoints on its own; only the stop-driven flush
    // produces the final.
    let feed_counter = Arc::new(AtomicU64::new(0));
    let recognizer = MockRecognizer::new()
        .with_script(vec![Some(partial("unfinished")), None, None])
        .with_flush(final_ev("unfinished thought"))
        .with_feed_counter(feed_counter.clone())
        .with_feed_delay(Duration::from_millis(10));
    let controller = controller_with(3, recognizer, test_config());

    controller.start().unwrap();
    // Stop immediately: queued frames must still be fed, not discarded.
    controller.stop().unwrap();

    assert_eq!(feed_counter.load(Ordering::SeqCst), 3);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.committed, "Unfinished thought.");
    assert_eq!(snapshot.pending, "");
    assert_eq!(controller.state(), PipelineState::Idle);
}

#[test]
fn slow_recognizer_triggers_drop_oldest_backpressure() {
    let mut config = test_config();
    config.pipeline.audio_queue_frames = 2;

    let feed_counter = Arc::new(AtomicU64::new(0));
    let recognizer = MockRecognizer::new()
        .with_feed_counter(feed_counter.clone())
        .with_feed_delay(Duration::from_millis(30));
    // Far more frames than the queue holds, produced as fast as the capture
    // thread can read them.
    let controller = controller_with(20, recognizer, config);

    controller.start().unwrap();
    controller.stop().unwrap();

    let dropped = controller.dropped_frames();
    let fed = feed_counter.load(Ordering::SeqCst);
    assert!(dropped > 0, "expected drop-oldest to discard frames");
    // Every produced frame was either fed or counted as dropped.
    assert_eq!(fed + dropped, 20);
}

#[test]
fn stop_while_idle_is_a_noop() {
    let controller = controller_with(0, MockRecognizer::new(), test_config());
    assert!(controller.stop().is_ok());
    assert!(controller.stop().is_ok());
    assert_eq!(controller.state(), PipelineState::Idle);
}

#[test]
fn start_while_recording_is_busy() {
    let recognizer = MockRecognizer::new().with_feed_delay(Duration::from_millis(20));
    let controller = controller_with(10, recognizer, test_config());

    controller.start().unwrap();
    match controller.start() {
        Err(LarynxError::Busy { .. }) => {}
        other => panic!("expected Busy, got {other:?}"),
    }
    controller.stop().unwrap();
}

#[test]
fn start_failure_leaves_state_idle() {
    let controller = PipelineController::new(
        test_config(),
        Box::new(MockRecognizer::new()),
        |_audio| {
            Ok(Box::new(
                MockAudioSource::new()
                    .with_start_failure()
                    .with_error_message("default"),
            ))
        },
    )
    .unwrap();

    match controller.start() {
        Err(LarynxError::DeviceUnavailable { .. }) => {}
        other => panic!("expected DeviceUnavailable, got {other:?}"),
    }
    assert_eq!(controller.state(), PipelineState::Idle);

    // The failed attempt is recoverable: a later start on a healthy source
    // must not be poisoned by it.
    assert!(controller.stop().is_ok());
}

#[test]
fn clear_rejected_while_recording_allowed_when_idle() {
    let recognizer = MockRecognizer::new()
        .with_script(vec![Some(final_ev("hello world"))])
        .with_feed_delay(Duration::from_millis(20));
    let controller = controller_with(10, recognizer, test_config());

    controller.start().unwrap();
    match controller.clear() {
        Err(LarynxError::BufferBusy) => {}
        other => panic!("expected BufferBusy, got {other:?}"),
    }

    controller.stop().unwrap();
    assert!(!controller.snapshot().committed.is_empty());

    controller.clear().unwrap();
    assert_eq!(controller.word_count(), 0);
    assert_eq!(controller.snapshot().full_text(), "");
}

#[test]
fn committed_text_survives_session_cycles() {
    let frame_len = test_config().audio.frame_len();
    let session_count = Arc::new(AtomicU64::new(0));
    let sessions = session_count.clone();

    let recognizer = MockRecognizer::new().with_script(vec![Some(final_ev("first session"))]);
    let controller = PipelineController::new(
        test_config(),
        Box::new(recognizer),
        move |_audio| {
            sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockAudioSource::new().with_silence(2, frame_len)))
        },
    )
    .unwrap();

    controller.start().unwrap();
    controller.stop().unwrap();
    assert_eq!(controller.snapshot().committed, "First session.");

    // Subsequent sessions produce no events; teardown and setup must not
    // disturb the committed region or leak partial text across sessions.
    for _ in 0..3 {
        controller.start().unwrap();
        controller.stop().unwrap();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.committed, "First session.");
        assert_eq!(snapshot.pending, "");
    }
    assert_eq!(session_count.load(Ordering::SeqCst), 4);
}

#[test]
fn engine_error_forces_idle_and_surfaces_failure() {
    let recognizer = MockRecognizer::new()
        .with_script(vec![Some(partial("ok"))])
        .with_failure_at(1, "wrong sample rate");
    let controller = controller_with(5, recognizer, test_config());
    let errors = controller.errors();

    controller.start().unwrap();

    let err = errors
        .recv_timeout(Duration::from_secs(2))
        .expect("fatal error should be surfaced asynchronously");
    assert!(matches!(err, LarynxError::Engine { .. }));

    wait_for_idle(&controller);

    // The first stop after a failure reports it; afterwards stop is a no-op.
    match controller.stop() {
        Err(LarynxError::Engine { message }) => assert!(message.contains("wrong sample rate")),
        other => panic!("expected stored engine failure, got {other:?}"),
    }
    assert!(controller.stop().is_ok());

    // The session is recoverable by starting again.
    controller.start().unwrap();
    controller.stop().unwrap();
}

#[test]
fn drain_timeout_discards_late_output_after_idle() {
    let mut config = test_config();
    config.pipeline.drain_timeout_ms = 50;

    // The engine is far slower than the drain deadline, so stop() must
    // abandon the session mid-feed.
    let recognizer = MockRecognizer::new()
        .with_script(vec![Some(final_ev("stale utterance"))])
        .with_flush(final_ev("stale tail"))
        .with_feed_delay(Duration::from_millis(400));
    let controller = controller_with(2, recognizer, config);

    controller.start().unwrap();
    match controller.stop() {
        Err(LarynxError::DrainTimeout { timeout_ms }) => assert_eq!(timeout_ms, 50),
        other => panic!("expected DrainTimeout, got {other:?}"),
    }
    assert_eq!(controller.state(), PipelineState::Idle);
    assert!(controller.snapshot().full_text().is_empty());

    // The detached workers eventually finish the in-flight feed and drain the
    // remaining queue; none of that output may reach the buffer after Idle.
    std::thread::sleep(Duration::from_millis(900));
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.committed, "");
    assert_eq!(snapshot.pending, "");
    assert_eq!(controller.word_count(), 0);
}

#[test]
fn persistent_capture_failure_tears_session_down() {
    let controller = PipelineController::new(
        test_config(),
        Box::new(MockRecognizer::new()),
        |_audio| Ok(Box::new(MockAudioSource::new().with_read_failure())),
    )
    .unwrap();
    let errors = controller.errors();

    controller.start().unwrap();

    let err = errors
        .recv_timeout(Duration::from_secs(5))
        .expect("capture failure should be surfaced");
    assert!(matches!(err, LarynxError::AudioCapture { .. }));
    wait_for_idle(&controller);
}

#[test]
fn empty_hypotheses_never_reach_the_buffer() {
    let recognizer = MockRecognizer::new().with_script(vec![
        Some(partial("")),
        Some(final_ev("   ")),
        Some(partial("real text")),
    ]);
    let controller = controller_with(3, recognizer, test_config());

    controller.start().unwrap();
    controller.stop().unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.committed, "");
    assert_eq!(snapshot.pending, "real text");
    assert_eq!(controller.word_count(), 2);
}

#[test]
fn snapshot_polling_never_blocks_the_session() {
    // A display adapter polling at its own cadence must see monotonic
    // progress and consistent pairs while the pipeline runs.
    let recognizer = MockRecognizer::new()
        .with_script(vec![
            Some(partial("one")),
            Some(final_ev("one")),
            Some(partial("two")),
            Some(final_ev("two")),
        ])
        .with_feed_delay(Duration::from_millis(5));
    let controller = controller_with(4, recognizer, test_config());

    controller.start().unwrap();
    let mut last_committed_len = 0;
    for _ in 0..50 {
        let snapshot = controller.snapshot();
        assert!(snapshot.committed.len() >= last_committed_len);
        last_committed_len = snapshot.committed.len();
        std::thread::sleep(Duration::from_millis(2));
    }
    controller.stop().unwrap();

    assert_eq!(controller.snapshot().committed, "One. Two.");
}
