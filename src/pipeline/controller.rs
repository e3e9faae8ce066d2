//! Pipeline lifecycle: the Idle → Recording → Stopping state machine.
//!
//! The controller owns the worker threads of a recording session, wires the
//! bounded queues between them, and propagates cancellation. Data flow:
//!
//! ```text
//! AudioSource → frame queue → RecognizerStation → event queue → ReconcilerStation → TextBuffer
//! ```
//!
//! State transitions are driven only by explicit `start`/`stop` calls, with
//! one exception: a fatal worker error forces the machine back to Idle and
//! surfaces the failure, so it can never sit in Recording or Stopping
//! indefinitely.

use crate::audio::source::AudioSource;
use crate::buffer::{Snapshot, TextBuffer};
use crate::config::{AudioConfig, Config};
use crate::defaults;
use crate::error::{LarynxError, Result};
use crate::pipeline::error::{ChannelReporter, ErrorReporter};
use crate::pipeline::reconciler::ReconcilerStation;
use crate::pipeline::recognizer_station::{RecognizerStation, SharedRecognizer};
use crate::pipeline::station::StationRunner;
use crate::pipeline::types::AudioFrame;
use crate::stt::recognizer::Recognizer;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No workers running; the buffer may be read and cleared.
    Idle,
    /// Capture, recognition, and reconciliation workers are active.
    Recording,
    /// Capture closed; workers draining queued frames and events.
    Stopping,
}

impl PipelineState {
    fn as_u8(self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Recording => 1,
            PipelineState::Stopping => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Recording,
            2 => PipelineState::Stopping,
            _ => PipelineState::Idle,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "Idle",
            PipelineState::Recording => "Recording",
            PipelineState::Stopping => "Stopping",
        };
        f.write_str(name)
    }
}

/// Factory opening a fresh audio source for each recording session.
///
/// A source is single-session (not restartable once closed), so the
/// controller opens a new one on every `start`.
pub type SourceFactory = Box<dyn Fn(&AudioConfig) -> Result<Box<dyn AudioSource>> + Send + Sync>;

/// Worker threads and shared flags for one recording session.
struct Session {
    /// Halts frame production; cleared first on every stop.
    running: Arc<AtomicBool>,
    /// Marks this session as the current owner of the shared engine and
    /// buffer. Cleared when a drain timeout abandons the session, so detached
    /// workers stop feeding the engine and mutating the buffer.
    live: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    /// First fatal worker error, recorded by the watchdog.
    failure: Arc<Mutex<Option<LarynxError>>>,
}

/// Orchestrates the capture-to-text pipeline.
pub struct PipelineController {
    config: Config,
    buffer: Arc<TextBuffer>,
    recognizer: SharedRecognizer,
    source_factory: SourceFactory,
    /// Serializes start/stop/clear; held for the whole of a Stop drain, so a
    /// Start issued during Stopping queues until Idle is reached.
    control: Mutex<()>,
    state: Arc<AtomicU8>,
    session: Mutex<Option<Session>>,
    dropped_frames: Arc<AtomicU64>,
    notify_tx: Sender<LarynxError>,
    notify_rx: Receiver<LarynxError>,
}

impl PipelineController {
    /// Create a controller.
    ///
    /// The recognizer persists across sessions (model loading is expensive)
    /// and is reset at every `start`. Validates the configuration.
    pub fn new<F>(config: Config, recognizer: Box<dyn Recognizer>, source_factory: F) -> Result<Self>
    where
        F: Fn(&AudioConfig) -> Result<Box<dyn AudioSource>> + Send + Sync + 'static,
    {
        config.validate()?;
        let (notify_tx, notify_rx) = unbounded();

        Ok(Self {
            config,
            buffer: Arc::new(TextBuffer::new()),
            recognizer: Arc::new(Mutex::new(recognizer)),
            source_factory: Box::new(source_factory),
            control: Mutex::new(()),
            state: Arc::new(AtomicU8::new(PipelineState::Idle.as_u8())),
            session: Mutex::new(None),
            dropped_frames: Arc::new(AtomicU64::new(0)),
            notify_tx,
            notify_rx,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Consistent view of the transcription text.
    pub fn snapshot(&self) -> Snapshot {
        self.buffer.snapshot()
    }

    /// Word count across committed and pending text.
    pub fn word_count(&self) -> usize {
        self.buffer.word_count()
    }

    /// Shared handle to the text buffer, for display adapters that poll
    /// snapshots directly.
    pub fn buffer(&self) -> Arc<TextBuffer> {
        self.buffer.clone()
    }

    /// Frames dropped by backpressure during the current/last session.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::SeqCst)
    }

    /// Receiver for fatal worker errors surfaced asynchronously.
    ///
    /// Every fatal error also forces the state machine to Idle; a subsequent
    /// `stop` returns the same failure.
    pub fn errors(&self) -> Receiver<LarynxError> {
        self.notify_rx.clone()
    }

    /// Start a recording session.
    ///
    /// Returns `Busy` unless the pipeline is Idle. A Start issued while a
    /// Stop is draining blocks until Idle is reached, then proceeds. If the
    /// audio source cannot be opened the error is returned and the state
    /// stays Idle.
    pub fn start(&self) -> Result<()> {
        let _control = self.lock_control();

        if self.state() != PipelineState::Idle {
            return Err(LarynxError::Busy {
                state: self.state().to_string(),
            });
        }

        // Reap a session left behind by a fatal worker error.
        self.reap_session();

        let mut source = (self.source_factory)(&self.config.audio)?;
        source.start()?;

        {
            let mut engine = lock_recognizer(&self.recognizer)?;
            engine.reset();
        }
        // Residual partial text must not leak across sessions.
        self.buffer.set_pending("");
        self.dropped_frames.store(0, Ordering::SeqCst);

        let (audio_tx, audio_rx) = bounded(self.config.pipeline.audio_queue_frames);
        let (event_tx, event_rx) = bounded(self.config.pipeline.event_queue_len);
        let (fatal_tx, fatal_rx) = unbounded::<LarynxError>();

        let running = Arc::new(AtomicBool::new(true));
        let live = Arc::new(AtomicBool::new(true));
        let failure = Arc::new(Mutex::new(None));

        // Workers observe Recording before they spin up.
        self.state
            .store(PipelineState::Recording.as_u8(), Ordering::SeqCst);

        let capture_handle = spawn_capture(
            source,
            audio_tx,
            audio_rx.clone(),
            fatal_tx.clone(),
            running.clone(),
            self.dropped_frames.clone(),
            self.config.audio.frame_len(),
        );

        let reporter: Arc<dyn ErrorReporter> = Arc::new(ChannelReporter::new(fatal_tx));
        let recognizer_runner = StationRunner::spawn(
            RecognizerStation::new(self.recognizer.clone(), live.clone()),
            audio_rx,
            event_tx,
            reporter.clone(),
        );
        let reconciler_runner = StationRunner::spawn_terminal(
            ReconcilerStation::new(self.buffer.clone(), live.clone()),
            event_rx,
            reporter,
        );

        let watchdog_handle = spawn_watchdog(
            fatal_rx,
            running.clone(),
            live.clone(),
            self.state.clone(),
            failure.clone(),
            self.notify_tx.clone(),
        );

        let mut threads = vec![capture_handle];
        threads.extend(recognizer_runner.into_handle());
        threads.extend(reconciler_runner.into_handle());
        threads.push(watchdog_handle);

        *self.lock_session() = Some(Session {
            running,
            live,
            threads,
            failure,
        });

        Ok(())
    }

    /// Stop the current recording session, draining queued audio first.
    ///
    /// Stopping closes the audio source, lets workers consume already-queued
    /// frames in FIFO order, and flushes the recognizer so an in-progress
    /// utterance is committed rather than discarded. Calling `stop` while
    /// Idle is a no-op returning success, except that the first `stop` after
    /// a fatal worker error returns that failure.
    ///
    /// If the drain exceeds the configured timeout, remaining threads are
    /// detached and the session is marked stale so their late outputs are
    /// discarded instead of reaching the shared engine or buffer; the state
    /// still reaches Idle, and `DrainTimeout` is returned as a non-fatal
    /// report.
    pub fn stop(&self) -> Result<()> {
        let _control = self.lock_control();

        let session = match self.lock_session().take() {
            Some(session) => session,
            None => return Ok(()),
        };

        // A fatal error may have forced Idle already; in that case this is
        // just a reap that surfaces the stored failure.
        let was_recording = self.state() == PipelineState::Recording;
        if was_recording {
            self.state
                .store(PipelineState::Stopping.as_u8(), Ordering::SeqCst);
        }

        session.running.store(false, Ordering::SeqCst);

        let timeout_ms = self.config.pipeline.drain_timeout_ms;
        let timed_out = !join_with_deadline(
            session.threads,
            Duration::from_millis(timeout_ms),
        );
        if timed_out {
            // Detached workers still hold the shared engine and buffer
            // handles; marking the session stale makes them discard whatever
            // they were draining instead of writing it after Idle.
            session.live.store(false, Ordering::SeqCst);
        }

        self.state
            .store(PipelineState::Idle.as_u8(), Ordering::SeqCst);

        let failure = session
            .failure
            .lock()
            .map(|mut f| f.take())
            .unwrap_or(None);
        if let Some(err) = failure {
            return Err(err);
        }
        if timed_out {
            return Err(LarynxError::DrainTimeout { timeout_ms });
        }
        Ok(())
    }

    /// Atomically empty both text regions.
    ///
    /// Policy: rejected with `BufferBusy` unless the pipeline is Idle;
    /// clearing mid-utterance is never deferred.
    pub fn clear(&self) -> Result<()> {
        let _control = self.lock_control();

        if self.state() != PipelineState::Idle {
            return Err(LarynxError::BufferBusy);
        }
        self.buffer.clear();
        Ok(())
    }

    /// Join the threads of a session whose workers already exited.
    fn reap_session(&self) {
        if let Some(session) = self.lock_session().take() {
            session.running.store(false, Ordering::SeqCst);
            for handle in session.threads {
                if handle.join().is_err() {
                    eprintln!("larynx: pipeline thread panicked during reap");
                }
            }
        }
    }

    fn lock_control(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        if self.state() != PipelineState::Idle {
            let _ = self.stop();
        } else {
            self.reap_session();
        }
    }
}

fn lock_recognizer(
    recognizer: &SharedRecognizer,
) -> Result<std::sync::MutexGuard<'_, Box<dyn Recognizer>>> {
    recognizer.lock().map_err(|_| LarynxError::Engine {
        message: "recognizer lock poisoned".to_string(),
    })
}

/// Spawn the capture thread.
///
/// Polls the source, assembles fixed-size frames, and pushes them into the
/// bounded frame queue with drop-oldest backpressure: a full queue discards
/// its oldest unread frame and increments the drop counter, so the capture
/// path never blocks on a slow recognizer. Live sources exit when the running
/// flag clears; finite sources are drained to exhaustion so every queued
/// chunk is transcribed. Persistent read failures are fatal. On exit the
/// thread stops the source and drops the sender so downstream workers drain.
fn spawn_capture(
    mut source: Box<dyn AudioSource>,
    audio_tx: Sender<AudioFrame>,
    audio_rx: Receiver<AudioFrame>,
    fatal_tx: Sender<LarynxError>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    frame_len: usize,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let poll_interval = defaults::CAPTURE_POLL_INTERVAL;
        let finite = source.is_finite();
        let mut pending: Vec<i16> = Vec::with_capacity(frame_len * 2);
        let mut sequence: u64 = 0;
        let mut consecutive_errors: u32 = 0;

        'capture: while finite || running.load(Ordering::SeqCst) {
            let samples = match source.read_samples() {
                Ok(samples) => {
                    consecutive_errors = 0;
                    samples
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= defaults::MAX_CONSECUTIVE_READ_ERRORS {
                        eprintln!(
                            "larynx: audio capture failed {consecutive_errors} times in a row: {e}"
                        );
                        let _ = fatal_tx.send(e);
                        break;
                    }
                    thread::sleep(poll_interval);
                    continue;
                }
            };

            if samples.is_empty() {
                if finite {
                    // File/mock source exhausted.
                    break;
                }
                // Live microphone: empty reads are normal while the device
                // initializes. Keep polling.
                thread::sleep(poll_interval);
                continue;
            }

            pending.extend_from_slice(&samples);
            while pending.len() >= frame_len {
                let frame_samples: Vec<i16> = pending.drain(..frame_len).collect();
                let frame = AudioFrame::new(frame_samples, Instant::now(), sequence);
                sequence += 1;
                if !push_drop_oldest(&audio_tx, &audio_rx, &dropped, frame) {
                    break 'capture;
                }
            }

            if !finite {
                thread::sleep(poll_interval);
            }
        }

        // A trailing sub-frame still carries speech; send it rather than
        // silently discarding the tail of the last utterance.
        if !pending.is_empty() {
            let frame = AudioFrame::new(pending, Instant::now(), sequence);
            let _ = push_drop_oldest(&audio_tx, &audio_rx, &dropped, frame);
        }

        if let Err(e) = source.stop() {
            eprintln!("larynx: failed to stop audio capture: {e}");
        }
        // audio_tx drops here; downstream sees end-of-input and drains.
    })
}

/// Non-blocking enqueue with drop-oldest backpressure.
///
/// Returns false when the consumer is gone.
fn push_drop_oldest(
    tx: &Sender<AudioFrame>,
    rx: &Receiver<AudioFrame>,
    dropped: &AtomicU64,
    frame: AudioFrame,
) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(frame)) => {
            // Discard the oldest unread frame to make room.
            if rx.try_recv().is_ok() {
                dropped.fetch_add(1, Ordering::SeqCst);
            }
            match tx.try_send(frame) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    // Consumer raced a refill; count this frame as dropped.
                    dropped.fetch_add(1, Ordering::SeqCst);
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Spawn the session watchdog.
///
/// Blocks on the fatal-error channel. On a fatal worker error it halts
/// capture, forces Recording → Idle, records the failure for the next `stop`
/// call, and forwards a copy to the async notification channel. Exits when
/// every fatal sender drops (normal teardown).
fn spawn_watchdog(
    fatal_rx: Receiver<LarynxError>,
    running: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    failure: Arc<Mutex<Option<LarynxError>>>,
    notify_tx: Sender<LarynxError>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Ok(err) = fatal_rx.recv() {
            // A stale session's failures must not touch its successor's state.
            if !live.load(Ordering::SeqCst) {
                return;
            }
            running.store(false, Ordering::SeqCst);
            // Only force Idle from Recording; an in-flight Stop owns the
            // Stopping → Idle transition.
            let _ = state.compare_exchange(
                PipelineState::Recording.as_u8(),
                PipelineState::Idle.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            let copy = duplicate_error(&err);
            if let Ok(mut slot) = failure.lock() {
                *slot = Some(err);
            }
            let _ = notify_tx.send(copy);
            // Drain further fatals; the first one owns the teardown.
            while fatal_rx.recv().is_ok() {}
        }
    })
}

/// Duplicate an error for the async notification channel.
///
/// The taxonomy is small enough that a structural copy of the fatal-capable
/// variants beats making the whole enum Clone.
fn duplicate_error(err: &LarynxError) -> LarynxError {
    match err {
        LarynxError::DeviceUnavailable { device } => LarynxError::DeviceUnavailable {
            device: device.clone(),
        },
        LarynxError::AudioCapture { message } => LarynxError::AudioCapture {
            message: message.clone(),
        },
        LarynxError::Engine { message } => LarynxError::Engine {
            message: message.clone(),
        },
        other => LarynxError::Other(other.to_string()),
    }
}

/// Join threads, polling within a deadline.
///
/// Returns true when all threads finished; past the deadline the remaining
/// handles are dropped, detaching those threads so they die with the process.
fn join_with_deadline(mut threads: Vec<JoinHandle<()>>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let poll_interval = Duration::from_millis(10);

    loop {
        let mut remaining = Vec::new();
        for handle in threads.drain(..) {
            if handle.is_finished() {
                if handle.join().is_err() {
                    eprintln!("larynx: pipeline thread panicked");
                }
            } else {
                remaining.push(handle);
            }
        }
        threads = remaining;

        if threads.is_empty() {
            return true;
        }
        if Instant::now() >= deadline {
            eprintln!(
                "larynx: drain timeout, {} thread(s) still running, detaching",
                threads.len()
            );
            return false;
        }
        thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> AudioFrame {
        AudioFrame::new(vec![0; 4], Instant::now(), sequence)
    }

    #[test]
    fn test_push_drop_oldest_discards_oldest_on_full() {
        let (tx, rx) = bounded(2);
        let dropped = AtomicU64::new(0);

        assert!(push_drop_oldest(&tx, &rx, &dropped, frame(0)));
        assert!(push_drop_oldest(&tx, &rx, &dropped, frame(1)));
        assert_eq!(dropped.load(Ordering::SeqCst), 0);

        // Queue full: frame 0 is discarded, frame 2 enqueued.
        assert!(push_drop_oldest(&tx, &rx, &dropped, frame(2)));
        assert_eq!(dropped.load(Ordering::SeqCst), 1);

        let sequences: Vec<u64> = rx.try_iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn test_push_drop_oldest_detects_disconnect() {
        let (tx, rx) = bounded(2);
        let dropped = AtomicU64::new(0);
        drop(rx);

        let (_keep_tx, other_rx) = bounded::<AudioFrame>(2);
        assert!(!push_drop_oldest(&tx, &other_rx, &dropped, frame(0)));
    }

    #[test]
    fn test_join_with_deadline_reports_timeout() {
        let slow = thread::spawn(|| thread::sleep(Duration::from_millis(500)));
        assert!(!join_with_deadline(
            vec![slow],
            Duration::from_millis(20)
        ));

        let fast = thread::spawn(|| {});
        assert!(join_with_deadline(vec![fast], Duration::from_millis(500)));
    }

    #[test]
    fn test_state_u8_roundtrip() {
        for state in [
            PipelineState::Idle,
            PipelineState::Recording,
            PipelineState::Stopping,
        ] {
            assert_eq!(PipelineState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Idle.to_string(), "Idle");
        assert_eq!(PipelineState::Recording.to_string(), "Recording");
        assert_eq!(PipelineState::Stopping.to_string(), "Stopping");
    }

    #[test]
    fn test_duplicate_error_preserves_variant() {
        let original = LarynxError::DeviceUnavailable {
            device: "default".to_string(),
        };
        assert!(matches!(
            duplicate_error(&original),
            LarynxError::DeviceUnavailable { .. }
        ));

        let fallback = duplicate_error(&LarynxError::BufferBusy);
        assert!(matches!(fallback, LarynxError::Other(_)));
    }
}
