//! Continuous speech capture
//!
//! A [`Recognizer`] captures one utterance per `start` and reports through
//! [`RecognitionEvent`]s. [`CaptureController`] turns that per-utterance
//! segmentation into continuous listening by restarting the recognizer on
//! every `End` while its `listening` flag is still set.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::segmenter::UtteranceSegmenter;
use super::stt::SpeechToText;
use crate::{Error, Result};

/// How often the microphone buffer is drained
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pause after a device fault before reporting `End`
const FAULT_BACKOFF: Duration = Duration::from_millis(500);

/// What the recognition platform reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Best current guess for an in-progress utterance (may be empty)
    Interim(String),
    /// Complete transcript for one utterance
    Final(String),
    /// The platform stopped capturing
    End,
    /// The platform hit a fault; `End` follows
    Error(String),
}

/// Host speech recognition capability
pub trait Recognizer: Send + Sync {
    /// Begin capturing one utterance, reporting on `events`
    ///
    /// Starting while already capturing is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if capture cannot begin
    fn start(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<()>;

    /// Ask the platform to halt; an `End` may still follow
    fn stop(&self);

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Callback receiving a transcript
pub type TranscriptCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Default)]
struct ListenState {
    listening: bool,
    on_interim: Option<TranscriptCallback>,
    on_final: Option<TranscriptCallback>,
}

/// Owns the single capture session and its continuity
pub struct CaptureController {
    recognizer: Option<Arc<dyn Recognizer>>,
    events: mpsc::UnboundedSender<RecognitionEvent>,
    state: Mutex<ListenState>,
}

impl CaptureController {
    /// Create a controller and the receiver its recognizer reports into
    ///
    /// Feed the receiver to [`CaptureController::pump`]. `None` means the
    /// host has no capture capability; listening then only logs an error.
    #[must_use]
    pub fn new(
        recognizer: Option<Arc<dyn Recognizer>>,
    ) -> (Self, mpsc::UnboundedReceiver<RecognitionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            recognizer,
            events,
            state: Mutex::new(ListenState::default()),
        };
        (controller, rx)
    }

    /// Begin continuous capture
    ///
    /// An active capture is stopped first, so calling this twice restarts
    /// rather than queues. Never fails: problems are logged.
    pub fn start_listening(&self, on_interim: TranscriptCallback, on_final: TranscriptCallback) {
        let Some(recognizer) = &self.recognizer else {
            tracing::error!("speech recognition is not available on this host");
            return;
        };

        let was_listening = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            let was = state.listening;
            state.listening = true;
            state.on_interim = Some(on_interim);
            state.on_final = Some(on_final);
            was
        };

        if was_listening {
            recognizer.stop();
        }

        tracing::debug!(backend = recognizer.name(), "listening");
        if let Err(e) = recognizer.start(self.events.clone()) {
            tracing::error!(error = %e, "failed to start speech recognition");
        }
    }

    /// Stop capture; a later `End` will not restart it
    pub fn stop_listening(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.listening = false;
        }

        if let Some(recognizer) = &self.recognizer {
            recognizer.stop();
        }
        tracing::debug!("stopped listening");
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state.lock().is_ok_and(|s| s.listening)
    }

    /// Apply one platform event
    pub fn handle_event(&self, event: RecognitionEvent) {
        // Callbacks run outside the lock so they may call back into us.
        let (listening, on_interim, on_final) = match self.state.lock() {
            Ok(state) => (
                state.listening,
                state.on_interim.clone(),
                state.on_final.clone(),
            ),
            Err(_) => return,
        };

        match event {
            RecognitionEvent::Interim(text) => {
                if let (true, Some(cb)) = (listening, on_interim) {
                    cb(text);
                }
            }
            RecognitionEvent::Final(text) => {
                if let (true, Some(cb)) = (listening, on_final) {
                    cb(text);
                }
            }
            RecognitionEvent::End => self.restart_if_listening(),
            RecognitionEvent::Error(message) => {
                tracing::warn!(error = %message, "speech recognition error");
            }
        }
    }

    /// Deliver events from `rx` until every sender is gone
    pub async fn pump(&self, mut rx: mpsc::UnboundedReceiver<RecognitionEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
    }

    fn restart_if_listening(&self) {
        // Read the flag now, not when the stop was issued.
        if !self.is_listening() {
            tracing::trace!("capture ended");
            return;
        }

        if let Some(recognizer) = &self.recognizer {
            tracing::trace!("capture ended while listening, restarting");
            if let Err(e) = recognizer.start(self.events.clone()) {
                tracing::error!(error = %e, "failed to restart speech recognition");
            }
        }
    }
}

/// Microphone recognizer: energy segmentation plus Whisper transcription
///
/// Each `start` runs a capture thread that records one utterance, uploads it
/// and reports `Final(text)` then `End`. Whisper has no partial results; a
/// burst of sound too short to be speech is reported as an empty `Interim`.
pub struct MicRecognizer {
    stt: Arc<SpeechToText>,
    runtime: tokio::runtime::Handle,
    active: Mutex<Option<CancellationToken>>,
}

impl MicRecognizer {
    /// Create a recognizer bound to the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns error if called outside a tokio runtime
    pub fn new(stt: SpeechToText) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Unavailable(format!("no async runtime: {e}")))?;

        Ok(Self {
            stt: Arc::new(stt),
            runtime,
            active: Mutex::new(None),
        })
    }
}

impl Recognizer for MicRecognizer {
    fn start(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<()> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| Error::Capture("recognizer state poisoned".to_string()))?;

        if active.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return Ok(());
        }

        let token = CancellationToken::new();
        *active = Some(token.clone());
        drop(active);

        let stt = Arc::clone(&self.stt);
        let runtime = self.runtime.clone();

        std::thread::Builder::new()
            .name("mitra-capture".to_string())
            .spawn(move || capture_utterance(&token, &events, &stt, &runtime))
            .map_err(|e| Error::Capture(format!("failed to spawn capture thread: {e}")))?;

        Ok(())
    }

    fn stop(&self) {
        if let Ok(active) = self.active.lock() {
            if let Some(token) = active.as_ref() {
                token.cancel();
            }
        }
    }

    fn name(&self) -> &'static str {
        "microphone"
    }
}

/// Body of the capture thread; always ends with `End`
fn capture_utterance(
    token: &CancellationToken,
    events: &mpsc::UnboundedSender<RecognitionEvent>,
    stt: &SpeechToText,
    runtime: &tokio::runtime::Handle,
) {
    if let Err(e) = record_and_transcribe(token, events, stt, runtime) {
        tracing::warn!(error = %e, "capture failed");
        let _ = events.send(RecognitionEvent::Error(e.to_string()));
        std::thread::sleep(FAULT_BACKOFF);
    }

    // Free the slot before reporting End so a restart can begin.
    token.cancel();
    let _ = events.send(RecognitionEvent::End);
}

fn record_and_transcribe(
    token: &CancellationToken,
    events: &mpsc::UnboundedSender<RecognitionEvent>,
    stt: &SpeechToText,
    runtime: &tokio::runtime::Handle,
) -> Result<()> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let mut segmenter = UtteranceSegmenter::default();
    let utterance = loop {
        if token.is_cancelled() {
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL);

        if let Some(utterance) = segmenter.feed(&capture.take_buffer()) {
            break utterance;
        }

        // Sound without words
        if segmenter.take_discarded() {
            let _ = events.send(RecognitionEvent::Interim(String::new()));
        }
    };
    capture.stop();

    let wav = samples_to_wav(&utterance, SAMPLE_RATE)?;
    let transcript = runtime.block_on(async {
        tokio::select! {
            result = stt.transcribe(&wav) => Some(result),
            () = token.cancelled() => None,
        }
    });

    match transcript {
        Some(text) => {
            let _ = events.send(RecognitionEvent::Final(text?));
            Ok(())
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingRecognizer {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl Recognizer for CountingRecognizer {
        fn start(&self, _events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn noop() -> TranscriptCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn end_restarts_only_while_listening() {
        let rec = Arc::new(CountingRecognizer::default());
        let (controller, _rx) = CaptureController::new(Some(rec.clone()));

        controller.start_listening(noop(), noop());
        assert_eq!(rec.starts.load(Ordering::SeqCst), 1);

        controller.handle_event(RecognitionEvent::End);
        assert_eq!(rec.starts.load(Ordering::SeqCst), 2);

        controller.stop_listening();
        controller.handle_event(RecognitionEvent::End);
        assert_eq!(rec.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn second_start_stops_first() {
        let rec = Arc::new(CountingRecognizer::default());
        let (controller, _rx) = CaptureController::new(Some(rec.clone()));

        controller.start_listening(noop(), noop());
        controller.start_listening(noop(), noop());
        assert_eq!(rec.stops.load(Ordering::SeqCst), 1);
        assert_eq!(rec.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_recognizer_is_a_no_op() {
        let (controller, _rx) = CaptureController::new(None);
        controller.start_listening(noop(), noop());
        assert!(!controller.is_listening());
    }

    #[test]
    fn results_after_stop_are_dropped() {
        let rec = Arc::new(CountingRecognizer::default());
        let (controller, _rx) = CaptureController::new(Some(rec));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        controller.start_listening(
            noop(),
            Arc::new(move |t| sink.lock().unwrap().push(t)),
        );
        controller.handle_event(RecognitionEvent::Final("hello".into()));
        controller.stop_listening();
        controller.handle_event(RecognitionEvent::Final("late".into()));

        assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
    }
}
