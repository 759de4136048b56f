//! Session coordinator integration tests
//!
//! Drives whole conversation turns through fake capture, the offline
//! response tier and a fake on-device voice.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use mitra_voice::respond::LocalResponder;
use mitra_voice::voice::{RecognitionEvent, SpeechSynthesizer};
use mitra_voice::{
    EmotionLabel, ResponsePipeline, SessionHandle, SessionState, SessionUpdate, VoiceEngine,
};

mod common;

use common::{FakeLocalSynth, FakeRecognizer, FakeResponder, instant_retry, prefs};

struct Harness {
    recognizer: Arc<FakeRecognizer>,
    local: Arc<FakeLocalSynth>,
    handle: SessionHandle,
    updates: mpsc::UnboundedReceiver<SessionUpdate>,
    session: tokio::task::JoinHandle<()>,
}

fn harness(grace: Duration, speech_delay: Duration) -> Harness {
    harness_with(grace, speech_delay, None)
}

/// Like [`harness`], with `primary` as the first response tier
fn harness_with(
    grace: Duration,
    speech_delay: Duration,
    primary: Option<Arc<FakeResponder>>,
) -> Harness {
    let prefs = prefs();
    let recognizer = Arc::new(FakeRecognizer::default());
    let local = Arc::new(FakeLocalSynth::new(Vec::new()).with_delay(speech_delay));

    let mut responder = ResponsePipeline::new(prefs.clone(), instant_retry())
        .with_local(LocalResponder::seeded(3));
    if let Some(primary) = primary {
        responder = responder.with_primary(primary);
    }
    let speech = SpeechSynthesizer::new(prefs.clone()).with_local(local.clone());

    let engine = VoiceEngine::new(prefs, Some(recognizer.clone()), responder, speech, grace);
    let (coordinator, handle, updates) = engine.into_session();
    let session = tokio::spawn(coordinator.run());

    Harness {
        recognizer,
        local,
        handle,
        updates,
        session,
    }
}

impl Harness {
    async fn next(&mut self) -> SessionUpdate {
        timeout(Duration::from_secs(2), self.updates.recv())
            .await
            .expect("timed out waiting for session update")
            .expect("session closed")
    }

    async fn expect(&mut self, expected: SessionUpdate) {
        assert_eq!(self.next().await, expected);
    }

    /// Updates up to and including `expected`
    async fn until(&mut self, expected: SessionUpdate) -> Vec<SessionUpdate> {
        let mut seen = Vec::new();
        loop {
            let update = self.next().await;
            let done = update == expected;
            seen.push(update);
            if done {
                return seen;
            }
        }
    }

    /// Updates that arrive within `window`
    async fn drain(&mut self, window: Duration) -> Vec<SessionUpdate> {
        tokio::time::sleep(window).await;
        let mut seen = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            seen.push(update);
        }
        seen
    }
}

#[tokio::test]
async fn test_turn_replies_then_listens_again() {
    let mut h = harness(Duration::from_secs(2), Duration::ZERO);

    h.handle.start();
    h.expect(SessionUpdate::State(SessionState::Listening)).await;
    assert_eq!(h.recognizer.starts(), 1);

    let text = "I feel really anxious about my job interview tomorrow";
    h.recognizer.emit(RecognitionEvent::Final(text.into()));

    h.expect(SessionUpdate::UserText(text.into())).await;
    h.expect(SessionUpdate::EmotionDetected(EmotionLabel::Anxiety)).await;
    h.expect(SessionUpdate::State(SessionState::Processing)).await;

    let SessionUpdate::Reply(reply) = h.next().await else {
        panic!("expected a reply");
    };
    assert!(LocalResponder::candidates(text).iter().any(|c| *c == reply));

    h.expect(SessionUpdate::State(SessionState::Speaking)).await;
    h.expect(SessionUpdate::State(SessionState::Listening)).await;

    assert_eq!(h.local.spoken_texts(), vec![reply]);
    assert_eq!(h.recognizer.starts(), 2);

    h.handle.shutdown();
    h.session.await.unwrap();
}

#[tokio::test]
async fn test_empty_final_is_not_heard() {
    let mut h = harness(Duration::from_secs(2), Duration::ZERO);

    h.handle.start();
    h.expect(SessionUpdate::State(SessionState::Listening)).await;

    h.recognizer.emit(RecognitionEvent::Final("   ".into()));

    h.expect(SessionUpdate::NotHeard).await;
    h.expect(SessionUpdate::State(SessionState::Idle)).await;
    assert!(h.recognizer.stops() >= 1);

    // The End that follows must not restart capture
    h.recognizer.emit(RecognitionEvent::End);
    assert!(h.drain(Duration::from_millis(50)).await.is_empty());
    assert_eq!(h.recognizer.starts(), 1);
    assert!(h.local.spoken_texts().is_empty());
}

#[tokio::test]
async fn test_empty_interim_times_out() {
    let mut h = harness(Duration::from_millis(50), Duration::ZERO);

    h.handle.start();
    h.expect(SessionUpdate::State(SessionState::Listening)).await;

    h.recognizer.emit(RecognitionEvent::Interim(String::new()));

    h.expect(SessionUpdate::Interim(String::new())).await;
    h.expect(SessionUpdate::NotHeard).await;
    h.expect(SessionUpdate::State(SessionState::Idle)).await;
}

#[tokio::test]
async fn test_speech_cancels_grace_timer() {
    let mut h = harness(Duration::from_millis(50), Duration::ZERO);

    h.handle.start();
    h.expect(SessionUpdate::State(SessionState::Listening)).await;

    h.recognizer.emit(RecognitionEvent::Interim(String::new()));
    h.recognizer.emit(RecognitionEvent::Interim("I think".into()));

    let seen = h.drain(Duration::from_millis(150)).await;
    assert_eq!(
        seen,
        vec![
            SessionUpdate::Interim(String::new()),
            SessionUpdate::Interim("I think".into()),
        ]
    );
}

#[tokio::test]
async fn test_stop_while_speaking_goes_idle() {
    let mut h = harness(Duration::from_secs(2), Duration::from_millis(300));

    h.handle.start();
    h.expect(SessionUpdate::State(SessionState::Listening)).await;
    h.recognizer.emit(RecognitionEvent::Final("thank you".into()));

    loop {
        if h.next().await == SessionUpdate::State(SessionState::Speaking) {
            break;
        }
    }

    h.handle.stop();
    h.expect(SessionUpdate::State(SessionState::Idle)).await;

    // The interrupted utterance never reports back
    assert!(h.drain(Duration::from_millis(400)).await.is_empty());
    assert_eq!(h.recognizer.starts(), 1);
}

#[tokio::test]
async fn test_start_again_after_stop() {
    let mut h = harness(Duration::from_secs(2), Duration::ZERO);

    h.handle.start();
    h.expect(SessionUpdate::State(SessionState::Listening)).await;
    h.handle.stop();
    h.expect(SessionUpdate::State(SessionState::Idle)).await;

    h.handle.start();
    h.expect(SessionUpdate::State(SessionState::Listening)).await;
    assert_eq!(h.recognizer.starts(), 2);

    h.handle.shutdown();
    timeout(Duration::from_secs(1), h.session)
        .await
        .expect("session did not shut down")
        .unwrap();
}

#[tokio::test]
async fn test_stop_while_processing_drops_the_reply() {
    let primary = FakeResponder::answering("primary", &["Tell me more."]);
    primary.set_delay(Duration::from_millis(300));
    let mut h = harness_with(Duration::from_secs(2), Duration::ZERO, Some(primary.clone()));

    h.handle.start();
    h.expect(SessionUpdate::State(SessionState::Listening)).await;
    h.recognizer.emit(RecognitionEvent::Final("my week was rough".into()));
    h.until(SessionUpdate::State(SessionState::Processing)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    h.handle.stop();
    h.expect(SessionUpdate::State(SessionState::Idle)).await;

    // No reply for the stopped turn, even after the request would have finished
    assert!(h.drain(Duration::from_millis(400)).await.is_empty());
    assert!(h.local.spoken_texts().is_empty());
    assert_eq!(primary.calls(), 1);
}

#[tokio::test]
async fn test_restart_while_processing_keeps_one_request() {
    let primary = FakeResponder::answering("primary", &["Tell me more."]);
    primary.set_delay(Duration::from_millis(200));
    let mut h = harness_with(Duration::from_secs(2), Duration::ZERO, Some(primary.clone()));

    h.handle.start();
    h.expect(SessionUpdate::State(SessionState::Listening)).await;
    h.recognizer.emit(RecognitionEvent::Final("first thought".into()));
    h.until(SessionUpdate::State(SessionState::Processing)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    h.handle.stop();
    h.expect(SessionUpdate::State(SessionState::Idle)).await;
    h.handle.start();
    h.expect(SessionUpdate::State(SessionState::Listening)).await;

    h.recognizer.emit(RecognitionEvent::Final("second thought".into()));
    let seen = h.until(SessionUpdate::State(SessionState::Speaking)).await;

    let replies: Vec<_> = seen
        .iter()
        .filter(|u| matches!(u, SessionUpdate::Reply(_)))
        .collect();
    assert_eq!(replies, vec![&SessionUpdate::Reply("Tell me more.".into())]);
    assert!(seen.contains(&SessionUpdate::UserText("second thought".into())));

    h.expect(SessionUpdate::State(SessionState::Listening)).await;
    assert_eq!(primary.calls(), 2);
    assert_eq!(primary.max_in_flight(), 1);
    assert_eq!(h.local.spoken_texts(), vec!["Tell me more.".to_string()]);
}
