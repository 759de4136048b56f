//! Shared test utilities
//!
//! In-process stand-ins for the host capabilities (recognition, remote
//! completion, on-device and cloud synthesis, audio output).

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use mitra_voice::voice::{
    AudioOutput, CloudSpeech, LocalSynthesizer, LocalUtterance, LocalVoice, RecognitionEvent,
    Recognizer,
};
use mitra_voice::{Error, Personality, Preferences, Result, RetryPolicy};

/// Retry policy with no backoff sleeps
#[must_use]
pub fn instant_retry() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        ..RetryPolicy::default()
    }
}

/// Preferences over a fresh in-memory store
#[must_use]
pub fn prefs() -> Preferences {
    Preferences::in_memory()
}

/// Build a voice list from names; ids are derived from the names
#[must_use]
pub fn voices(names: &[&str]) -> Vec<LocalVoice> {
    names
        .iter()
        .map(|name| LocalVoice {
            name: (*name).to_string(),
            id: name.to_lowercase().replace(' ', "-"),
        })
        .collect()
}

/// Recognizer driven by the test through the captured event sender
#[derive(Default)]
pub struct FakeRecognizer {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    events: Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>,
}

impl FakeRecognizer {
    /// Report an event as the platform would
    pub fn emit(&self, event: RecognitionEvent) {
        let sender = self.events.lock().unwrap().clone();
        sender
            .expect("recognizer was never started")
            .send(event)
            .unwrap();
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Recognizer for FakeRecognizer {
    fn start(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Remote tier answering from a script; an empty script fails
pub struct FakeResponder {
    name: &'static str,
    configured: AtomicBool,
    script: Mutex<VecDeque<Result<String>>>,
    pub calls: AtomicUsize,
    pub personalities: Mutex<Vec<Personality>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Counts a request as in flight until dropped, including when aborted
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeResponder {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            configured: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            personalities: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A tier that always fails
    #[must_use]
    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// A tier with no credential
    #[must_use]
    pub fn unconfigured(name: &'static str) -> Arc<Self> {
        let responder = Self::new(name);
        responder.configured.store(false, Ordering::SeqCst);
        Arc::new(responder)
    }

    /// A tier that answers `replies` in order, then fails
    #[must_use]
    pub fn answering(name: &'static str, replies: &[&str]) -> Arc<Self> {
        let responder = Self::new(name);
        responder
            .script
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| Ok((*r).to_string())));
        Arc::new(responder)
    }

    /// Queue one more successful reply
    pub fn push_reply(&self, reply: &str) {
        self.script.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    /// Take `delay` to answer each request
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most requests ever running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl mitra_voice::Responder for FakeResponder {
    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    fn set_credential(&self, key: Option<String>) {
        self.configured
            .store(key.is_some_and(|k| !k.is_empty()), Ordering::SeqCst);
    }

    async fn try_respond(&self, _text: &str, personality: Personality) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.personalities.lock().unwrap().push(personality);

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Completion("HTTP 503: unavailable".to_string())))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// On-device synthesizer that records what it was asked to say
pub struct FakeLocalSynth {
    voices: Vec<LocalVoice>,
    delay: Duration,
    pub spoken: Mutex<Vec<LocalUtterance>>,
    pub cancels: AtomicUsize,
}

impl FakeLocalSynth {
    #[must_use]
    pub fn new(voices: Vec<LocalVoice>) -> Self {
        Self {
            voices,
            delay: Duration::ZERO,
            spoken: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        }
    }

    /// Take `delay` to finish each utterance
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn last(&self) -> Option<LocalUtterance> {
        self.spoken.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LocalSynthesizer for FakeLocalSynth {
    fn voices(&self) -> Vec<LocalVoice> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: &LocalUtterance) -> Result<()> {
        self.spoken.lock().unwrap().push(utterance.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "fake-local"
    }
}

/// One cloud synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct CloudRequest {
    pub input: String,
    pub voice: String,
    pub speed: f32,
}

/// Cloud speech service that records requests
pub struct FakeCloud {
    configured: AtomicBool,
    fail: bool,
    pub requests: Mutex<Vec<CloudRequest>>,
}

impl FakeCloud {
    #[must_use]
    pub fn new() -> Self {
        Self {
            configured: AtomicBool::new(true),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A service whose every request errors
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CloudSpeech for FakeCloud {
    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    fn set_credential(&self, key: Option<String>) {
        self.configured
            .store(key.is_some_and(|k| !k.is_empty()), Ordering::SeqCst);
    }

    async fn synthesize(&self, input: &str, voice: &str, speed: f32) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(CloudRequest {
            input: input.to_string(),
            voice: voice.to_string(),
            speed,
        });
        if self.fail {
            return Err(Error::Tts("HTTP 500: synthesis failed".to_string()));
        }
        Ok(vec![0xFF, 0xFB, 0x90, 0x00])
    }
}

/// Audio output that accepts anything instantly
#[derive(Default)]
pub struct FakeOutput {
    pub plays: AtomicUsize,
    pub stops: AtomicUsize,
}

impl FakeOutput {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn play(&self, _audio: Vec<u8>) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// End callback that counts how often it fired
#[must_use]
pub fn counting_end(counter: &Arc<AtomicUsize>) -> mitra_voice::voice::EndCallback {
    let counter = Arc::clone(counter);
    Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}
