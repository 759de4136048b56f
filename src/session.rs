//! Session coordinator
//!
//! Drives one conversation as a state machine:
//!
//! ```text
//!   Idle ──start──▶ Listening ──final──▶ Processing ──reply──▶ Speaking
//!    ▲                 │  ▲                                       │
//!    └──stop/not heard─┘  └──────────── speech ended ─────────────┘
//! ```
//!
//! Capture callbacks, response completion and speech completion all arrive
//! as [`SessionEvent`]s on one channel; only the coordinator loop changes
//! state. Observers follow along through [`SessionUpdate`]s.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::emotion::{self, EmotionLabel};
use crate::respond::ResponsePipeline;
use crate::voice::{
    CaptureController, EndCallback, RecognitionEvent, SpeechSynthesizer, TranscriptCallback,
};

/// Where the conversation is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Processing,
    Speaking,
}

/// Inputs to the coordinator loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Begin (or resume) listening
    Start,
    /// End the conversation turn and go idle
    Stop,
    /// Stop and leave the loop
    Shutdown,
    /// Partial transcript from capture
    Interim(String),
    /// Complete transcript from capture
    Final(String),
    /// The empty-transcript grace timer with this id fired
    GraceElapsed(u64),
    /// The reply for a turn is ready
    ResponseReady { turn: u64, reply: String },
    /// Speech for a turn finished
    SpeechEnded { turn: u64 },
}

/// What observers see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    State(SessionState),
    /// In-progress transcript
    Interim(String),
    /// What the user said
    UserText(String),
    /// Mood of what the user said, for mood history
    EmotionDetected(EmotionLabel),
    /// What Mitra answered
    Reply(String),
    /// Nothing usable was heard
    NotHeard,
}

/// Cloneable handle for driving a running coordinator
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub fn start(&self) {
        let _ = self.events.send(SessionEvent::Start);
    }

    pub fn stop(&self) {
        let _ = self.events.send(SessionEvent::Stop);
    }

    pub fn shutdown(&self) {
        let _ = self.events.send(SessionEvent::Shutdown);
    }

    /// Post a raw event
    pub fn send(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Owns one conversation's capture, response and speech flow
pub struct SessionCoordinator {
    id: Uuid,
    capture: Arc<CaptureController>,
    recognition: mpsc::UnboundedReceiver<RecognitionEvent>,
    responder: Arc<ResponsePipeline>,
    speech: Arc<SpeechSynthesizer>,
    grace: Duration,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    state: SessionState,
    active: bool,
    turn: u64,
    pending_reply: Option<JoinHandle<()>>,
    grace_timer: u64,
    grace_armed: Option<u64>,
}

impl SessionCoordinator {
    /// Wire up a coordinator
    ///
    /// `recognition` is the receiver returned alongside `capture`; the loop
    /// feeds it to the controller. Returns the coordinator, a handle for
    /// driving it and the update stream.
    #[must_use]
    pub fn new(
        capture: Arc<CaptureController>,
        recognition: mpsc::UnboundedReceiver<RecognitionEvent>,
        responder: Arc<ResponsePipeline>,
        speech: Arc<SpeechSynthesizer>,
        grace: Duration,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates, updates_rx) = mpsc::unbounded_channel();

        let handle = SessionHandle {
            events: events_tx.clone(),
        };

        let coordinator = Self {
            id: Uuid::new_v4(),
            capture,
            recognition,
            responder,
            speech,
            grace,
            events_tx,
            events_rx,
            updates,
            state: SessionState::Idle,
            active: false,
            turn: 0,
            pending_reply: None,
            grace_timer: 0,
            grace_armed: None,
        };

        (coordinator, handle, updates_rx)
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Run until [`SessionHandle::shutdown`]
    pub async fn run(mut self) {
        tracing::info!(session = %self.id, "session started");

        loop {
            tokio::select! {
                Some(event) = self.recognition.recv() => {
                    self.capture.handle_event(event);
                }
                event = self.events_rx.recv() => {
                    match event {
                        Some(SessionEvent::Shutdown) | None => break,
                        Some(event) => self.handle(event),
                    }
                }
            }
        }

        self.halt();
        tracing::info!(session = %self.id, "session ended");
    }

    /// Apply one event
    pub fn handle(&mut self, event: SessionEvent) {
        tracing::trace!(session = %self.id, state = ?self.state, event = ?event, "session event");

        match event {
            SessionEvent::Start => {
                if self.state == SessionState::Idle {
                    self.active = true;
                    self.listen();
                }
            }
            SessionEvent::Stop | SessionEvent::Shutdown => self.halt(),
            SessionEvent::Interim(text) => self.on_interim(text),
            SessionEvent::Final(text) => self.on_final(text),
            SessionEvent::GraceElapsed(timer) => {
                if self.state == SessionState::Listening && self.grace_armed == Some(timer) {
                    tracing::debug!(session = %self.id, "nothing heard within grace window");
                    self.not_heard();
                }
            }
            SessionEvent::ResponseReady { turn, reply } => {
                if turn == self.turn && self.state == SessionState::Processing {
                    self.pending_reply = None;
                    self.speak(reply);
                }
            }
            SessionEvent::SpeechEnded { turn } => {
                if turn == self.turn && self.state == SessionState::Speaking {
                    if self.active {
                        self.listen();
                    } else {
                        self.set_state(SessionState::Idle);
                    }
                }
            }
        }
    }

    fn listen(&mut self) {
        self.set_state(SessionState::Listening);
        self.grace_armed = None;

        let interim_tx = self.events_tx.clone();
        let final_tx = self.events_tx.clone();
        let on_interim: TranscriptCallback = Arc::new(move |text| {
            let _ = interim_tx.send(SessionEvent::Interim(text));
        });
        let on_final: TranscriptCallback = Arc::new(move |text| {
            let _ = final_tx.send(SessionEvent::Final(text));
        });

        self.capture.start_listening(on_interim, on_final);
    }

    fn on_interim(&mut self, text: String) {
        if self.state != SessionState::Listening {
            return;
        }

        if text.trim().is_empty() {
            self.arm_grace_timer();
        } else {
            self.grace_armed = None;
        }
        self.emit(SessionUpdate::Interim(text));
    }

    fn on_final(&mut self, text: String) {
        if self.state != SessionState::Listening {
            return;
        }

        self.grace_armed = None;
        self.capture.stop_listening();

        let text = text.trim().to_string();
        if text.is_empty() {
            self.not_heard();
            return;
        }

        let mood = emotion::classify(&text);
        tracing::info!(session = %self.id, emotion = %mood, "user said something");

        self.emit(SessionUpdate::UserText(text.clone()));
        self.emit(SessionUpdate::EmotionDetected(mood));
        self.set_state(SessionState::Processing);

        self.turn += 1;
        let turn = self.turn;
        let responder = Arc::clone(&self.responder);
        let events = self.events_tx.clone();

        // One response request in flight at a time
        self.cancel_pending_reply();
        self.pending_reply = Some(tokio::spawn(async move {
            let reply = responder.get_response(&text).await;
            let _ = events.send(SessionEvent::ResponseReady { turn, reply });
        }));
    }

    fn cancel_pending_reply(&mut self) {
        if let Some(task) = self.pending_reply.take() {
            if !task.is_finished() {
                tracing::debug!(session = %self.id, "dropping unfinished response request");
            }
            task.abort();
        }
    }

    fn speak(&mut self, reply: String) {
        self.emit(SessionUpdate::Reply(reply.clone()));
        self.set_state(SessionState::Speaking);

        let turn = self.turn;
        let speech = Arc::clone(&self.speech);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let on_end: EndCallback = Box::new(move || {
                let _ = events.send(SessionEvent::SpeechEnded { turn });
            });
            speech.speak(&reply, Some(on_end)).await;
        });
    }

    fn arm_grace_timer(&mut self) {
        if self.grace_armed.is_some() {
            return;
        }

        self.grace_timer += 1;
        let timer = self.grace_timer;
        self.grace_armed = Some(timer);

        let events = self.events_tx.clone();
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = events.send(SessionEvent::GraceElapsed(timer));
        });
    }

    fn not_heard(&mut self) {
        self.capture.stop_listening();
        self.cancel_pending_reply();
        self.grace_armed = None;
        self.active = false;
        self.emit(SessionUpdate::NotHeard);
        self.set_state(SessionState::Idle);
    }

    /// Stop everything in flight; stale completions are ignored by turn id
    fn halt(&mut self) {
        self.active = false;
        self.grace_armed = None;
        self.turn += 1;
        self.cancel_pending_reply();
        self.capture.stop_listening();
        self.speech.cancel();
        self.set_state(SessionState::Idle);
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!(session = %self.id, from = ?self.state, to = ?state, "state change");
            self.state = state;
            self.emit(SessionUpdate::State(state));
        }
    }

    fn emit(&self, update: SessionUpdate) {
        let _ = self.updates.send(update);
    }
}
