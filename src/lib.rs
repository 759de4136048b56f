//! Mitra - a voice companion for emotional check-ins
//!
//! This library provides the voice-interaction engine behind Mitra:
//! - Continuous speech capture with per-utterance restarts
//! - Keyword-vote emotion and topic classification
//! - Tiered response generation (primary model, cheaper model, canned pools)
//! - Speech synthesis through cloud TTS or an on-device voice
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  SessionCoordinator                  │
//! │    Idle → Listening → Processing → Speaking → …      │
//! └──────┬──────────────────┬───────────────────┬────────┘
//!        │                  │                   │
//! ┌──────▼───────┐  ┌───────▼─────────┐  ┌──────▼──────────┐
//! │  Capture     │  │  Response       │  │  Synthesis      │
//! │  Controller  │  │  Pipeline       │  │  Pipeline       │
//! │  mic+Whisper │  │  tier1 → tier2  │  │  cloud TTS  or  │
//! │              │  │  → local pools  │  │  espeak         │
//! └──────────────┘  └─────────────────┘  └─────────────────┘
//! ```

pub mod config;
pub mod emotion;
pub mod engine;
pub mod error;
pub mod persona;
pub mod prefs;
pub mod respond;
pub mod session;
pub mod voice;

pub use config::Config;
pub use emotion::{EmotionLabel, Topic, classify, classify_topic};
pub use engine::VoiceEngine;
pub use error::{Error, Result};
pub use persona::{COMPANION_NAME, Personality, VoiceGender};
pub use prefs::{JsonFileStore, MemoryStore, PreferenceSnapshot, PreferenceStore, Preferences};
pub use respond::{CONNECTION_TROUBLE, Responder, ResponsePipeline, RetryPolicy};
pub use session::{SessionCoordinator, SessionEvent, SessionHandle, SessionState, SessionUpdate};
