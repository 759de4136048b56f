//! Error types for the Mitra voice engine

use thiserror::Error;

/// Result type alias for Mitra operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur inside the voice engine
///
/// None of these escape the public entry points of the engine; they are
/// logged and turned into a degraded result at the boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech capture error
    #[error("capture error: {0}")]
    Capture(String),

    /// Audio device or codec error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Remote completion service error
    #[error("completion error: {0}")]
    Completion(String),

    /// Host platform lacks a capability
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Operation was superseded or stopped
    #[error("cancelled")]
    Cancelled,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
