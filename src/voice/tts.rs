//! Cloud text-to-speech

use std::sync::RwLock;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Default OpenAI speech endpoint
pub const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Remote speech synthesis service
#[async_trait]
pub trait CloudSpeech: Send + Sync {
    /// Whether a credential is configured
    fn is_configured(&self) -> bool;

    /// Replace the credential (`None` clears it)
    fn set_credential(&self, key: Option<String>);

    /// Synthesize marked-up `input` with `voice` at `speed`
    ///
    /// # Returns
    ///
    /// Encoded audio bytes (MP3)
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status
    async fn synthesize(&self, input: &str, voice: &str, speed: f32) -> Result<Vec<u8>>;
}

/// OpenAI text-to-speech client
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: RwLock<Option<SecretString>>,
    model: String,
    url: String,
}

impl TextToSpeech {
    /// Create a new TTS client against the OpenAI endpoint
    #[must_use]
    pub fn new_openai(api_key: Option<SecretString>, model: String) -> Self {
        Self::with_url(api_key, model, OPENAI_SPEECH_URL.to_string())
    }

    /// Create a new TTS client against a custom endpoint
    #[must_use]
    pub fn with_url(api_key: Option<SecretString>, model: String, url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: RwLock::new(api_key),
            model,
            url,
        }
    }

    fn bearer(&self) -> Option<String> {
        self.api_key
            .read()
            .ok()?
            .as_ref()
            .map(|key| format!("Bearer {}", key.expose_secret()))
    }
}

#[async_trait]
impl CloudSpeech for TextToSpeech {
    fn is_configured(&self) -> bool {
        self.api_key
            .read()
            .is_ok_and(|key| key.as_ref().is_some_and(|k| !k.expose_secret().is_empty()))
    }

    fn set_credential(&self, key: Option<String>) {
        if let Ok(mut slot) = self.api_key.write() {
            *slot = key.filter(|k| !k.is_empty()).map(SecretString::from);
        }
    }

    async fn synthesize(&self, input: &str, voice: &str, speed: f32) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let auth = self
            .bearer()
            .ok_or_else(|| Error::Config("OpenAI API key required for TTS".to_string()))?;

        let request = TtsRequest {
            model: &self.model,
            input,
            voice,
            speed,
            response_format: "mp3",
        };

        tracing::debug!(voice, speed, chars = input.len(), "requesting cloud speech");

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", auth)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}
