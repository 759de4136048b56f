//! Engine assembly
//!
//! Builds the capture controller, response pipeline and speech pipeline
//! from configuration, attaching whichever host capabilities are present.
//! A missing microphone, speaker, espeak or API key is logged and the engine
//! runs degraded rather than failing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::persona::{Personality, VoiceGender};
use crate::prefs::Preferences;
use crate::respond::{LocalResponder, PromptStyle, RemoteResponder, ResponsePipeline};
use crate::session::{SessionCoordinator, SessionHandle, SessionUpdate};
use crate::voice::{
    AudioPlayback, CaptureController, EspeakSynthesizer, LocalSynthesizer, MicRecognizer,
    RecognitionEvent, Recognizer, SpeechSynthesizer, SpeechToText, TextShaper, TextToSpeech,
};
use crate::Result;

/// The assembled voice engine
pub struct VoiceEngine {
    prefs: Preferences,
    capture: Arc<CaptureController>,
    recognition: mpsc::UnboundedReceiver<RecognitionEvent>,
    responder: Arc<ResponsePipeline>,
    speech: Arc<SpeechSynthesizer>,
    local_voice: Option<Arc<dyn LocalSynthesizer>>,
    grace: Duration,
}

impl VoiceEngine {
    /// Assemble from parts; the usual entry point for tests and embedders
    #[must_use]
    pub fn new(
        prefs: Preferences,
        recognizer: Option<Arc<dyn Recognizer>>,
        responder: ResponsePipeline,
        speech: SpeechSynthesizer,
        grace: Duration,
    ) -> Self {
        let (capture, recognition) = CaptureController::new(recognizer);
        Self {
            prefs,
            capture: Arc::new(capture),
            recognition,
            responder: Arc::new(responder),
            speech: Arc::new(speech),
            local_voice: None,
            grace,
        }
    }

    /// Build from configuration, probing the host for audio capabilities
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn from_config(config: &Config, prefs: Preferences) -> Self {
        let primary = RemoteResponder::new(
            "primary",
            &config.primary,
            config.api_keys.openai.clone(),
            PromptStyle::Full,
        );
        let secondary = RemoteResponder::new(
            "secondary",
            &config.secondary,
            config.api_keys.secondary.clone(),
            PromptStyle::Short,
        );
        let responder = ResponsePipeline::new(prefs.clone(), config.retry.clone())
            .with_primary(Arc::new(primary))
            .with_secondary(Arc::new(secondary))
            .with_local(LocalResponder::default());

        let local_voice = match EspeakSynthesizer::detect(config.voice.espeak_path.as_deref()) {
            Ok(espeak) => Some(Arc::new(espeak) as Arc<dyn LocalSynthesizer>),
            Err(e) => {
                tracing::warn!(error = %e, "on-device voice unavailable");
                None
            }
        };

        let mut speech = SpeechSynthesizer::new(prefs.clone())
            .with_shaper(TextShaper::new(config.voice.filler_probability))
            .with_cloud_voices(config.voice.cloud_voices.clone())
            .with_cloud_speed(config.voice.speed);

        match AudioPlayback::new() {
            Ok(playback) => {
                let tts = TextToSpeech::new_openai(
                    config.api_keys.openai.clone(),
                    config.voice.tts_model.clone(),
                );
                speech = speech.with_cloud(Arc::new(tts), Arc::new(playback));
            }
            Err(e) => tracing::warn!(error = %e, "audio output unavailable, cloud voice disabled"),
        }

        if let Some(local) = &local_voice {
            speech = speech.with_local(Arc::clone(local));
        }

        let recognizer = match build_recognizer(config) {
            Ok(recognizer) => Some(recognizer),
            Err(e) => {
                tracing::warn!(error = %e, "speech recognition unavailable");
                None
            }
        };

        let mut engine = Self::new(
            prefs,
            recognizer,
            responder,
            speech,
            config.empty_transcript_grace,
        );
        engine.local_voice = local_voice;
        engine
    }

    #[must_use]
    pub const fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    #[must_use]
    pub fn capture(&self) -> &Arc<CaptureController> {
        &self.capture
    }

    #[must_use]
    pub fn responder(&self) -> &Arc<ResponsePipeline> {
        &self.responder
    }

    #[must_use]
    pub fn speech(&self) -> &Arc<SpeechSynthesizer> {
        &self.speech
    }

    /// The on-device synthesizer, if one was found
    #[must_use]
    pub fn local_voice(&self) -> Option<&Arc<dyn LocalSynthesizer>> {
        self.local_voice.as_ref()
    }

    /// Replace remote credentials for completion and cloud speech
    pub fn set_credentials(&self, primary: Option<String>, secondary: Option<String>) {
        self.speech.set_credential(primary.clone());
        self.responder
            .set_credentials(primary.clone(), secondary.or(primary));
    }

    /// # Errors
    ///
    /// Returns error if the preference store cannot persist the value
    pub fn set_personality(&self, personality: Personality) -> Result<()> {
        self.prefs.set_personality(personality)
    }

    /// # Errors
    ///
    /// Returns error if the preference store cannot persist the value
    pub fn set_voice_gender(&self, gender: VoiceGender) -> Result<()> {
        self.prefs.set_voice_gender(gender)
    }

    /// # Errors
    ///
    /// Returns error if the preference store cannot persist the value
    pub fn set_tts_enabled(&self, enabled: bool) -> Result<()> {
        self.prefs.set_tts_enabled(enabled)
    }

    /// Turn the engine into a conversation session
    #[must_use]
    pub fn into_session(
        self,
    ) -> (SessionCoordinator, SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>) {
        SessionCoordinator::new(
            self.capture,
            self.recognition,
            self.responder,
            self.speech,
            self.grace,
        )
    }
}

fn build_recognizer(config: &Config) -> Result<Arc<dyn Recognizer>> {
    let key = config
        .api_keys
        .openai
        .clone()
        .ok_or_else(|| crate::Error::Config("OPENAI_API_KEY required for transcription".to_string()))?;

    let stt = SpeechToText::new_whisper(key, config.voice.stt_model.clone())?;
    Ok(Arc::new(MicRecognizer::new(stt)?))
}
