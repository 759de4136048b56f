//! Speech synthesis pipeline
//!
//! One utterance is active at a time. `speak` cancels whatever is playing,
//! tries the cloud path when enabled and credentialed, and falls back to
//! on-device synthesis. The end callback fires once, on completion, and
//! never for an utterance that was superseded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;

use super::local::{LocalSynthesizer, LocalUtterance, select_voice};
use super::playback::AudioOutput;
use super::profile::VoiceProfile;
use super::shaping::TextShaper;
use super::tts::CloudSpeech;
use crate::persona::VoiceGender;
use crate::prefs::{PreferenceSnapshot, Preferences};
use crate::{Error, Result};

/// Fixed slow rate for cloud synthesis
pub const DEFAULT_CLOUD_SPEED: f32 = 0.9;

/// Invoked when an utterance finishes
pub type EndCallback = Box<dyn FnOnce() + Send + 'static>;

/// Cloud voice per gender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudVoices {
    pub female: String,
    pub male: String,
}

impl Default for CloudVoices {
    fn default() -> Self {
        Self {
            female: "nova".to_string(),
            male: "onyx".to_string(),
        }
    }
}

impl CloudVoices {
    #[must_use]
    pub fn for_gender(&self, gender: VoiceGender) -> &str {
        match gender {
            VoiceGender::Female => &self.female,
            VoiceGender::Male => &self.male,
        }
    }
}

/// Speaks responses through the cloud or on-device path
pub struct SpeechSynthesizer {
    prefs: Preferences,
    cloud: Option<Arc<dyn CloudSpeech>>,
    output: Option<Arc<dyn AudioOutput>>,
    local: Option<Arc<dyn LocalSynthesizer>>,
    shaper: TextShaper,
    voices: CloudVoices,
    cloud_speed: f32,
    rng: Mutex<StdRng>,
    generation: AtomicU64,
    current: Mutex<CancellationToken>,
}

impl SpeechSynthesizer {
    /// Create a pipeline with no synthesis capability attached
    #[must_use]
    pub fn new(prefs: Preferences) -> Self {
        Self {
            prefs,
            cloud: None,
            output: None,
            local: None,
            shaper: TextShaper::default(),
            voices: CloudVoices::default(),
            cloud_speed: DEFAULT_CLOUD_SPEED,
            rng: Mutex::new(StdRng::from_entropy()),
            generation: AtomicU64::new(0),
            current: Mutex::new(CancellationToken::new()),
        }
    }

    /// Attach the cloud path: a speech service and a player for its audio
    #[must_use]
    pub fn with_cloud(mut self, cloud: Arc<dyn CloudSpeech>, output: Arc<dyn AudioOutput>) -> Self {
        self.cloud = Some(cloud);
        self.output = Some(output);
        self
    }

    /// Attach the on-device path
    #[must_use]
    pub fn with_local(mut self, local: Arc<dyn LocalSynthesizer>) -> Self {
        self.local = Some(local);
        self
    }

    #[must_use]
    pub fn with_shaper(mut self, shaper: TextShaper) -> Self {
        self.shaper = shaper;
        self
    }

    #[must_use]
    pub fn with_cloud_voices(mut self, voices: CloudVoices) -> Self {
        self.voices = voices;
        self
    }

    #[must_use]
    pub fn with_cloud_speed(mut self, speed: f32) -> Self {
        self.cloud_speed = speed;
        self
    }

    /// Make filler selection deterministic
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Replace the cloud credential (`None` clears it)
    pub fn set_credential(&self, key: Option<String>) {
        if let Some(cloud) = &self.cloud {
            cloud.set_credential(key);
        }
    }

    /// Stop the active utterance without starting another
    ///
    /// Its end callback will not fire.
    pub fn cancel(&self) {
        if let Ok(current) = self.current.lock() {
            current.cancel();
        }
        if let Some(local) = &self.local {
            local.cancel();
        }
        if let Some(output) = &self.output {
            output.stop();
        }
    }

    /// Speak `text`, preempting any active utterance
    ///
    /// Never fails: every problem is logged and the pipeline degrades, in the
    /// worst case straight to `on_end`.
    pub async fn speak(&self, text: &str, on_end: Option<EndCallback>) {
        self.cancel();
        let (generation, token) = self.begin();
        let prefs = self.prefs.snapshot();

        tracing::debug!(utterance = generation, chars = text.len(), "speak");

        if prefs.muted {
            tracing::debug!(utterance = generation, "voice responses off");
            self.finish(generation, &token, on_end);
            return;
        }

        if prefs.cloud_tts {
            match self.speak_cloud(text, &prefs, &token).await {
                Ok(true) => {
                    self.finish(generation, &token, on_end);
                    return;
                }
                Ok(false) => {}
                Err(Error::Cancelled) => {
                    tracing::debug!(utterance = generation, "superseded");
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cloud speech failed, using on-device voice");
                }
            }
        }

        if token.is_cancelled() {
            return;
        }

        match self.speak_local(text, &prefs, &token).await {
            Err(Error::Cancelled) => {
                tracing::debug!(utterance = generation, "superseded");
            }
            Err(e) => {
                tracing::error!(error = %e, "speech synthesis unavailable");
                self.finish(generation, &token, on_end);
            }
            Ok(()) => self.finish(generation, &token, on_end),
        }
    }

    /// Cloud service and player, when both are attached and credentialed
    fn cloud_ready(&self) -> Option<(&Arc<dyn CloudSpeech>, &Arc<dyn AudioOutput>)> {
        let cloud = self.cloud.as_ref().filter(|c| c.is_configured())?;
        let output = self.output.as_ref()?;
        Some((cloud, output))
    }

    /// Returns `Ok(false)` when the cloud path is not configured
    async fn speak_cloud(
        &self,
        text: &str,
        prefs: &PreferenceSnapshot,
        token: &CancellationToken,
    ) -> Result<bool> {
        let Some((cloud, output)) = self.cloud_ready() else {
            return Ok(false);
        };

        let input = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| Error::Tts("shaper rng poisoned".to_string()))?;
            self.shaper.shape(text, &mut *rng)
        };
        let voice = self.voices.for_gender(prefs.effective_gender());

        let audio = tokio::select! {
            audio = cloud.synthesize(&input, voice, self.cloud_speed) => audio?,
            () = token.cancelled() => return Err(Error::Cancelled),
        };

        tokio::select! {
            played = output.play(audio) => played?,
            () = token.cancelled() => return Err(Error::Cancelled),
        }

        Ok(true)
    }

    async fn speak_local(
        &self,
        text: &str,
        prefs: &PreferenceSnapshot,
        token: &CancellationToken,
    ) -> Result<()> {
        let local = self
            .local
            .as_ref()
            .ok_or_else(|| Error::Unavailable("no on-device synthesizer".to_string()))?;

        let profile = VoiceProfile::lookup(prefs.personality, prefs.effective_gender())
            .shaped_for(text);
        let voice = select_voice(&local.voices(), profile.name_patterns);

        tracing::debug!(
            backend = local.name(),
            voice = voice.as_ref().map_or("default", |v| v.name.as_str()),
            rate = profile.rate,
            pitch = profile.pitch,
            "speaking on device"
        );

        let utterance = LocalUtterance {
            text: text.to_string(),
            voice,
            rate: profile.rate,
            pitch: profile.pitch,
        };

        tokio::select! {
            spoken = local.speak(&utterance) => spoken,
            () = token.cancelled() => Err(Error::Cancelled),
        }
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        if let Ok(mut current) = self.current.lock() {
            *current = token.clone();
        }
        (generation, token)
    }

    fn finish(&self, generation: u64, token: &CancellationToken, on_end: Option<EndCallback>) {
        if token.is_cancelled() || self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if let Some(on_end) = on_end {
            on_end();
        }
    }
}
