//! Configuration management for Mitra
//!
//! Values resolve as environment > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::respond::RetryPolicy;
use crate::voice::CloudVoices;

/// Default OpenAI-compatible base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default grace window after an empty interim transcript
pub const DEFAULT_EMPTY_TRANSCRIPT_MS: u64 = 2000;

/// Mitra configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_keys: ApiKeys,

    /// Primary completion tier
    pub primary: TierConfig,

    /// Cheaper fallback completion tier
    pub secondary: TierConfig,

    pub voice: VoiceConfig,

    pub retry: RetryPolicy,

    /// Grace window after an empty interim before reporting "not heard"
    pub empty_transcript_grace: Duration,

    /// Where preferences are kept
    pub data_dir: PathBuf,
}

/// Remote service credentials
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Primary tier, STT and TTS
    pub openai: Option<SecretString>,
    /// Secondary completion tier
    pub secondary: Option<SecretString>,
}

/// One OpenAI-compatible completion tier
#[derive(Debug, Clone, PartialEq)]
pub struct TierConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl TierConfig {
    /// Defaults for the primary tier
    #[must_use]
    pub fn primary() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 150,
        }
    }

    /// Defaults for the secondary tier
    #[must_use]
    pub fn secondary() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.6,
            max_tokens: 100,
        }
    }

    fn overlay(
        self,
        fc: file::TierFileConfig,
        env: &impl Fn(&str) -> Option<String>,
        prefix: &str,
    ) -> Self {
        Self {
            base_url: env(&format!("{prefix}_BASE_URL"))
                .or(fc.base_url)
                .unwrap_or(self.base_url),
            model: env(&format!("{prefix}_MODEL"))
                .or(fc.model)
                .unwrap_or(self.model),
            temperature: fc.temperature.unwrap_or(self.temperature),
            max_tokens: fc.max_tokens.unwrap_or(self.max_tokens),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// Cloud voice per gender
    pub cloud_voices: CloudVoices,

    /// Cloud speed multiplier
    pub speed: f32,

    /// Probability of opening a cloud utterance with a filler word
    pub filler_probability: f64,

    /// Default for the cloud synthesis preference when none is stored
    pub cloud_tts: bool,

    /// Path to the espeak binary (looked up on `PATH` when unset)
    pub espeak_path: Option<PathBuf>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            cloud_voices: CloudVoices::default(),
            speed: crate::voice::DEFAULT_CLOUD_SPEED,
            filler_probability: crate::voice::DEFAULT_FILLER_PROBABILITY,
            cloud_tts: true,
            espeak_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the standard config file
    #[must_use]
    pub fn load() -> Self {
        Self::resolve(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    #[must_use]
    pub fn resolve(fc: file::MitraConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        // API keys (env > toml > None)
        let openai = env("OPENAI_API_KEY")
            .or(fc.api_keys.openai)
            .filter(|k| !k.is_empty());
        let secondary = env("MITRA_SECONDARY_API_KEY")
            .or(fc.api_keys.secondary)
            .filter(|k| !k.is_empty())
            .or_else(|| openai.clone());

        let api_keys = ApiKeys {
            openai: openai.map(SecretString::from),
            secondary: secondary.map(SecretString::from),
        };

        let primary = TierConfig::primary().overlay(fc.completion.primary, &env, "MITRA_PRIMARY");
        let secondary =
            TierConfig::secondary().overlay(fc.completion.secondary, &env, "MITRA_SECONDARY");

        // Voice config (env > toml > default)
        let defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            stt_model: env("MITRA_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.stt_model),
            tts_model: env("MITRA_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.tts_model),
            cloud_voices: CloudVoices {
                female: fc
                    .voice
                    .female_voice
                    .unwrap_or(defaults.cloud_voices.female),
                male: fc.voice.male_voice.unwrap_or(defaults.cloud_voices.male),
            },
            speed: fc.voice.speed.unwrap_or(defaults.speed),
            filler_probability: fc
                .voice
                .filler_probability
                .unwrap_or(defaults.filler_probability),
            cloud_tts: env("MITRA_CLOUD_TTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(fc.voice.cloud_tts)
                .unwrap_or(defaults.cloud_tts),
            espeak_path: env("MITRA_ESPEAK_PATH")
                .or(fc.voice.espeak_path)
                .map(PathBuf::from),
        };

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: fc.retry.max_attempts.unwrap_or(retry_defaults.max_attempts),
            base_delay: fc
                .retry
                .base_delay_ms
                .map_or(retry_defaults.base_delay, Duration::from_millis),
            max_delay: fc
                .retry
                .max_delay_ms
                .map_or(retry_defaults.max_delay, Duration::from_millis),
        };

        let empty_transcript_grace = Duration::from_millis(
            fc.capture
                .empty_transcript_ms
                .unwrap_or(DEFAULT_EMPTY_TRANSCRIPT_MS),
        );

        // Data directory (~/.local/share/mitra on Linux)
        let data_dir = env("MITRA_DATA_DIR")
            .or(fc.data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                directories::ProjectDirs::from("", "", "mitra")
                    .map_or_else(|| PathBuf::from(".mitra"), |d| d.data_dir().to_path_buf())
            });

        Self {
            api_keys,
            primary,
            secondary,
            voice,
            retry,
            empty_transcript_grace,
            data_dir,
        }
    }

    /// Path of the preferences file
    #[must_use]
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }
}
