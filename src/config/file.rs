//! TOML configuration file loading
//!
//! Supports `~/.config/mitra/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MitraConfigFile {
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    #[serde(default)]
    pub completion: CompletionFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,

    #[serde(default)]
    pub retry: RetryFileConfig,

    #[serde(default)]
    pub capture: CaptureFileConfig,

    /// Where preferences are kept
    pub data_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    /// Key for the secondary completion tier (defaults to `openai`)
    pub secondary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompletionFileConfig {
    #[serde(default)]
    pub primary: TierFileConfig,

    #[serde(default)]
    pub secondary: TierFileConfig,
}

/// One completion tier
#[derive(Debug, Default, Deserialize)]
pub struct TierFileConfig {
    /// OpenAI-compatible base URL (e.g. "https://api.openai.com/v1")
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// Cloud voice used for the female gender (e.g. "nova")
    pub female_voice: Option<String>,

    /// Cloud voice used for the male gender (e.g. "onyx")
    pub male_voice: Option<String>,

    /// Cloud speed multiplier
    pub speed: Option<f32>,

    /// Probability of opening with a filler word
    pub filler_probability: Option<f64>,

    /// Use cloud synthesis when a key is available
    pub cloud_tts: Option<bool>,

    /// Path to the espeak binary
    pub espeak_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryFileConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    /// Grace window after an empty interim before giving up
    pub empty_transcript_ms: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MitraConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MitraConfigFile {
    config_file_path().map_or_else(MitraConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_file_from(path: &Path) -> MitraConfigFile {
    if !path.exists() {
        return MitraConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                MitraConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            MitraConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/mitra/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("mitra").join("config.toml"))
}
