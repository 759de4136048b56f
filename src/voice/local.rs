//! On-device speech synthesis
//!
//! The [`LocalSynthesizer`] trait is the seam to whatever the host offers.
//! [`EspeakSynthesizer`] drives the `espeak-ng` CLI when it is installed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// espeak words-per-minute at rate 1.0
const ESPEAK_BASE_WPM: f32 = 175.0;

/// espeak pitch (0-99) at pitch 1.0
const ESPEAK_BASE_PITCH: f32 = 50.0;

/// A voice offered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVoice {
    /// Human-readable name searched by the name patterns
    pub name: String,
    /// Backend identifier used to select the voice
    pub id: String,
}

/// One utterance for the on-device path
#[derive(Debug, Clone, PartialEq)]
pub struct LocalUtterance {
    pub text: String,
    pub voice: Option<LocalVoice>,
    pub rate: f32,
    pub pitch: f32,
}

/// Host speech synthesis capability
#[async_trait]
pub trait LocalSynthesizer: Send + Sync {
    /// Voices in platform order
    fn voices(&self) -> Vec<LocalVoice>;

    /// Speak and resolve when playback ends
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if [`LocalSynthesizer::cancel`] interrupts
    /// it, or another error if synthesis fails
    async fn speak(&self, utterance: &LocalUtterance) -> Result<()>;

    /// Stop whatever is currently speaking
    fn cancel(&self);

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Pick a voice by ordered name-fragment preference
///
/// The first pattern that matches any voice wins. A pattern only matches at
/// the start of a word, so "male" never matches "Female". With no match, the
/// platform's first voice is used.
#[must_use]
pub fn select_voice(voices: &[LocalVoice], patterns: &[&str]) -> Option<LocalVoice> {
    patterns
        .iter()
        .find_map(|pattern| voices.iter().find(|v| matches_at_word_start(&v.name, pattern)))
        .or_else(|| voices.first())
        .cloned()
}

fn matches_at_word_start(name: &str, pattern: &str) -> bool {
    name.match_indices(pattern).any(|(at, _)| {
        name[..at]
            .chars()
            .next_back()
            .is_none_or(|prev| !prev.is_alphanumeric())
    })
}

/// `espeak-ng` driven through its CLI
pub struct EspeakSynthesizer {
    binary: PathBuf,
    voices: Vec<LocalVoice>,
    current: Mutex<CancellationToken>,
}

impl EspeakSynthesizer {
    /// Locate espeak and enumerate its English voices
    ///
    /// `binary` overrides the lookup on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unavailable`] if no espeak binary can be found
    pub fn detect(binary: Option<&Path>) -> Result<Self> {
        let binary = match binary {
            Some(path) => path.to_path_buf(),
            None => which::which("espeak-ng")
                .or_else(|_| which::which("espeak"))
                .map_err(|_| Error::Unavailable("espeak-ng not found on PATH".to_string()))?,
        };

        let voices = std::process::Command::new(&binary)
            .arg("--voices=en")
            .output()
            .map(|out| parse_voice_list(&String::from_utf8_lossy(&out.stdout)))
            .unwrap_or_default();

        tracing::debug!(
            binary = %binary.display(),
            voices = voices.len(),
            "espeak synthesizer initialized"
        );

        Ok(Self {
            binary,
            voices,
            current: Mutex::new(CancellationToken::new()),
        })
    }

    fn fresh_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut current) = self.current.lock() {
            *current = token.clone();
        }
        token
    }
}

#[async_trait]
impl LocalSynthesizer for EspeakSynthesizer {
    fn voices(&self) -> Vec<LocalVoice> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: &LocalUtterance) -> Result<()> {
        let token = self.fresh_token();

        let mut cmd = Command::new(&self.binary);
        if let Some(voice) = &utterance.voice {
            cmd.arg("-v").arg(&voice.id);
        }
        cmd.arg("-s")
            .arg(espeak_speed(utterance.rate).to_string())
            .arg("-p")
            .arg(espeak_pitch(utterance.pitch).to_string())
            .arg("--")
            .arg(&utterance.text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            () = token.cancelled() => None,
        };

        match finished {
            Some(status) => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::Tts(format!("espeak exited with {status}")))
                }
            }
            None => {
                child.kill().await.ok();
                Err(Error::Cancelled)
            }
        }
    }

    fn cancel(&self) {
        if let Ok(current) = self.current.lock() {
            current.cancel();
        }
    }

    fn name(&self) -> &'static str {
        "espeak"
    }
}

/// Words-per-minute for a rate multiplier
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn espeak_speed(rate: f32) -> u32 {
    (ESPEAK_BASE_WPM * rate).clamp(80.0, 450.0).round() as u32
}

/// espeak pitch for a pitch multiplier
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn espeak_pitch(pitch: f32) -> u32 {
    (ESPEAK_BASE_PITCH * pitch).clamp(0.0, 99.0).round() as u32
}

/// Parse `espeak-ng --voices` output
///
/// Each voice yields its default (male) entry plus a female variant so the
/// gender name patterns have something to match.
fn parse_voice_list(output: &str) -> Vec<LocalVoice> {
    let mut voices = Vec::new();

    for line in output.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [_, language, gender, name, ..] = fields.as_slice() else {
            continue;
        };
        let label = name.replace('_', " ");

        if gender.ends_with('F') {
            voices.push(LocalVoice {
                name: format!("{label} Female"),
                id: (*language).to_string(),
            });
        } else {
            voices.push(LocalVoice {
                name: format!("{label} Male"),
                id: (*language).to_string(),
            });
            voices.push(LocalVoice {
                name: format!("{label} Female"),
                id: format!("{language}+f3"),
            });
        }
    }

    voices
}
