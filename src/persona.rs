//! Companion personalities and the prompts that shape them
//!
//! A personality conditions both what Mitra says (system prompt for the
//! remote tiers) and how it sounds (see [`crate::voice::VoiceProfile`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Display name of the companion
pub const COMPANION_NAME: &str = "Mitra";

/// Conversational personality selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Personality {
    /// Motivating, direct, action-oriented
    Coach,
    /// Soft, validating, lets the user vent
    CryBuddy,
    /// Reflective, analytical, names patterns
    MindReader,
    /// Warm, neutral listener
    #[default]
    Default,
}

/// Preferred voice gender for synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Male,
    Female,
}

impl Personality {
    /// All personalities, in display order
    pub const ALL: [Self; 4] = [Self::Coach, Self::CryBuddy, Self::MindReader, Self::Default];

    /// Stored string form (matches the values written by the settings UI)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coach => "coach",
            Self::CryBuddy => "cryBuddy",
            Self::MindReader => "mindReader",
            Self::Default => "default",
        }
    }

    /// Parse a stored value, reading anything unknown as [`Personality::Default`]
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Gender used when the user has not picked one
    #[must_use]
    pub const fn preferred_gender(self) -> VoiceGender {
        match self {
            Self::Coach => VoiceGender::Male,
            Self::CryBuddy | Self::MindReader | Self::Default => VoiceGender::Female,
        }
    }

    /// Full system prompt for the primary completion tier
    #[must_use]
    pub fn system_prompt(self) -> String {
        let style = match self {
            Self::Coach => {
                "You speak like a supportive life coach. Acknowledge the feeling in one \
                 sentence, then offer one small, concrete next step the user can take today. \
                 Be encouraging and confident, never preachy."
            }
            Self::CryBuddy => {
                "You are a gentle shoulder to cry on. Do not try to fix anything. Reflect \
                 the user's feelings back softly, validate them, and let them know it is okay \
                 to feel this way. Use simple, tender words."
            }
            Self::MindReader => {
                "You are perceptive and analytical. Gently name the emotion or pattern you \
                 notice beneath what the user said, explain it in one sentence, and ask one \
                 insightful question that helps them look deeper."
            }
            Self::Default => {
                "You are a calm, warm listener. Respond with empathy, reflect what you heard, \
                 and invite the user to share more if they wish."
            }
        };

        format!(
            "You are {COMPANION_NAME}, an empathetic voice companion. {style} \
             Your reply will be spoken aloud, so keep it to two or three short sentences, \
             avoid lists, markdown and emoji. If the user mentions self-harm, encourage them \
             kindly to reach out to a trusted person or a local crisis line."
        )
    }

    /// Shorter system prompt for the cheaper secondary tier
    #[must_use]
    pub fn short_prompt(self) -> String {
        let style = match self {
            Self::Coach => "Be encouraging and suggest one small next step.",
            Self::CryBuddy => "Be soft and validating; do not give advice.",
            Self::MindReader => "Name the feeling you notice and ask one question.",
            Self::Default => "Be warm and reflective.",
        };
        format!("You are {COMPANION_NAME}, a caring voice companion. {style} Reply in two short sentences.")
    }
}

impl FromStr for Personality {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim() {
            "coach" => Ok(Self::Coach),
            "cryBuddy" | "crybuddy" | "cry-buddy" => Ok(Self::CryBuddy),
            "mindReader" | "mindreader" | "mind-reader" => Ok(Self::MindReader),
            "default" | "" => Ok(Self::Default),
            other => Err(crate::Error::Config(format!("unknown personality: {other}"))),
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VoiceGender {
    /// Stored string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl FromStr for VoiceGender {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(crate::Error::Config(format!("unknown voice gender: {other}"))),
        }
    }
}

impl fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
