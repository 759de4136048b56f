//! Keyword-vote emotion and topic detection
//!
//! A bag-of-words vote over fixed keyword tables. Each label scores the number
//! of its distinct keywords present as substrings of the lower-cased text.
//! Labels are scanned in declaration order and only a strictly greater score
//! replaces the current leader, so the first label to reach the maximum wins
//! and an all-zero vote yields no label.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mood detected in free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Anxiety,
    Sadness,
    Anger,
    Fear,
    Happiness,
    Calm,
    None,
}

/// Subject area used to pick more specific fallback responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Anxiety,
    Sadness,
    Anger,
    Fear,
    Work,
    Relationships,
}

const EMOTION_KEYWORDS: &[(EmotionLabel, &[&str])] = &[
    (
        EmotionLabel::Anxiety,
        &[
            "anxious", "anxiety", "worried", "worry", "nervous", "stress", "panic", "overwhelm",
            "uneasy", "restless",
        ],
    ),
    (
        EmotionLabel::Sadness,
        &[
            "sad", "depressed", "lonely", "alone", "cry", "hopeless", "heartbroken", "grief",
            "miserable", "empty",
        ],
    ),
    (
        EmotionLabel::Anger,
        &[
            "angry", "furious", "frustrat", "annoyed", "irritat", "rage", "resent", "pissed",
            "livid",
        ],
    ),
    (
        EmotionLabel::Fear,
        &[
            "scared", "afraid", "fear", "terrified", "frightened", "dread", "phobia", "unsafe",
        ],
    ),
    (
        EmotionLabel::Happiness,
        &[
            "happy", "joy", "excited", "glad", "great", "wonderful", "grateful", "proud",
            "delighted", "amazing",
        ],
    ),
    (
        EmotionLabel::Calm,
        &[
            "calm", "relaxed", "peaceful", "serene", "content", "at ease", "rested", "balanced",
        ],
    ),
];

const TOPIC_KEYWORDS: &[(Topic, &[&str])] = &[
    (
        Topic::Anxiety,
        &["anxious", "anxiety", "worry", "worried", "nervous", "panic", "stress"],
    ),
    (
        Topic::Sadness,
        &["sad", "lonely", "grief", "loss", "cry", "depressed", "miss"],
    ),
    (
        Topic::Anger,
        &["angry", "furious", "frustrat", "irritat", "unfair"],
    ),
    (
        Topic::Fear,
        &["afraid", "scared", "fear", "terrified", "nightmare"],
    ),
    (
        Topic::Work,
        &[
            "work", "job", "boss", "career", "office", "interview", "deadline", "colleague",
            "manager", "promotion",
        ],
    ),
    (
        Topic::Relationships,
        &[
            "relationship", "partner", "boyfriend", "girlfriend", "husband", "wife", "friend",
            "family", "breakup", "marriage",
        ],
    ),
];

/// Classify the dominant emotion of `text`
#[must_use]
pub fn classify(text: &str) -> EmotionLabel {
    vote(text, EMOTION_KEYWORDS).unwrap_or(EmotionLabel::None)
}

/// Classify the topic of `text`, independent of its emotion
#[must_use]
pub fn classify_topic(text: &str) -> Option<Topic> {
    vote(text, TOPIC_KEYWORDS)
}

/// Count distinct keyword hits per label; first strict maximum wins
fn vote<L: Copy>(text: &str, table: &[(L, &[&str])]) -> Option<L> {
    let lower = text.to_lowercase();

    let mut best = None;
    let mut best_count = 0;

    for (label, keywords) in table {
        let count = keywords.iter().filter(|k| lower.contains(*k)).count();
        if count > best_count {
            best_count = count;
            best = Some(*label);
        }
    }

    best
}

impl EmotionLabel {
    /// Lower-case label name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anxiety => "anxiety",
            Self::Sadness => "sadness",
            Self::Anger => "anger",
            Self::Fear => "fear",
            Self::Happiness => "happiness",
            Self::Calm => "calm",
            Self::None => "none",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Topic {
    /// Lower-case topic name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anxiety => "anxiety",
            Self::Sadness => "sadness",
            Self::Anger => "anger",
            Self::Fear => "fear",
            Self::Work => "work",
            Self::Relationships => "relationships",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
