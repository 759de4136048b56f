//! Text shaping for cloud synthesis
//!
//! Turns plain response text into marked-up input: timed pauses after
//! sentences and commas, an occasional conversational filler, and one
//! emotional prosody wrapper around the whole utterance.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

/// Pause inserted after sentence-ending punctuation
pub const SENTENCE_PAUSE: &str = r#"<break time="600ms"/>"#;

/// Pause inserted after commas
pub const COMMA_PAUSE: &str = r#"<break time="300ms"/>"#;

/// Fillers that may open an utterance
pub const FILLERS: &[&str] = &["Hmm, ", "Well, ", "You know, ", "So, "];

/// Default probability of prefixing a filler
pub const DEFAULT_FILLER_PROBABILITY: f64 = 0.3;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?]+)(?:\s+|$)").expect("valid regex"));

static COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(?:\s+|$)").expect("valid regex"));

static EXCITEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(amazing|wonderful|fantastic|great job|congratulations|excited|proud of you|awesome)\b")
        .expect("valid regex")
});

static CONCERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(worried|sorry|difficult|hard time|struggl\w*|hurt\w*|pain\w*|concern\w*)\b")
        .expect("valid regex")
});

static CALMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(breathe|breath|relax\w*|calm\w*|peace\w*|gently|slowly|rest)\b")
        .expect("valid regex")
});

static EMPATHY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(understand|hear you|feel\w*|valid|here for you|with you)\b")
        .expect("valid regex")
});

/// Emotional prosody applied to a whole utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProsodyBucket {
    Excitement,
    Concern,
    Calming,
    Empathy,
    Neutral,
}

impl ProsodyBucket {
    /// Pick exactly one bucket; checked in priority order
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if EXCITEMENT.is_match(text) {
            Self::Excitement
        } else if CONCERN.is_match(text) {
            Self::Concern
        } else if CALMING.is_match(text) {
            Self::Calming
        } else if EMPATHY.is_match(text) {
            Self::Empathy
        } else {
            Self::Neutral
        }
    }

    /// `(rate, pitch)` attributes for the prosody marker
    #[must_use]
    pub const fn attributes(self) -> (&'static str, &'static str) {
        match self {
            Self::Excitement => ("medium", "+10%"),
            Self::Concern => ("slow", "-5%"),
            Self::Calming => ("x-slow", "-10%"),
            Self::Empathy => ("slow", "-2%"),
            Self::Neutral => ("medium", "+0%"),
        }
    }
}

/// Shapes response text for the cloud synthesis path
#[derive(Debug, Clone, Copy)]
pub struct TextShaper {
    filler_probability: f64,
}

impl Default for TextShaper {
    fn default() -> Self {
        Self::new(DEFAULT_FILLER_PROBABILITY)
    }
}

impl TextShaper {
    /// Create a shaper with the given filler probability (clamped to 0..=1)
    #[must_use]
    pub fn new(filler_probability: f64) -> Self {
        Self {
            filler_probability: filler_probability.clamp(0.0, 1.0),
        }
    }

    /// Produce marked-up synthesis input for `text`
    pub fn shape<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> String {
        let bucket = ProsodyBucket::detect(text);
        let mut body = insert_pauses(text.trim());

        if self.filler_probability > 0.0 && rng.gen_bool(self.filler_probability) {
            let filler = FILLERS[rng.gen_range(0..FILLERS.len())];
            body = format!("{filler}{body}");
        }

        wrap_prosody(&body, bucket)
    }
}

/// Insert timed pause markers after sentence ends and commas
#[must_use]
pub fn insert_pauses(text: &str) -> String {
    let with_sentences = SENTENCE_END.replace_all(text, format!("$1 {SENTENCE_PAUSE} ").as_str());
    let with_commas = COMMA.replace_all(&with_sentences, format!(", {COMMA_PAUSE} ").as_str());
    with_commas.trim_end().to_string()
}

/// Wrap text in a prosody marker for `bucket`
#[must_use]
pub fn wrap_prosody(text: &str, bucket: ProsodyBucket) -> String {
    let (rate, pitch) = bucket.attributes();
    format!(r#"<prosody rate="{rate}" pitch="{pitch}">{text}</prosody>"#)
}
