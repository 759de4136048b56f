//! Offline responses from canned pools
//!
//! The last tier. Mood and topic widen the pool; a greeting, a thank-you or
//! a question replaces it outright.

use std::sync::{LazyLock, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use regex::Regex;

use crate::emotion::{self, EmotionLabel, Topic};

/// Empathetic, reflective responses that fit any turn
pub const BASE_RESPONSES: &[&str] = &[
    "I understand how you feel. Would you like to tell me more about it?",
    "That sounds challenging. I'm here to listen whenever you need me.",
    "I appreciate you sharing that with me. How does it make you feel?",
    "It's completely normal to feel that way. Would you like to explore why you might be feeling this?",
    "Thank you for trusting me with your thoughts. Is there anything specific about this situation that's troubling you?",
    "I'm here for you. Let's take a deep breath together and continue when you're ready.",
    "Your feelings are valid. Would it help to talk more about what's on your mind?",
    "I'm listening. Please feel free to express yourself however you need to.",
];

pub const GREETING_RESPONSES: &[&str] = &[
    "Hi there, it's good to hear from you. How are you feeling today?",
    "Hello! I'm here and listening. What's on your mind?",
    "Hey, welcome back. How has your day been so far?",
];

pub const GRATITUDE_RESPONSES: &[&str] = &[
    "You're very welcome. I'm always here when you need to talk.",
    "I'm glad I could be here for you. Is there anything else on your mind?",
    "Thank you for letting me listen. Take good care of yourself.",
];

pub const QUESTION_RESPONSES: &[&str] = &[
    "That's a thoughtful question. What do you think the answer might be for you?",
    "I'm not sure I have the perfect answer, but I'd love to explore it with you. What made you wonder about that?",
    "Good question. Let's think it through together. What feels most important about it to you?",
];

/// Extra responses for a detected mood
#[must_use]
pub const fn emotion_responses(label: EmotionLabel) -> &'static [&'static str] {
    match label {
        EmotionLabel::Anxiety => &[
            "It sounds like you're feeling anxious. Let's slow down and take one breath at a time.",
            "Anxiety can feel overwhelming. What's the part of this that worries you most?",
        ],
        EmotionLabel::Sadness => &[
            "I'm sorry you're feeling down. It's okay to sit with that sadness for a while.",
            "That sounds really heavy. I'm right here with you.",
        ],
        EmotionLabel::Anger => &[
            "It sounds like something really frustrated you. What happened?",
            "Anger often points to something that matters to us. What feels unfair here?",
        ],
        EmotionLabel::Fear => &[
            "Feeling scared is hard. You're safe to talk about it here.",
            "What is it that feels most frightening right now?",
        ],
        EmotionLabel::Happiness => &[
            "That's wonderful to hear! What's been bringing you joy?",
            "I love hearing that you're feeling good. Tell me more!",
        ],
        EmotionLabel::Calm => &[
            "It's lovely that you're feeling at peace. What helped you get there?",
            "That calm sounds precious. Let's enjoy it together for a moment.",
        ],
        EmotionLabel::None => &[],
    }
}

/// Extra responses for a detected topic
#[must_use]
pub const fn topic_responses(topic: Topic) -> &'static [&'static str] {
    match topic {
        Topic::Anxiety => &["Worry has a way of running ahead of us. What would help you feel a little more grounded?"],
        Topic::Sadness => &["Loss and sadness take time. Be gentle with yourself today."],
        Topic::Anger => &["When things feel unfair it's natural to be upset. What would you like to happen next?"],
        Topic::Fear => &["Facing fears takes courage. What's one small step that feels manageable?"],
        Topic::Work => &[
            "Work pressure can really pile up. What part of it is weighing on you most?",
            "It sounds like a lot is riding on this. Remember that you've prepared more than you think.",
        ],
        Topic::Relationships => &[
            "Relationships can bring up so many feelings. How are you feeling about them right now?",
            "It sounds like this person matters to you. What do you wish they understood?",
        ],
    }
}

static GREETING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(hi|hello|hey)\b").expect("valid regex"));

static GRATITUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(thanks|thank you|thank|appreciate|grateful)\b").expect("valid regex")
});

static QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\?|^\s*(what|why|how|when|where|who|can|could|should|would|do|does|is|are)\b)")
        .expect("valid regex")
});

/// Picks a canned response for the user's text
pub struct LocalResponder {
    rng: Mutex<StdRng>,
}

impl Default for LocalResponder {
    fn default() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl LocalResponder {
    /// Responder with a reproducible choice sequence
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// The pool a response for `text` is drawn from
    #[must_use]
    pub fn candidates(text: &str) -> Vec<&'static str> {
        let mut pool: Vec<&'static str> = BASE_RESPONSES.to_vec();

        let mood = emotion::classify(text);
        pool.extend_from_slice(emotion_responses(mood));
        if let Some(topic) = emotion::classify_topic(text) {
            pool.extend_from_slice(topic_responses(topic));
        }

        // Later overrides win.
        if QUESTION.is_match(text) {
            pool = QUESTION_RESPONSES.to_vec();
        }
        if GRATITUDE.is_match(text) {
            pool = GRATITUDE_RESPONSES.to_vec();
        }
        if GREETING.is_match(text) {
            pool = GREETING_RESPONSES.to_vec();
        }

        pool
    }

    /// Pick uniformly from [`LocalResponder::candidates`]
    pub fn respond(&self, text: &str) -> String {
        let pool = Self::candidates(text);
        let picked = self
            .rng
            .lock()
            .ok()
            .and_then(|mut rng| pool.choose(&mut *rng).copied());

        picked.unwrap_or(BASE_RESPONSES[0]).to_string()
    }
}
