//! Voice profiles: personality and gender mapped to delivery settings

use crate::persona::{Personality, VoiceGender};

/// Voice name fragments tried in order when a female voice is wanted
const FEMALE_PATTERNS: &[&str] = &[
    "Samantha",
    "Google UK English Female",
    "Victoria",
    "Karen",
    "Zira",
    "Female",
    "female",
];

/// Voice name fragments tried in order when a male voice is wanted
const MALE_PATTERNS: &[&str] = &[
    "Daniel",
    "Google UK English Male",
    "Alex",
    "David",
    "Fred",
    "Male",
    "male",
];

const URGENT_KEYWORDS: &[&str] = &["urgent", "immediately", "right now", "hurry", "emergency", "quickly"];

const CALMING_KEYWORDS: &[&str] = &["breathe", "relax", "calm", "slowly", "gently", "peace"];

/// Rate added when the text sounds urgent
pub const URGENT_RATE_DELTA: f32 = 0.1;

/// Rate removed when the text is calming
pub const CALMING_RATE_DELTA: f32 = 0.1;

/// Delivery settings for on-device synthesis
///
/// Personality sets the rate/pitch baseline; gender picks which name-pattern
/// list is searched. Profiles are looked up per utterance and never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceProfile {
    /// Speech rate multiplier (1.0 = platform default)
    pub rate: f32,
    /// Pitch multiplier (1.0 = platform default)
    pub pitch: f32,
    /// Ordered voice-name fragments; first match wins
    pub name_patterns: &'static [&'static str],
}

impl VoiceProfile {
    /// Look up the profile for a personality and gender
    #[must_use]
    pub const fn lookup(personality: Personality, gender: VoiceGender) -> Self {
        let (rate, pitch) = match personality {
            // authoritative, a touch slower than neutral
            Personality::Coach => (0.95, 0.9),
            // softest and slowest, highest pitch
            Personality::CryBuddy => (0.85, 1.1),
            // neutral pace, deeper
            Personality::MindReader => (1.0, 0.85),
            Personality::Default => (1.0, 1.0),
        };

        Self {
            rate,
            pitch,
            name_patterns: name_patterns(gender),
        }
    }

    /// Apply keyword-driven prosody deltas for `text`
    #[must_use]
    pub fn shaped_for(self, text: &str) -> Self {
        let (rate_delta, pitch_delta) = prosody_deltas(text);
        Self {
            rate: self.rate + rate_delta,
            pitch: self.pitch + pitch_delta,
            ..self
        }
    }
}

/// Name-pattern list searched for a gender
#[must_use]
pub const fn name_patterns(gender: VoiceGender) -> &'static [&'static str] {
    match gender {
        VoiceGender::Female => FEMALE_PATTERNS,
        VoiceGender::Male => MALE_PATTERNS,
    }
}

/// Rate and pitch deltas implied by urgency and calming keywords
///
/// Both may apply; the deltas are additive.
#[must_use]
pub fn prosody_deltas(text: &str) -> (f32, f32) {
    let lower = text.to_lowercase();
    let mut rate = 0.0;
    let mut pitch = 0.0;

    if URGENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        rate += URGENT_RATE_DELTA;
        pitch += 0.05;
    }

    if CALMING_KEYWORDS.iter().any(|k| lower.contains(k)) {
        rate -= CALMING_RATE_DELTA;
        pitch -= 0.05;
    }

    (rate, pitch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cry_buddy_is_slower_than_coach() {
        let soft = VoiceProfile::lookup(Personality::CryBuddy, VoiceGender::Female);
        let coach = VoiceProfile::lookup(Personality::Coach, VoiceGender::Male);
        assert!(soft.rate < coach.rate);
        assert!(soft.pitch > coach.pitch);
    }

    #[test]
    fn coach_slower_than_neutral() {
        let coach = VoiceProfile::lookup(Personality::Coach, VoiceGender::Male);
        let neutral = VoiceProfile::lookup(Personality::Default, VoiceGender::Male);
        assert!(coach.rate < neutral.rate);
    }

    #[test]
    fn mind_reader_is_deeper() {
        let mr = VoiceProfile::lookup(Personality::MindReader, VoiceGender::Female);
        let neutral = VoiceProfile::lookup(Personality::Default, VoiceGender::Female);
        assert!(mr.pitch < neutral.pitch);
    }

    #[test]
    fn gender_picks_pattern_list() {
        let a = VoiceProfile::lookup(Personality::Coach, VoiceGender::Female);
        let b = VoiceProfile::lookup(Personality::Coach, VoiceGender::Male);
        assert_eq!(a.name_patterns[0], "Samantha");
        assert_eq!(b.name_patterns[0], "Daniel");
        // personality baseline unchanged by gender
        assert!((a.rate - b.rate).abs() < f32::EPSILON);
    }

    #[test]
    fn urgent_speeds_up_calming_slows_down() {
        let (fast, _) = prosody_deltas("Please call someone right now");
        let (slow, _) = prosody_deltas("Let's breathe together");
        let (none, _) = prosody_deltas("How was your day?");
        assert!(fast > 0.0);
        assert!(slow < 0.0);
        assert!(none.abs() < f32::EPSILON);
    }

    #[test]
    fn both_deltas_cancel() {
        let (rate, pitch) = prosody_deltas("Hurry, but breathe");
        assert!(rate.abs() < 1e-6);
        assert!(pitch.abs() < 1e-6);
    }
}
