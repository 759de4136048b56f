//! Energy-based utterance segmentation
//!
//! Splits the microphone stream into utterances: speech starts when a chunk's
//! RMS energy crosses a threshold and ends after a run of quiet samples.

/// Minimum RMS energy considered speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum utterance length (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that closes an utterance (0.7s at 16kHz)
const SILENCE_SAMPLES: usize = 11_200;

/// Hard cap on one utterance (30s at 16kHz)
const MAX_UTTERANCE_SAMPLES: usize = 480_000;

/// Where the segmenter is in the current utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Waiting for speech
    Quiet,
    /// Accumulating an utterance
    Speaking,
}

/// Accumulates microphone chunks into complete utterances
#[derive(Debug)]
pub struct UtteranceSegmenter {
    state: SegmentState,
    speech: Vec<f32>,
    silence: usize,
    threshold: f32,
    discarded: bool,
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new(ENERGY_THRESHOLD)
    }
}

impl UtteranceSegmenter {
    /// Create a segmenter with a custom energy threshold
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self {
            state: SegmentState::Quiet,
            speech: Vec::new(),
            silence: 0,
            threshold,
            discarded: false,
        }
    }

    /// Feed a chunk of samples
    ///
    /// Returns the utterance once speech is followed by enough silence or
    /// the length cap is hit. Bursts too short to be speech are discarded.
    pub fn feed(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        if samples.is_empty() {
            return None;
        }

        let energy = rms_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            SegmentState::Quiet => {
                if is_speech {
                    tracing::trace!(energy, "speech started");
                    self.state = SegmentState::Speaking;
                    self.speech.clear();
                    self.speech.extend_from_slice(samples);
                    self.silence = 0;
                }
                None
            }
            SegmentState::Speaking => {
                self.speech.extend_from_slice(samples);
                if is_speech {
                    self.silence = 0;
                } else {
                    self.silence += samples.len();
                }

                let closed = self.silence > SILENCE_SAMPLES;
                let capped = self.speech.len() >= MAX_UTTERANCE_SAMPLES;
                if !(closed || capped) {
                    return None;
                }

                let voiced = self.speech.len().saturating_sub(self.silence);
                let utterance = std::mem::take(&mut self.speech);
                self.reset();

                if voiced > MIN_SPEECH_SAMPLES || capped {
                    tracing::debug!(samples = utterance.len(), "utterance complete");
                    Some(utterance)
                } else {
                    tracing::trace!("burst too short, discarded");
                    self.discarded = true;
                    None
                }
            }
        }
    }

    /// Drop any partial utterance
    pub fn reset(&mut self) {
        self.state = SegmentState::Quiet;
        self.speech.clear();
        self.silence = 0;
    }

    #[must_use]
    pub const fn state(&self) -> SegmentState {
        self.state
    }

    /// Whether a burst was discarded since the last call
    pub fn take_discarded(&mut self) -> bool {
        std::mem::take(&mut self.discarded)
    }
}

/// RMS energy of a chunk
#[allow(clippy::cast_precision_loss)]
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
