//! Voice input and output
//!
//! Capture: [`CaptureController`] keeps a [`Recognizer`] listening across
//! utterances. Output: [`SpeechSynthesizer`] speaks through cloud TTS or an
//! on-device voice, one utterance at a time.

mod capture;
mod local;
mod playback;
mod profile;
mod recognition;
mod segmenter;
mod shaping;
mod stt;
mod synthesis;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use local::{EspeakSynthesizer, LocalSynthesizer, LocalUtterance, LocalVoice, select_voice};
pub use playback::{AudioOutput, AudioPlayback, decode_mp3};
pub use profile::{VoiceProfile, name_patterns, prosody_deltas};
pub use recognition::{
    CaptureController, MicRecognizer, RecognitionEvent, Recognizer, TranscriptCallback,
};
pub use segmenter::{SegmentState, UtteranceSegmenter};
pub use shaping::{
    DEFAULT_FILLER_PROBABILITY, ProsodyBucket, TextShaper, insert_pauses, wrap_prosody,
};
pub use stt::SpeechToText;
pub use synthesis::{CloudVoices, DEFAULT_CLOUD_SPEED, EndCallback, SpeechSynthesizer};
pub use tts::{CloudSpeech, TextToSpeech};
