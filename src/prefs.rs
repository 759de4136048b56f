//! User preferences
//!
//! Preferences live in an injected key-value store so the engine never owns
//! their persistence. [`Preferences`] is a typed view over that store and is
//! re-read at the start of every turn, so a change made mid-conversation
//! applies to the next utterance.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::persona::{Personality, VoiceGender};
use crate::{Error, Result};

/// Storage key for the personality
pub const PERSONALITY_KEY: &str = "mitra-personality";

/// Storage key for the voice gender
pub const GENDER_KEY: &str = "mitra-voice-gender";

/// Storage key for the voice-responses-off flag
pub const MUTED_KEY: &str = "mitra-muted";

/// Storage key for the cloud synthesis flag
pub const CLOUD_TTS_KEY: &str = "mitra-tts-enabled";

/// External string key-value store
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot persist the value
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .map_err(|_| Error::Config("preference store poisoned".to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a JSON object on disk
///
/// The file is rewritten on every `set`. A failed write leaves the stored
/// value unchanged.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("invalid preferences file: {e}")))?
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), entries = values.len(), "preferences loaded");

        Ok(Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Config("preference store poisoned".to_string()))?;
        let mut updated = values.clone();
        updated.insert(key.to_string(), value.to_string());

        // Memory only changes once the file holds the new value
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&updated)?)?;

        *values = updated;
        Ok(())
    }
}

/// Point-in-time view of the preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferenceSnapshot {
    pub personality: Personality,
    /// Stored gender, if the user picked one
    pub gender: Option<VoiceGender>,
    /// Voice responses off
    pub muted: bool,
    /// Use cloud synthesis when a credential exists
    pub cloud_tts: bool,
}

impl PreferenceSnapshot {
    /// Gender to speak with: the stored one, else the personality's preference
    #[must_use]
    pub fn effective_gender(&self) -> VoiceGender {
        self.gender
            .unwrap_or_else(|| self.personality.preferred_gender())
    }
}

/// Typed access to the preference store
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
    cloud_tts_default: bool,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            store,
            cloud_tts_default: true,
        }
    }

    /// Cloud synthesis setting used while the store holds none
    #[must_use]
    pub fn with_cloud_tts_default(mut self, enabled: bool) -> Self {
        self.cloud_tts_default = enabled;
        self
    }

    /// Preferences over a fresh in-memory store
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Read the current values; unknown or missing entries read as defaults
    #[must_use]
    pub fn snapshot(&self) -> PreferenceSnapshot {
        let personality = self
            .store
            .get(PERSONALITY_KEY)
            .map(|v| Personality::from_stored(&v))
            .unwrap_or_default();

        let gender = self
            .store
            .get(GENDER_KEY)
            .and_then(|v| v.parse::<VoiceGender>().ok());

        PreferenceSnapshot {
            personality,
            gender,
            muted: self.flag(MUTED_KEY, false),
            cloud_tts: self.flag(CLOUD_TTS_KEY, self.cloud_tts_default),
        }
    }

    /// # Errors
    ///
    /// Returns error if the store cannot persist the value
    pub fn set_personality(&self, personality: Personality) -> Result<()> {
        self.store.set(PERSONALITY_KEY, personality.as_str())
    }

    /// # Errors
    ///
    /// Returns error if the store cannot persist the value
    pub fn set_voice_gender(&self, gender: VoiceGender) -> Result<()> {
        self.store.set(GENDER_KEY, gender.as_str())
    }

    /// # Errors
    ///
    /// Returns error if the store cannot persist the value
    pub fn set_tts_enabled(&self, enabled: bool) -> Result<()> {
        self.store.set(CLOUD_TTS_KEY, if enabled { "true" } else { "false" })
    }

    /// # Errors
    ///
    /// Returns error if the store cannot persist the value
    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.store.set(MUTED_KEY, if muted { "true" } else { "false" })
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.store.get(key).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_reads_defaults() {
        let snap = Preferences::in_memory().snapshot();
        assert_eq!(snap.personality, Personality::Default);
        assert_eq!(snap.gender, None);
        assert!(!snap.muted);
        assert!(snap.cloud_tts);
        assert_eq!(snap.effective_gender(), VoiceGender::Female);
    }

    #[test]
    fn coach_prefers_male_until_gender_stored() {
        let prefs = Preferences::in_memory();
        prefs.set_personality(Personality::Coach).unwrap();
        assert_eq!(prefs.snapshot().effective_gender(), VoiceGender::Male);

        prefs.set_voice_gender(VoiceGender::Female).unwrap();
        assert_eq!(prefs.snapshot().effective_gender(), VoiceGender::Female);
    }

    #[test]
    fn garbage_values_fall_back() {
        let store = Arc::new(MemoryStore::new());
        store.set(PERSONALITY_KEY, "pirate").unwrap();
        store.set(GENDER_KEY, "robot").unwrap();
        store.set(MUTED_KEY, "maybe").unwrap();

        let snap = Preferences::new(store).snapshot();
        assert_eq!(snap.personality, Personality::Default);
        assert_eq!(snap.gender, None);
        assert!(!snap.muted);
    }

    #[test]
    fn stored_flag_beats_configured_default() {
        let prefs = Preferences::in_memory().with_cloud_tts_default(false);
        assert!(!prefs.snapshot().cloud_tts);

        prefs.set_tts_enabled(true).unwrap();
        assert!(prefs.snapshot().cloud_tts);
    }

    #[test]
    fn json_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        {
            let prefs = Preferences::new(Arc::new(JsonFileStore::open(&path).unwrap()));
            prefs.set_personality(Personality::CryBuddy).unwrap();
            prefs.set_muted(true).unwrap();
        }

        let reopened = Preferences::new(Arc::new(JsonFileStore::open(&path).unwrap()));
        let snap = reopened.snapshot();
        assert_eq!(snap.personality, Personality::CryBuddy);
        assert!(snap.muted);
    }

    #[test]
    fn failed_write_keeps_old_value() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();

        let store = JsonFileStore::open(&blocker.join("prefs.json")).unwrap();
        assert!(store.set(MUTED_KEY, "true").is_err());
        assert_eq!(store.get(MUTED_KEY), None);

        let prefs = Preferences::new(Arc::new(store));
        assert!(prefs.set_personality(Personality::Coach).is_err());
        assert_eq!(prefs.snapshot().personality, Personality::Default);
    }

    #[test]
    fn corrupt_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(JsonFileStore::open(&path), Err(Error::Config(_))));
    }
}
