use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use crate::audio::SoundKind;
use crate::error::Result;
use crate::session::DEFAULT_DURATION_SECS;

/// Interface language. Only the choice is stored; string tables live with
/// the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

impl Language {
    pub fn toggled(self) -> Self {
        match self {
            Language::Zh => Language::En,
            Language::En => Language::Zh,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" => Ok(Language::Zh),
            "en" => Ok(Language::En),
            other => Err(format!("unknown language '{other}' (expected zh or en)")),
        }
    }
}

/// What survives between launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u32,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub sound: SoundKind,
}

fn default_duration_secs() -> u32 {
    DEFAULT_DURATION_SECS
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            language: Language::default(),
            sound: SoundKind::default(),
        }
    }
}

/// Where preferences are read from and written to.
pub trait PreferenceStore: Send + Sync + 'static {
    fn load(&self) -> Result<Preferences>;
    fn save(&self, prefs: &Preferences) -> Result<()>;
}

/// Process-local store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Preferences>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new(prefs: Preferences) -> Self {
        Self {
            slot: Arc::new(Mutex::new(prefs)),
            saves: Arc::default(),
        }
    }

    pub fn current(&self) -> Preferences {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful `save` calls.
    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PreferenceStore for MemoryStore {
    fn load(&self) -> Result<Preferences> {
        Ok(self.current())
    }

    fn save(&self, prefs: &Preferences) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = prefs.clone();
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
