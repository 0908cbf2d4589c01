//! Settings loading, persistence, and runtime snapshots.
//!
//! The settings file is a single JSON object with a fixed key set (external
//! contract; other tools read and write the same file). Loading is tolerant:
//! missing keys take their defaults via serde, a malformed file falls back to
//! the bundled defaults file, and a missing/invalid bundled file falls back
//! to the built-in defaults. A load never fails the caller.
//!
//! Runtime access goes through [`SettingsHandle`]: readers get an `Arc`
//! snapshot (cheap, lock held only for the pointer clone), writers serialize
//! behind the same lock and swap a new snapshot in whole. Consumers that
//! cache derived state (echo mode, speech rate) re-read on the change
//! notification rather than holding references into an old snapshot.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Spoken-detail level. Profiles are resolved in `core-nav`; the setting
/// itself is just the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VerbosityLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// What gets echoed while the user types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TypingEchoMode {
    None,
    Characters,
    Words,
    #[default]
    Both,
}

/// Which physical key acts as the screen-reader modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModifierKey {
    #[default]
    Insert,
    CapsLock,
}

impl fmt::Display for ModifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierKey::Insert => f.write_str("Insert"),
            ModifierKey::CapsLock => f.write_str("CapsLock"),
        }
    }
}

pub const SPEECH_RATE_MIN: u16 = 150;
pub const SPEECH_RATE_MAX: u16 = 450;

/// The persisted settings record. Field names match the on-disk JSON keys
/// exactly; do not rename without migrating existing files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "VerbosityLevel")]
    pub verbosity: VerbosityLevel,
    #[serde(rename = "SpeechRateWpm")]
    pub speech_rate_wpm: u16,
    #[serde(rename = "VoiceName")]
    pub voice_name: Option<String>,
    #[serde(rename = "TypingEchoMode")]
    pub typing_echo: TypingEchoMode,
    #[serde(rename = "AudioCuesEnabled")]
    pub audio_cues_enabled: bool,
    #[serde(rename = "AnnounceVisitedLinks")]
    pub announce_visited_links: bool,
    #[serde(rename = "ModifierKey")]
    pub modifier_key: ModifierKey,
    #[serde(rename = "FirstRunCompleted")]
    pub first_run_completed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbosity: VerbosityLevel::Beginner,
            speech_rate_wpm: 200,
            voice_name: None,
            typing_echo: TypingEchoMode::Both,
            audio_cues_enabled: true,
            announce_visited_links: true,
            modifier_key: ModifierKey::Insert,
            first_run_completed: false,
        }
    }
}

impl Settings {
    /// Clamp fields whose valid range the file format cannot express.
    pub fn sanitized(mut self) -> Self {
        self.speech_rate_wpm = self.speech_rate_wpm.clamp(SPEECH_RATE_MIN, SPEECH_RATE_MAX);
        self
    }
}

/// Best-effort settings path following platform conventions.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("lector.json");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("lector").join("lector.json");
    }
    PathBuf::from("lector.json")
}

fn parse_file(path: &Path) -> Option<Settings> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Settings>(&content) {
        Ok(settings) => Some(settings.sanitized()),
        Err(error) => {
            warn!(target: "config", file = %path.display(), %error, "settings_parse_failed");
            None
        }
    }
}

/// Load settings with the full fallback chain: `path` (or the discovered
/// location), then `bundled` defaults, then built-in defaults.
pub fn load(path: Option<&Path>, bundled: Option<&Path>) -> Settings {
    let user_path = path.map(Path::to_path_buf).unwrap_or_else(discover);
    if let Some(settings) = parse_file(&user_path) {
        debug!(target: "config", file = %user_path.display(), "settings_loaded");
        return settings;
    }
    if let Some(bundled) = bundled {
        if let Some(settings) = parse_file(bundled) {
            info!(target: "config", file = %bundled.display(), "settings_fallback_bundled");
            return settings;
        }
    }
    info!(target: "config", "settings_fallback_builtin");
    Settings::default()
}

/// Persist settings as pretty JSON, atomically (write-then-rename), creating
/// parent directories as needed.
pub fn save(settings: &Settings, path: &Path) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    debug!(target: "config", file = %path.display(), "settings_saved");
    Ok(())
}

/// Atomically swappable settings snapshot shared across the runtime.
///
/// Readers call `snapshot()` and keep the `Arc` for the duration of one
/// operation; writers go through `update`, which swaps a whole new snapshot
/// and bumps a generation counter observable via `generation()`.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<Mutex<(Arc<Settings>, u64)>>,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new((Arc::new(settings), 0))),
        }
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        self.inner.lock().expect("settings lock poisoned").0.clone()
    }

    /// Monotonic change counter; consumers poll it to invalidate caches.
    pub fn generation(&self) -> u64 {
        self.inner.lock().expect("settings lock poisoned").1
    }

    /// Apply `mutate` to a copy of the current snapshot and swap it in.
    /// Returns the new snapshot.
    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) -> Arc<Settings> {
        let mut guard = self.inner.lock().expect("settings lock poisoned");
        let mut next = (*guard.0).clone();
        mutate(&mut next);
        let next = Arc::new(next.sanitized());
        guard.0 = next.clone();
        guard.1 += 1;
        next
    }
}
