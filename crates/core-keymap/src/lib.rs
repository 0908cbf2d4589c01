//! Keymap: (modifiers, virtual key, mode) -> navigation command.
//!
//! Resolution is pure and deterministic: it depends only on the probe triple
//! and the compiled table. No side effects; logging only at TRACE for
//! probes. Loading is tolerant per the keymap-file contract: entries that
//! fail to parse are skipped with a warning and the rest of the file still
//! applies.

use std::collections::HashMap;
use std::path::Path;

use core_events::{Mode, ModMask, NavCommand};
use core_input::vk;
use serde::Deserialize;
use tracing::{debug, trace, warn};

pub mod dispatch;

pub use dispatch::{DispatchOutcome, InputConsumer, KeyDispatcher};

#[derive(Debug, thiserror::Error)]
pub enum KeymapError {
    #[error("keymap io: {0}")]
    Io(#[from] std::io::Error),
    #[error("keymap parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Mode selector as written in keymap files. `Any` is expansion sugar: it
/// compiles into one entry per real mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelector {
    Browse,
    Focus,
    Any,
}

impl ModeSelector {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "Browse" => Some(ModeSelector::Browse),
            "Focus" => Some(ModeSelector::Focus),
            "Any" => Some(ModeSelector::Any),
            _ => None,
        }
    }

    fn modes(self) -> smallvec::SmallVec<[Mode; 2]> {
        match self {
            ModeSelector::Browse => smallvec::smallvec![Mode::Browse],
            ModeSelector::Focus => smallvec::smallvec![Mode::Focus],
            ModeSelector::Any => smallvec::smallvec![Mode::Browse, Mode::Focus],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Chord {
    mods: ModMask,
    vk: u16,
    mode: Mode,
}

/// Compiled binding table.
#[derive(Debug, Default)]
pub struct Keymap {
    table: HashMap<Chord, NavCommand>,
}

impl Keymap {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table: quick-nav letters and chords available out of the
    /// box. A user keymap file overlays on top of this (same chord wins).
    pub fn builtin() -> Self {
        let mut map = Self::empty();
        let b = ModeSelector::Browse;
        let any = ModeSelector::Any;
        let none = ModMask::empty();
        let shift = ModMask::SHIFT;
        let ctrl = ModMask::CTRL;
        let reader = ModMask::READER;

        // Browse-mode quick navigation.
        map.bind(none, b'H' as u16, b, NavCommand::NextHeading);
        map.bind(shift, b'H' as u16, b, NavCommand::PrevHeading);
        map.bind(none, b'K' as u16, b, NavCommand::NextLink);
        map.bind(shift, b'K' as u16, b, NavCommand::PrevLink);
        map.bind(none, b'D' as u16, b, NavCommand::NextLandmark);
        map.bind(shift, b'D' as u16, b, NavCommand::PrevLandmark);
        map.bind(none, b'F' as u16, b, NavCommand::NextFormField);
        map.bind(shift, b'F' as u16, b, NavCommand::PrevFormField);
        map.bind(none, b'T' as u16, b, NavCommand::NextTable);
        map.bind(shift, b'T' as u16, b, NavCommand::PrevTable);
        map.bind(none, vk::VK_TAB, b, NavCommand::NextFocusable);
        map.bind(shift, vk::VK_TAB, b, NavCommand::PrevFocusable);
        for level in 1..=6u8 {
            map.bind(
                none,
                vk::VK_0 + level as u16,
                b,
                NavCommand::HeadingLevel(level),
            );
        }

        // Browse-mode reading cursor.
        map.bind(none, vk::VK_DOWN, b, NavCommand::NextLine);
        map.bind(none, vk::VK_UP, b, NavCommand::PrevLine);
        map.bind(ctrl, vk::VK_RIGHT, b, NavCommand::NextWord);
        map.bind(ctrl, vk::VK_LEFT, b, NavCommand::PrevWord);
        map.bind(none, vk::VK_RIGHT, b, NavCommand::NextChar);
        map.bind(none, vk::VK_LEFT, b, NavCommand::PrevChar);
        map.bind(none, vk::VK_RETURN, b, NavCommand::ActivateElement);

        // Chords live in both modes.
        map.bind(reader, vk::VK_SPACE, any, NavCommand::ToggleMode);
        map.bind(none, vk::VK_CONTROL, any, NavCommand::StopSpeech);
        map.bind(reader, vk::VK_DOWN, any, NavCommand::SayAll);
        map.bind(reader, vk::VK_F7, any, NavCommand::ElementsList);
        map.bind(reader, vk::VK_UP, any, NavCommand::ReadCurrentLine);
        map.bind(reader, vk::VK_LEFT, any, NavCommand::ReadCurrentWord);
        map
    }

    pub fn bind(&mut self, mods: ModMask, vk: u16, mode: ModeSelector, command: NavCommand) {
        for mode in mode.modes() {
            self.table.insert(Chord { mods, vk, mode }, command);
        }
    }

    /// Probe the exact triple against the table.
    pub fn resolve(&self, mods: ModMask, vk: u16, mode: Mode) -> Option<NavCommand> {
        let hit = self.table.get(&Chord { mods, vk, mode }).copied();
        trace!(target: "keymap", vk, ?mods, %mode, hit = hit.is_some(), "probe");
        hit
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Overlay `other` on top of this table (other wins on conflict).
    pub fn merge(&mut self, other: Keymap) {
        self.table.extend(other.table);
    }
}

#[derive(Debug, Deserialize)]
struct KeymapFile {
    #[serde(default)]
    bindings: Vec<BindingEntry>,
}

#[derive(Debug, Deserialize)]
struct BindingEntry {
    #[serde(default)]
    modifiers: String,
    #[serde(rename = "vkCode")]
    vk_code: u16,
    mode: String,
    command: String,
}

/// Parse a pipe-separated modifier list ("Shift|Insert"); "None" and the
/// empty string mean no modifiers. Unknown tokens fail the entry.
fn parse_modifiers(s: &str) -> Option<ModMask> {
    let mut mask = ModMask::empty();
    for token in s.split('|').map(str::trim).filter(|t| !t.is_empty()) {
        match token {
            "None" => {}
            "Shift" => mask |= ModMask::SHIFT,
            "Ctrl" => mask |= ModMask::CTRL,
            "Alt" => mask |= ModMask::ALT,
            "Insert" => mask |= ModMask::READER,
            _ => return None,
        }
    }
    Some(mask)
}

/// Outcome of a keymap file load; bad entries are counted, not fatal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded: usize,
    pub skipped: usize,
}

/// Load a keymap file into `map`. IO and top-level JSON errors are the only
/// failures; malformed entries are skipped.
pub fn load_into(map: &mut Keymap, path: &Path) -> Result<LoadStats, KeymapError> {
    let content = std::fs::read_to_string(path)?;
    let file: KeymapFile = serde_json::from_str(&content)?;
    let mut stats = LoadStats::default();

    for (index, entry) in file.bindings.into_iter().enumerate() {
        let mods = parse_modifiers(&entry.modifiers);
        let mode = ModeSelector::parse(&entry.mode);
        let command = NavCommand::from_name(&entry.command);
        match (mods, mode, command) {
            (Some(mods), Some(mode), Some(command)) => {
                map.bind(mods, entry.vk_code, mode, command);
                stats.loaded += 1;
            }
            _ => {
                stats.skipped += 1;
                warn!(
                    target: "keymap",
                    index,
                    modifiers = entry.modifiers.as_str(),
                    mode = entry.mode.as_str(),
                    command = entry.command.as_str(),
                    "binding_skipped"
                );
            }
        }
    }
    debug!(target: "keymap", loaded = stats.loaded, skipped = stats.skipped, file = %path.display(), "keymap_loaded");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_resolves_quick_nav() {
        let map = Keymap::builtin();
        assert_eq!(
            map.resolve(ModMask::empty(), b'H' as u16, Mode::Browse),
            Some(NavCommand::NextHeading)
        );
        assert_eq!(
            map.resolve(ModMask::SHIFT, b'H' as u16, Mode::Browse),
            Some(NavCommand::PrevHeading)
        );
        // Quick-nav letters do not exist in Focus mode.
        assert_eq!(map.resolve(ModMask::empty(), b'H' as u16, Mode::Focus), None);
        // Chords exist in both.
        assert_eq!(
            map.resolve(ModMask::READER, vk::VK_SPACE, Mode::Focus),
            Some(NavCommand::ToggleMode)
        );
        assert_eq!(
            map.resolve(ModMask::READER, vk::VK_SPACE, Mode::Browse),
            Some(NavCommand::ToggleMode)
        );
    }

    #[test]
    fn any_expands_to_both_modes() {
        let mut map = Keymap::empty();
        map.bind(
            ModMask::empty(),
            b'X' as u16,
            ModeSelector::Any,
            NavCommand::StopSpeech,
        );
        assert_eq!(map.len(), 2);
        for mode in [Mode::Browse, Mode::Focus] {
            assert_eq!(
                map.resolve(ModMask::empty(), b'X' as u16, mode),
                Some(NavCommand::StopSpeech)
            );
        }
    }

    #[test]
    fn modifier_parsing() {
        assert_eq!(parse_modifiers(""), Some(ModMask::empty()));
        assert_eq!(parse_modifiers("None"), Some(ModMask::empty()));
        assert_eq!(
            parse_modifiers("Shift|Insert"),
            Some(ModMask::SHIFT | ModMask::READER)
        );
        assert_eq!(parse_modifiers("Hyper"), None);
    }

    #[test]
    fn file_round_trip_and_bad_entry_skipping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keymap.json");
        std::fs::write(
            &path,
            r#"{
                "bindings": [
                    {"modifiers": "Shift", "vkCode": 72, "mode": "Browse", "command": "PrevHeading"},
                    {"modifiers": "Insert", "vkCode": 40, "mode": "Any", "command": "SayAll"},
                    {"modifiers": "Warp", "vkCode": 1, "mode": "Browse", "command": "NextLink"},
                    {"modifiers": "", "vkCode": 2, "mode": "Sideways", "command": "NextLink"},
                    {"modifiers": "", "vkCode": 3, "mode": "Browse", "command": "DoABarrelRoll"}
                ]
            }"#,
        )
        .unwrap();

        let mut map = Keymap::empty();
        let stats = load_into(&mut map, &path).unwrap();
        assert_eq!(stats, LoadStats { loaded: 2, skipped: 3 });

        // Round trip: every surviving binding resolves to its command.
        assert_eq!(
            map.resolve(ModMask::SHIFT, 72, Mode::Browse),
            Some(NavCommand::PrevHeading)
        );
        assert_eq!(
            map.resolve(ModMask::READER, 40, Mode::Browse),
            Some(NavCommand::SayAll)
        );
        assert_eq!(
            map.resolve(ModMask::READER, 40, Mode::Focus),
            Some(NavCommand::SayAll)
        );
    }

    #[test]
    fn user_file_overlays_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keymap.json");
        // Rebind H to NextLink.
        std::fs::write(
            &path,
            r#"{"bindings": [{"modifiers": "", "vkCode": 72, "mode": "Browse", "command": "NextLink"}]}"#,
        )
        .unwrap();
        let mut map = Keymap::builtin();
        load_into(&mut map, &path).unwrap();
        assert_eq!(
            map.resolve(ModMask::empty(), 72, Mode::Browse),
            Some(NavCommand::NextLink)
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut map = Keymap::empty();
        let err = load_into(&mut map, Path::new("/nonexistent/keymap.json")).unwrap_err();
        assert!(matches!(err, KeymapError::Io(_)));
    }
}
