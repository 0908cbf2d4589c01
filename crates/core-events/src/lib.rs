//! Core event types and channel policy for Lector.
//!
//! Everything the rest of the runtime exchanges travels through the types in
//! this crate as plain values: the keyboard hook, the accessibility fan-in,
//! and the speech layer never hand each other live platform objects. An
//! [`Event`] therefore carries every field a downstream consumer needs to
//! act without calling back into the platform, which is what allows the bus
//! consumer to run on a single task with no re-entrancy.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

pub mod bus;
pub mod control;

pub use bus::{BusHandle, BusSubscriber, EventBus};

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters, inspectable from tests or periodically logged. No locking on any
// producer path.
pub static EVENTS_POSTED: AtomicU64 = AtomicU64::new(0);
pub static FOCUS_EVENTS_COLLAPSED: AtomicU64 = AtomicU64::new(0);
pub static SUBSCRIBER_ERRORS: AtomicU64 = AtomicU64::new(0);
pub static KEYS_DROPPED_OLDEST: AtomicU64 = AtomicU64::new(0);

/// Screen-reader interaction mode. Process-wide; transitions are owned by the
/// session layer and broadcast as [`EventPayload::ModeChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Single-letter keys are consumed for quick navigation.
    #[default]
    Browse,
    /// Keys pass through to the focused application except reserved chords.
    Focus,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Browse => "Browse",
            Mode::Focus => "Focus",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide current mode, readable from any thread. The session layer is
/// the only writer; the key dispatcher snapshots it per key event.
#[derive(Clone, Default)]
pub struct ModeCell {
    inner: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl ModeCell {
    pub fn new(mode: Mode) -> Self {
        let cell = Self::default();
        cell.set(mode);
        cell
    }

    pub fn get(&self) -> Mode {
        if self.inner.load(std::sync::atomic::Ordering::Acquire) {
            Mode::Focus
        } else {
            Mode::Browse
        }
    }

    pub fn set(&self, mode: Mode) {
        self.inner.store(
            matches!(mode, Mode::Focus),
            std::sync::atomic::Ordering::Release,
        );
    }
}

bitflags::bitflags! {
    /// Modifier state sampled at hook time. READER is the user-chosen
    /// screen-reader modifier (Insert or CapsLock).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ModMask: u8 {
        const SHIFT  = 0b0000_0001;
        const CTRL   = 0b0000_0010;
        const ALT    = 0b0000_0100;
        const READER = 0b0000_1000;
    }
}

/// One keyboard transition as captured by the low-level hook.
///
/// Fixed-size and `Copy`; the hook callback writes these into a wait-free
/// queue, so the type must never grow a heap field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// Virtual-key code as reported by the OS.
    pub vk: u16,
    pub mods: ModMask,
    /// `true` for key-down (including auto-repeat), `false` for key-up.
    pub down: bool,
    /// OS tick of the hardware event, milliseconds. Wraps; only deltas are
    /// meaningful.
    pub time_ms: u32,
}

impl KeyEvent {
    pub fn down(vk: u16, mods: ModMask) -> Self {
        Self {
            vk,
            mods,
            down: true,
            time_ms: 0,
        }
    }

    pub fn up(vk: u16, mods: ModMask) -> Self {
        Self {
            vk,
            mods,
            down: false,
            time_ms: 0,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vk={:#04x} mods={:?} {}",
            self.vk,
            self.mods,
            if self.down { "down" } else { "up" }
        )
    }
}

/// Live-region politeness. Polite changes are throttled and never interrupt;
/// assertive changes bypass the throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Politeness {
    Polite,
    Assertive,
}

/// Which property changed in a `PropertyChanged` notification. Only the two
/// properties the reader reacts to are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Name,
    ExpandCollapse,
}

/// Value snapshot of an accessible element, taken on the platform callback
/// thread from already-cached properties. This is the only shape in which
/// element data crosses out of the accessibility layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementSummary {
    pub runtime_id: Vec<i32>,
    pub name: String,
    /// Short control-type tag ("Button", "Edit", "Hyperlink", ...).
    pub control_type: String,
    /// 0 means "not a heading"; 1..=6 otherwise.
    pub heading_level: u8,
    /// One of the eight landmark names, or empty.
    pub landmark: String,
    pub link: bool,
    pub visited: bool,
    pub required: bool,
    pub expandable: bool,
    pub expanded: bool,
    pub focusable: bool,
    pub description: String,
}

impl ElementSummary {
    /// Minimal summary used when per-element reads fail mid-callback: the
    /// signal is preserved even if every property read degraded.
    pub fn minimal(runtime_id: Vec<i32>) -> Self {
        Self {
            runtime_id,
            ..Self::default()
        }
    }
}

/// The closed set of navigation commands the keymap can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavCommand {
    NextHeading,
    PrevHeading,
    HeadingLevel(u8),
    NextLink,
    PrevLink,
    NextLandmark,
    PrevLandmark,
    NextFormField,
    PrevFormField,
    NextTable,
    PrevTable,
    NextFocusable,
    PrevFocusable,
    NextLine,
    PrevLine,
    NextWord,
    PrevWord,
    NextChar,
    PrevChar,
    ActivateElement,
    ToggleMode,
    SayAll,
    StopSpeech,
    ElementsList,
    ReadCurrentLine,
    ReadCurrentWord,
}

impl NavCommand {
    /// Stable name used by keymap files. `HeadingLevel(n)` round-trips as
    /// `HeadingLevelN` for N in 1..=6.
    pub fn name(&self) -> String {
        match self {
            NavCommand::HeadingLevel(n) => format!("HeadingLevel{n}"),
            other => format!("{other:?}"),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let cmd = match name {
            "NextHeading" => NavCommand::NextHeading,
            "PrevHeading" => NavCommand::PrevHeading,
            "HeadingLevel1" => NavCommand::HeadingLevel(1),
            "HeadingLevel2" => NavCommand::HeadingLevel(2),
            "HeadingLevel3" => NavCommand::HeadingLevel(3),
            "HeadingLevel4" => NavCommand::HeadingLevel(4),
            "HeadingLevel5" => NavCommand::HeadingLevel(5),
            "HeadingLevel6" => NavCommand::HeadingLevel(6),
            "NextLink" => NavCommand::NextLink,
            "PrevLink" => NavCommand::PrevLink,
            "NextLandmark" => NavCommand::NextLandmark,
            "PrevLandmark" => NavCommand::PrevLandmark,
            "NextFormField" => NavCommand::NextFormField,
            "PrevFormField" => NavCommand::PrevFormField,
            "NextTable" => NavCommand::NextTable,
            "PrevTable" => NavCommand::PrevTable,
            "NextFocusable" => NavCommand::NextFocusable,
            "PrevFocusable" => NavCommand::PrevFocusable,
            "NextLine" => NavCommand::NextLine,
            "PrevLine" => NavCommand::PrevLine,
            "NextWord" => NavCommand::NextWord,
            "PrevWord" => NavCommand::PrevWord,
            "NextChar" => NavCommand::NextChar,
            "PrevChar" => NavCommand::PrevChar,
            "ActivateElement" => NavCommand::ActivateElement,
            "ToggleMode" => NavCommand::ToggleMode,
            "SayAll" => NavCommand::SayAll,
            "StopSpeech" => NavCommand::StopSpeech,
            "ElementsList" => NavCommand::ElementsList,
            "ReadCurrentLine" => NavCommand::ReadCurrentLine,
            "ReadCurrentWord" => NavCommand::ReadCurrentWord,
            _ => return None,
        };
        Some(cmd)
    }
}

/// Payload of a screen-reader event. Emission rules live with each
/// producer; consumers must treat these as immutable values.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// The platform reported a new focused element.
    FocusChanged(ElementSummary),
    /// The keymap resolved a consumed key into a command.
    NavigationCommand(NavCommand),
    /// A key the keymap did not consume (and every key-up).
    RawKey(KeyEvent),
    /// A live region's text changed; `source_id` is the joined runtime id of
    /// the region, empty when the platform supplied none.
    LiveRegionChanged {
        source_id: String,
        text: String,
        politeness: Politeness,
    },
    /// Posted by the session layer on every actual Browse/Focus transition,
    /// never on a no-op.
    ModeChanged { mode: Mode, reason: String },
    /// Character or word echo produced while the user types.
    TypingEcho { text: String, is_word: bool },
    /// A subtree rooted at `runtime_id` was added, removed or replaced. The
    /// new subtree (if any) is re-read through the accessibility host by the
    /// consumer; the event itself stays value-only.
    StructureChanged { runtime_id: Vec<i32> },
    PropertyChanged {
        runtime_id: Vec<i32>,
        property: PropertyKind,
        value: String,
    },
    /// Free-form platform notification text (e.g. UIA Notification events).
    Notification { text: String },
}

/// A timestamped screen-reader event.
#[derive(Debug, Clone)]
pub struct Event {
    /// Monotonic capture instant, taken when the producer built the event.
    pub at: Instant,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            at: Instant::now(),
            payload,
        }
    }

    pub fn is_focus(&self) -> bool {
        matches!(self.payload, EventPayload::FocusChanged(_))
    }
}

/// Non-blocking event destination. Producers (hook consumer, platform
/// callbacks, session layer) hold a sink, never the bus itself.
///
/// `post` must not block and must not fail visibly; a closed bus is a
/// shutdown-order situation and is logged by the implementation.
pub trait EventSink: Send + Sync {
    fn post(&self, event: Event);
}

/// Helper result alias used across the runtime crates.
pub type EventResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_event_is_small_and_copy() {
        // The hook queue stores these by value; keep the payload flat.
        assert!(std::mem::size_of::<KeyEvent>() <= 12);
        let k = KeyEvent::down(0x48, ModMask::READER);
        let k2 = k; // Copy
        assert_eq!(k, k2);
    }

    #[test]
    fn nav_command_names_round_trip() {
        let all = [
            NavCommand::NextHeading,
            NavCommand::PrevHeading,
            NavCommand::HeadingLevel(1),
            NavCommand::HeadingLevel(6),
            NavCommand::NextLink,
            NavCommand::PrevLink,
            NavCommand::NextLandmark,
            NavCommand::PrevLandmark,
            NavCommand::NextFormField,
            NavCommand::PrevFormField,
            NavCommand::NextTable,
            NavCommand::PrevTable,
            NavCommand::NextFocusable,
            NavCommand::PrevFocusable,
            NavCommand::NextLine,
            NavCommand::PrevLine,
            NavCommand::NextWord,
            NavCommand::PrevWord,
            NavCommand::NextChar,
            NavCommand::PrevChar,
            NavCommand::ActivateElement,
            NavCommand::ToggleMode,
            NavCommand::SayAll,
            NavCommand::StopSpeech,
            NavCommand::ElementsList,
            NavCommand::ReadCurrentLine,
            NavCommand::ReadCurrentWord,
        ];
        for cmd in all {
            assert_eq!(NavCommand::from_name(&cmd.name()), Some(cmd));
        }
        assert_eq!(NavCommand::from_name("HeadingLevel7"), None);
        assert_eq!(NavCommand::from_name("nextheading"), None);
    }

    #[test]
    fn minimal_summary_keeps_runtime_id() {
        let s = ElementSummary::minimal(vec![42, 7]);
        assert_eq!(s.runtime_id, vec![42, 7]);
        assert!(s.name.is_empty());
        assert_eq!(s.heading_level, 0);
    }

    #[test]
    fn mode_display() {
        assert_eq!(Mode::Browse.to_string(), "Browse");
        assert_eq!(Mode::Focus.to_string(), "Focus");
        assert_eq!(Mode::default(), Mode::Browse);
    }
}
