//! Browse/Focus mode transitions.
//!
//! Kept synchronous and isolated, mirroring how navigation commands flow
//! around it: a transition fires exactly three effects, namely the earcon,
//! an Interrupt-priority announcement, and a `ModeChanged` bus event with a
//! human-readable reason. A no-op set never fires anything.

use std::sync::Arc;

use core_events::{control, ElementSummary, Event, EventPayload, EventSink, Mode, ModeCell, NavCommand};
use core_speech::{CueKind, CueSink, SpeechHandle, Utterance};
use tracing::debug;

/// Edit-field predicate used by element activation: form control type or
/// focusable.
pub fn is_edit_field(control_type: &str, focusable: bool) -> bool {
    control::is_form_field_type(control_type) || focusable
}

pub struct ModeManager {
    mode: ModeCell,
    sink: Arc<dyn EventSink>,
    speech: SpeechHandle,
    cues: Arc<dyn CueSink>,
}

impl ModeManager {
    pub fn new(
        mode: ModeCell,
        sink: Arc<dyn EventSink>,
        speech: SpeechHandle,
        cues: Arc<dyn CueSink>,
    ) -> Self {
        Self {
            mode,
            sink,
            speech,
            cues,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode.get()
    }

    /// Transition to `target`; a no-op when already there.
    pub fn set(&self, target: Mode, reason: &str) {
        if self.mode.get() == target {
            return;
        }
        self.mode.set(target);
        debug!(target: "session.mode", mode = %target, reason, "transition");
        let (cue, label) = match target {
            Mode::Browse => (CueKind::BrowseMode, "Browse mode"),
            Mode::Focus => (CueKind::FocusMode, "Focus mode"),
        };
        self.cues.play(cue);
        self.speech.enqueue(Utterance::interrupt(label));
        self.sink.post(Event::new(EventPayload::ModeChanged {
            mode: target,
            reason: reason.to_string(),
        }));
    }

    pub fn toggle(&self) {
        let target = match self.mode.get() {
            Mode::Browse => Mode::Focus,
            Mode::Focus => Mode::Browse,
        };
        self.set(target, "mode toggle command");
    }

    /// Activating an edit field from Browse enters Focus; the activation
    /// itself still goes through to the application.
    pub fn on_activate(&self, control_type: &str, focusable: bool) {
        if self.mode.get() == Mode::Browse && is_edit_field(control_type, focusable) {
            self.set(Mode::Focus, "edit field activated");
        }
    }

    /// Focus landing outside the form-field set while in Focus mode drops
    /// back to Browse.
    pub fn on_focus_changed(&self, summary: &ElementSummary) {
        if self.mode.get() == Mode::Focus && !control::is_form_field_type(&summary.control_type) {
            self.set(Mode::Browse, "focus left form field");
        }
    }

    /// Whether Focus mode swallows this command instead of acting on it.
    /// Mode toggling and speech stopping always work; element activation is
    /// deliberately let through so entering a field still behaves.
    pub fn swallows(&self, command: NavCommand) -> bool {
        self.mode.get() == Mode::Focus
            && !matches!(
                command,
                NavCommand::ToggleMode | NavCommand::StopSpeech | NavCommand::ActivateElement
            )
    }
}
