//! The command handler: the bus subscriber that turns dispatched events
//! into cursor movement, quick navigation, announcements, mode changes,
//! and speech.
//!
//! One handler instance owns the session's cursor and the modal
//! Elements-List state. While the dialog is open the dispatcher's bypass
//! flag is raised, so every key reaches the dialog as a raw event and the
//! keymap stays out of the way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use core_a11y::LiveRegionMonitor;
use core_config::SettingsHandle;
use core_events::{
    BusSubscriber, ElementSummary, Event, EventPayload, KeyEvent, NavCommand, Politeness,
};
use core_nav::{announce, quick_nav, AnnounceSource, NavOutcome, VerbosityProfile};
use core_speech::{CueSink, Priority, SpeechHandle, Utterance};
use core_vbuf::Cursor;
use tracing::{debug, trace};

use crate::{DocumentStore, ElementsList, ListEvent, ModeManager, SayAll};

pub struct CommandHandler {
    store: DocumentStore,
    cursor: Arc<Mutex<Cursor>>,
    mode: ModeManager,
    say_all: Arc<SayAll>,
    speech: SpeechHandle,
    cues: Arc<dyn CueSink>,
    settings: SettingsHandle,
    live: LiveRegionMonitor,
    dialog: Mutex<Option<ElementsList>>,
    /// Shared with the key dispatcher; raised while the dialog is modal.
    dispatch_bypass: Arc<AtomicBool>,
}

impl CommandHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: DocumentStore,
        cursor: Arc<Mutex<Cursor>>,
        mode: ModeManager,
        say_all: Arc<SayAll>,
        speech: SpeechHandle,
        cues: Arc<dyn CueSink>,
        settings: SettingsHandle,
        dispatch_bypass: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            cursor,
            mode,
            say_all,
            speech,
            cues,
            settings,
            live: LiveRegionMonitor::new(),
            dialog: Mutex::new(None),
            dispatch_bypass,
        }
    }

    fn profile(&self) -> VerbosityProfile {
        let settings = self.settings.snapshot();
        let mut profile = VerbosityProfile::for_level(settings.verbosity);
        if !settings.announce_visited_links {
            profile.visited = false;
        }
        profile
    }

    fn speak(&self, text: impl Into<String>, priority: Priority) {
        let text = text.into();
        if !text.is_empty() {
            self.speech.enqueue(Utterance::new(text, priority));
        }
    }

    fn announce_node(&self, node_id: core_vbuf::NodeId, position: Option<(usize, usize)>) {
        let doc = self.store.snapshot();
        let Some(node) = doc.node(node_id) else { return };
        let mut source = AnnounceSource::from(node);
        source.position = position;
        self.speak(announce(&source, &self.profile()), Priority::Normal);
    }

    fn open_dialog(&self) {
        let doc = self.store.snapshot();
        let dialog = ElementsList::new(doc);
        let first = dialog.selected().map(|(_, text)| text);
        self.speak(
            format!("Elements list, {}", dialog.tab().title()),
            Priority::High,
        );
        if let Some(text) = first {
            self.speak(text, Priority::Normal);
        }
        *self.dialog.lock().expect("dialog lock") = Some(dialog);
        self.dispatch_bypass.store(true, Ordering::Release);
        debug!(target: "session.elements", "dialog_open");
    }

    fn close_dialog(&self) {
        *self.dialog.lock().expect("dialog lock") = None;
        self.dispatch_bypass.store(false, Ordering::Release);
        debug!(target: "session.elements", "dialog_close");
    }

    pub fn dialog_is_open(&self) -> bool {
        self.dialog.lock().expect("dialog lock").is_some()
    }

    /// Route a raw key into the open dialog. Returns `true` when the key
    /// was consumed by the dialog.
    fn dialog_key(&self, key: KeyEvent) -> bool {
        let mut guard = self.dialog.lock().expect("dialog lock");
        let Some(dialog) = guard.as_mut() else {
            return false;
        };
        match dialog.handle_key(key) {
            ListEvent::Pending => {
                if key.down {
                    if let Some((_, text)) = dialog.selected() {
                        drop(guard);
                        self.speak(text, Priority::High);
                    }
                }
            }
            ListEvent::Selected(node_id) => {
                let doc = self.store.snapshot();
                if let Some(node) = doc.node(node_id) {
                    self.cursor
                        .lock()
                        .expect("cursor lock")
                        .move_to(&doc, node.range.start);
                }
                drop(guard);
                self.close_dialog();
                self.announce_node(node_id, None);
            }
            ListEvent::Cancelled => {
                drop(guard);
                self.close_dialog();
                self.speak("Closed", Priority::High);
            }
        }
        true
    }

    fn handle_command(&self, command: NavCommand) {
        // Any command other than the starter interrupts a running read.
        if command != NavCommand::SayAll && self.say_all.is_reading() {
            self.say_all.cancel();
        }
        if self.mode.swallows(command) {
            trace!(target: "session.handler", ?command, "swallowed_in_focus");
            return;
        }

        let doc = self.store.snapshot();
        match command {
            NavCommand::ToggleMode => self.mode.toggle(),
            NavCommand::StopSpeech => {
                self.say_all.cancel();
                self.speech.stop();
            }
            NavCommand::SayAll => self.say_all.start(),
            NavCommand::ElementsList => self.open_dialog(),
            NavCommand::ActivateElement => {
                let cursor = self.cursor.lock().expect("cursor lock");
                if let Some(node) = cursor.current_node(&doc) {
                    self.mode.on_activate(&node.control_type, node.focusable);
                }
            }
            NavCommand::ReadCurrentLine => {
                let line = self.cursor.lock().expect("cursor lock").current_line(&doc);
                if let Some(line) = line {
                    self.speak(line, Priority::Normal);
                }
            }
            NavCommand::ReadCurrentWord => {
                let word = self.cursor.lock().expect("cursor lock").current_word(&doc);
                if let Some(word) = word {
                    self.speak(word, Priority::Normal);
                }
            }
            NavCommand::NextLine
            | NavCommand::PrevLine
            | NavCommand::NextWord
            | NavCommand::PrevWord
            | NavCommand::NextChar
            | NavCommand::PrevChar => {
                let mut cursor = self.cursor.lock().expect("cursor lock");
                let moved = match command {
                    NavCommand::NextLine => cursor.next_line(&doc),
                    NavCommand::PrevLine => cursor.prev_line(&doc),
                    NavCommand::NextWord => cursor.next_word(&doc),
                    NavCommand::PrevWord => cursor.prev_word(&doc),
                    NavCommand::NextChar => cursor.next_char(&doc),
                    NavCommand::PrevChar => cursor.prev_char(&doc),
                    _ => unreachable!(),
                };
                drop(cursor);
                if let Some(text) = moved {
                    self.speak(text, Priority::Normal);
                }
            }
            other => {
                let mut cursor = self.cursor.lock().expect("cursor lock");
                let outcome = quick_nav(&doc, &mut cursor, other, self.cues.as_ref());
                drop(cursor);
                if let NavOutcome::Moved { node, position, .. } = outcome {
                    let position = self.profile().position_info.then_some(position);
                    self.announce_node(node, position);
                }
            }
        }
    }
}

impl BusSubscriber for CommandHandler {
    fn on_command(&self, command: NavCommand, _event: &Event) -> anyhow::Result<()> {
        if self.dialog_is_open() {
            // The bypass makes this unreachable in practice; commands from a
            // race at open time are dropped rather than applied under the
            // dialog.
            return Ok(());
        }
        self.handle_command(command);
        Ok(())
    }

    fn on_raw_key(&self, key: KeyEvent, _event: &Event) -> anyhow::Result<()> {
        if self.dialog_key(key) {
            return Ok(());
        }
        // Any key-down interrupts continuous reading. Key-ups are ignored so
        // the release of the starting chord does not cancel it.
        if key.down && self.say_all.is_reading() {
            self.say_all.cancel();
        }
        Ok(())
    }

    fn on_focus(&self, event: &Event) -> anyhow::Result<()> {
        let EventPayload::FocusChanged(summary) = &event.payload else {
            return Ok(());
        };
        self.mode.on_focus_changed(summary);
        let text = announce(&AnnounceSource::from(summary), &self.profile());
        self.speak(text, Priority::High);
        Ok(())
    }

    fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        match &event.payload {
            EventPayload::LiveRegionChanged {
                source_id,
                text,
                politeness,
            } => {
                let source = (!source_id.is_empty()).then_some(source_id.as_str());
                if self.live.should_announce(source, text, *politeness) {
                    let priority = match politeness {
                        Politeness::Assertive => Priority::Interrupt,
                        Politeness::Polite => Priority::Normal,
                    };
                    self.speak(text.clone(), priority);
                }
            }
            EventPayload::TypingEcho { text, .. } => {
                self.speak(text.clone(), Priority::High);
            }
            EventPayload::Notification { text } => {
                self.speak(text.clone(), Priority::Normal);
            }
            EventPayload::PropertyChanged {
                property: core_events::PropertyKind::ExpandCollapse,
                value,
                ..
            } => {
                let expanded = value.eq_ignore_ascii_case("expanded")
                    || core_a11y::translate::truthy(value);
                self.speak(
                    if expanded { "expanded" } else { "collapsed" },
                    Priority::High,
                );
            }
            // Mode transitions already spoke through the manager; structure
            // changes are handled by the buffer refresher; name changes
            // surface through live regions.
            _ => {}
        }
        Ok(())
    }
}
