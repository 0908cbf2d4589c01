//! Key dispatch: the consumer side of the capture queue.
//!
//! A dedicated consumer thread owns modifier tracking and command
//! resolution, posting the result onto the bus:
//!
//! - key-down with a resolution -> `NavigationCommand`, key consumed;
//! - key-down without          -> `RawKey`, key passes through;
//! - key-up                    -> always `RawKey` (typing echo needs it).
//!
//! The current mode is snapshotted per event from the shared [`ModeCell`];
//! resolution probes the exact (mods, vk, mode) triple.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use core_events::{Event, EventPayload, EventSink, KeyEvent, ModeCell};
use core_input::{KeyQueuePop, ModifierTracker};
use tracing::{debug, trace};

use crate::Keymap;

/// What the dispatcher decided for one key event. `Consumed` keys must not
/// reach the foreground application; the platform hook layer enforces that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Consumed,
    PassThrough,
}

/// Pure dispatch core, separable from the consumer thread for tests.
pub struct KeyDispatcher {
    keymap: Arc<Keymap>,
    mode: ModeCell,
    tracker: ModifierTracker,
    reader_vk: Arc<AtomicU16>,
    /// While set, resolution is suspended and every key flows through as a
    /// raw event (modal dialogs, the first-run wizard).
    bypass: Arc<AtomicBool>,
    sink: Arc<dyn EventSink>,
}

impl KeyDispatcher {
    pub fn new(
        keymap: Arc<Keymap>,
        mode: ModeCell,
        reader_vk: Arc<AtomicU16>,
        bypass: Arc<AtomicBool>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let tracker = ModifierTracker::new(reader_vk.load(Ordering::Relaxed));
        Self {
            keymap,
            mode,
            tracker,
            reader_vk,
            bypass,
            sink,
        }
    }

    pub fn handle(&mut self, event: KeyEvent) -> DispatchOutcome {
        // The reader key is re-bindable at runtime (settings, wizard).
        let configured = self.reader_vk.load(Ordering::Relaxed);
        if configured != self.tracker.reader_vk() {
            self.tracker.set_reader_vk(configured);
        }

        let mods = self.tracker.apply(&event);
        let effective = KeyEvent { mods, ..event };

        if event.down && !self.bypass.load(Ordering::Relaxed) {
            let mode = self.mode.get();
            if let Some(command) = self.keymap.resolve(mods, event.vk, mode) {
                trace!(target: "input.dispatch", ?command, vk = event.vk, %mode, "command");
                self.sink
                    .post(Event::new(EventPayload::NavigationCommand(command)));
                return DispatchOutcome::Consumed;
            }
        }

        self.sink
            .post(Event::new(EventPayload::RawKey(effective)));
        DispatchOutcome::PassThrough
    }
}

/// The consumer thread. Exits when the capture side of the queue is gone.
pub struct InputConsumer {
    handle: Option<JoinHandle<()>>,
}

impl InputConsumer {
    pub fn spawn(
        pop: KeyQueuePop,
        keymap: Arc<Keymap>,
        mode: ModeCell,
        reader_vk: Arc<AtomicU16>,
        bypass: Arc<AtomicBool>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let handle = std::thread::Builder::new()
            .name("lector-input".into())
            .spawn(move || {
                let mut dispatcher = KeyDispatcher::new(keymap, mode, reader_vk, bypass, sink);
                while let Some(event) = pop.recv() {
                    dispatcher.handle(event);
                }
                debug!(target: "input.dispatch", "consumer_stop");
            })
            .expect("spawn input consumer");
        Self {
            handle: Some(handle),
        }
    }

    /// Wait for the thread after the producers are gone.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
