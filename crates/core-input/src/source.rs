//! Capture-source abstraction over the OS keyboard hook.
//!
//! The real source ([`crate::win32::Win32Hook`] on Windows) installs a
//! process-global low-level hook on its own message-pump thread. Everything
//! downstream is platform-neutral, so tests and replay tooling drive the
//! same pipeline through [`ScriptedCapture`].

use core_events::KeyEvent;

use crate::{CaptureError, KeyQueuePush};

pub trait CaptureSource: Send {
    /// Begin pushing key events into `queue`. Returns once capture is
    /// established; a failed install reports [`CaptureError::InstallFailed`]
    /// and the process continues with no input.
    fn start(&mut self, queue: KeyQueuePush) -> Result<(), CaptureError>;

    /// Tear down capture. Must release OS resources within the 2 s disposal
    /// budget; idempotent.
    fn stop(&mut self);
}

/// In-process source for tests: events handed to `push` flow through the
/// exact queue/consumer path the hook uses.
pub struct ScriptedCapture {
    queue: Option<KeyQueuePush>,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self { queue: None }
    }

    /// Inject one event as if the hook observed it.
    pub fn push(&self, event: KeyEvent) {
        if let Some(queue) = &self.queue {
            queue.push(event);
        }
    }

    /// Convenience: a full press (down then up).
    pub fn press(&self, event: KeyEvent) {
        self.push(KeyEvent { down: true, ..event });
        self.push(KeyEvent {
            down: false,
            ..event
        });
    }
}

impl Default for ScriptedCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for ScriptedCapture {
    fn start(&mut self, queue: KeyQueuePush) -> Result<(), CaptureError> {
        if self.queue.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        self.queue = Some(queue);
        Ok(())
    }

    fn stop(&mut self) {
        self.queue = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyQueue;
    use core_events::ModMask;

    #[test]
    fn scripted_capture_feeds_queue() {
        let (push, pop) = KeyQueue::bounded();
        let mut source = ScriptedCapture::new();
        source.start(push).unwrap();
        source.press(KeyEvent::down(0x48, ModMask::empty()));
        assert!(pop.recv().unwrap().down);
        assert!(!pop.recv().unwrap().down);

        assert!(matches!(
            source.start(KeyQueue::bounded().0),
            Err(CaptureError::AlreadyStarted)
        ));
        source.stop();
        source.push(KeyEvent::down(0x49, ModMask::empty()));
        assert!(pop.try_recv().is_none());
    }
}
