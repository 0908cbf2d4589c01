//! Keyboard capture: the OS hook boundary, the fixed-capacity key queue, and
//! typing echo.
//!
//! The hook callback is the hottest path in the process: the OS silently
//! removes low-level hooks whose callbacks are slow, taking all input with
//! them. Everything on that path is therefore fixed-size and wait-free:
//! read the hook struct, sample modifier state, `push` into the
//! [`KeyQueue`], forward to the next hook. No heap allocation, no logging,
//! no locks. Interpretation (modifier tracking, command resolution, echo)
//! happens on the consumer side of the queue.

pub mod echo;
pub mod queue;
pub mod source;
pub mod tracker;
pub mod vk;

#[cfg(windows)]
pub mod win32;

pub use echo::TypingEchoHandler;
pub use queue::{KeyQueue, KeyQueuePop, KeyQueuePush, KEY_QUEUE_CAPACITY};
pub use source::{CaptureSource, ScriptedCapture};
pub use tracker::ModifierTracker;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The OS refused the hook (privilege, policy, or resource limits). The
    /// process stays alive with no input.
    #[error("hook install failed: {0}")]
    InstallFailed(String),
    #[error("capture source already started")]
    AlreadyStarted,
}
