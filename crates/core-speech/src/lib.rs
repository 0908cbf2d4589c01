//! Speech output: utterance model, priority queue, backend interface, and
//! earcon playback.
//!
//! Producers anywhere in the runtime enqueue [`Utterance`]s without blocking;
//! a single consumer task ([`queue`]) owns the pluggable [`SpeechBackend`]
//! and decides ordering, interruption, and coalescing. Audio cues are a
//! parallel, fire-and-forget channel ([`cues`]) so navigation feedback never
//! waits behind speech.

use std::fmt;

use tokio_util::sync::CancellationToken;

pub mod cues;
pub mod queue;

#[cfg(feature = "audio")]
pub use cues::EarconPlayer;
pub use cues::{CueKind, CueSink, NullCueSink, RecordingCueSink};
pub use queue::{SpeechHandle, UtteranceQueue};

/// Utterance urgency. Lower value = more urgent; `Interrupt` additionally
/// cancels whatever the backend is currently speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Interrupt,
    High,
    Normal,
    Low,
}

/// An immutable speech request. Created by producers, consumed by the queue,
/// never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub priority: Priority,
    /// Earcon fired when this utterance reaches the backend.
    pub cue: Option<CueKind>,
}

impl Utterance {
    pub fn new(text: impl Into<String>, priority: Priority) -> Self {
        Self {
            text: text.into(),
            priority,
            cue: None,
        }
    }

    pub fn normal(text: impl Into<String>) -> Self {
        Self::new(text, Priority::Normal)
    }

    pub fn high(text: impl Into<String>) -> Self {
        Self::new(text, Priority::High)
    }

    pub fn low(text: impl Into<String>) -> Self {
        Self::new(text, Priority::Low)
    }

    pub fn interrupt(text: impl Into<String>) -> Self {
        Self::new(text, Priority::Interrupt)
    }

    pub fn with_cue(mut self, cue: CueKind) -> Self {
        self.cue = Some(cue);
        self
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.priority, self.text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// The backend failed to render this utterance. Logged and skipped.
    #[error("speech backend: {0}")]
    Backend(String),
    /// The utterance was cancelled mid-speak. Normal termination, never
    /// logged as an error.
    #[error("speech cancelled")]
    Cancelled,
}

/// Pluggable TTS engine. Implementations map the WPM range [150, 450]
/// linearly onto their native rate scale.
///
/// `cancel` must unblock any in-progress `speak` future; implementations
/// without such a primitive emulate it by also observing the per-utterance
/// `CancellationToken` the queue passes in (the queue fires both).
#[async_trait::async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: CancellationToken,
    ) -> Result<(), SpeechError>;
    fn cancel(&self);
    fn set_rate(&self, wpm: u16);
    fn set_voice(&self, name: &str) -> Result<(), SpeechError>;
    fn available_voices(&self) -> Vec<String>;
    fn is_speaking(&self) -> bool;
}

/// Recording backend for tests: captures every speak and cancel, optionally
/// holding each speak open until its token fires.
#[derive(Default)]
pub struct ScriptedBackend {
    state: std::sync::Mutex<ScriptedState>,
    /// When true, `speak` blocks until the utterance token is cancelled,
    /// simulating a long utterance.
    pub hold_until_cancelled: bool,
}

#[derive(Default)]
struct ScriptedState {
    spoken: Vec<Utterance>,
    cancels: usize,
    speaking: bool,
    voice: Option<String>,
    rate: Option<u16>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding() -> Self {
        Self {
            hold_until_cancelled: true,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.state.lock().unwrap().spoken.clone()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .spoken
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn cancel_count(&self) -> usize {
        self.state.lock().unwrap().cancels
    }

    pub fn last_rate(&self) -> Option<u16> {
        self.state.lock().unwrap().rate
    }

    pub fn last_voice(&self) -> Option<String> {
        self.state.lock().unwrap().voice.clone()
    }
}

#[async_trait::async_trait]
impl SpeechBackend for ScriptedBackend {
    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: CancellationToken,
    ) -> Result<(), SpeechError> {
        {
            let mut st = self.state.lock().unwrap();
            st.spoken.push(utterance.clone());
            st.speaking = true;
        }
        if self.hold_until_cancelled {
            cancel.cancelled().await;
            self.state.lock().unwrap().speaking = false;
            return Err(SpeechError::Cancelled);
        }
        if cancel.is_cancelled() {
            self.state.lock().unwrap().speaking = false;
            return Err(SpeechError::Cancelled);
        }
        self.state.lock().unwrap().speaking = false;
        Ok(())
    }

    fn cancel(&self) {
        let mut st = self.state.lock().unwrap();
        st.cancels += 1;
        st.speaking = false;
    }

    fn set_rate(&self, wpm: u16) {
        self.state.lock().unwrap().rate = Some(wpm);
    }

    fn set_voice(&self, name: &str) -> Result<(), SpeechError> {
        self.state.lock().unwrap().voice = Some(name.to_string());
        Ok(())
    }

    fn available_voices(&self) -> Vec<String> {
        vec!["Test Default".into(), "Test Alto".into()]
    }

    fn is_speaking(&self) -> bool {
        self.state.lock().unwrap().speaking
    }
}
