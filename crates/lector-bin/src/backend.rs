//! Logging speech backend.
//!
//! Stands in for a real TTS engine wherever one is not wired up (developer
//! machines, CI, the demo mode): utterances are logged and "spoken" for a
//! duration derived from the configured rate, so interrupt and cancellation
//! behavior is exercised end to end. The WPM range maps linearly onto the
//! simulated pace.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use core_speech::{SpeechBackend, SpeechError, Utterance};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ConsoleBackend {
    rate_wpm: AtomicU16,
    voice: Mutex<String>,
    speaking: AtomicBool,
}

impl ConsoleBackend {
    pub fn new(rate_wpm: u16) -> Self {
        Self {
            rate_wpm: AtomicU16::new(rate_wpm),
            voice: Mutex::new("Console".to_string()),
            speaking: AtomicBool::new(false),
        }
    }

    fn speak_duration(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count().max(1) as u64;
        let wpm = self.rate_wpm.load(Ordering::Relaxed).max(1) as u64;
        Duration::from_millis(words * 60_000 / wpm)
    }
}

#[async_trait::async_trait]
impl SpeechBackend for ConsoleBackend {
    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: CancellationToken,
    ) -> Result<(), SpeechError> {
        info!(target: "speech.console", priority = ?utterance.priority, text = %utterance.text, "speak");
        self.speaking.store(true, Ordering::Release);
        let finished = tokio::select! {
            _ = tokio::time::sleep(self.speak_duration(&utterance.text)) => true,
            _ = cancel.cancelled() => false,
        };
        self.speaking.store(false, Ordering::Release);
        if finished {
            Ok(())
        } else {
            Err(SpeechError::Cancelled)
        }
    }

    fn cancel(&self) {
        // The per-utterance token does the unblocking; nothing persistent to
        // tear down here.
        self.speaking.store(false, Ordering::Release);
    }

    fn set_rate(&self, wpm: u16) {
        self.rate_wpm.store(wpm, Ordering::Relaxed);
    }

    fn set_voice(&self, name: &str) -> Result<(), SpeechError> {
        *self.voice.lock().expect("voice lock") = name.to_string();
        Ok(())
    }

    fn available_voices(&self) -> Vec<String> {
        vec!["Console".to_string()]
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn speak_completes_after_simulated_duration() {
        let backend = ConsoleBackend::new(300);
        let result = backend
            .speak(
                &Utterance::normal("three word line"),
                CancellationToken::new(),
            )
            .await;
        assert!(result.is_ok());
        assert!(!backend.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_speak() {
        let backend = Arc::new(ConsoleBackend::new(150));
        let token = CancellationToken::new();
        let speak = {
            let backend = backend.clone();
            let token = token.clone();
            tokio::spawn(async move {
                backend
                    .speak(&Utterance::normal("a very long utterance"), token)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(backend.is_speaking());
        token.cancel();
        let result = speak.await.unwrap();
        assert!(matches!(result, Err(SpeechError::Cancelled)));
    }
}
