//! Say-All: continuous reading from the cursor position.
//!
//! One reader task at a time: starting a new read cancels the prior one.
//! The task speaks the current line, then advances line by line, yielding
//! between lines so a cancellation (any key, StopSpeech, shutdown) takes
//! effect before the next enqueue. The shared cursor is advanced in place,
//! so an interrupted read leaves the cursor where reading stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use core_speech::{SpeechHandle, Utterance};
use core_vbuf::Cursor;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::DocumentStore;

pub struct SayAll {
    speech: SpeechHandle,
    store: DocumentStore,
    cursor: Arc<Mutex<Cursor>>,
    current: Mutex<Option<CancellationToken>>,
    reading: Arc<AtomicBool>,
}

impl SayAll {
    pub fn new(speech: SpeechHandle, store: DocumentStore, cursor: Arc<Mutex<Cursor>>) -> Self {
        Self {
            speech,
            store,
            cursor,
            current: Mutex::new(None),
            reading: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_reading(&self) -> bool {
        self.reading.load(Ordering::Acquire)
    }

    /// Cancel the active read, if any. Idempotent.
    pub fn cancel(&self) {
        if let Some(token) = self.current.lock().expect("say-all token lock").take() {
            token.cancel();
        }
        self.reading.store(false, Ordering::Release);
    }

    /// Start reading from the current cursor position, cancelling any
    /// read already in progress.
    pub fn start(&self) {
        self.cancel();
        let token = CancellationToken::new();
        *self.current.lock().expect("say-all token lock") = Some(token.clone());

        let speech = self.speech.clone();
        let doc = self.store.snapshot();
        let cursor = self.cursor.clone();
        let reading = self.reading.clone();
        reading.store(true, Ordering::Release);
        debug!(target: "session.say_all", "start");

        tokio::spawn(async move {
            let first = cursor.lock().expect("cursor lock").current_line(&doc);
            match first {
                Some(line) if !line.is_empty() => speech.enqueue(Utterance::normal(line)),
                Some(_) => {}
                None => {
                    // Fresh cursor: begin at the top of the document.
                    let mut guard = cursor.lock().expect("cursor lock");
                    guard.move_to(&doc, 0);
                    if let Some(line) = guard.current_line(&doc) {
                        if !line.is_empty() {
                            speech.enqueue(Utterance::normal(line));
                        }
                    }
                }
            }

            loop {
                if token.is_cancelled() {
                    break;
                }
                let line = cursor.lock().expect("cursor lock").next_line(&doc);
                match line {
                    None => break,
                    Some(line) if !line.is_empty() => speech.enqueue(Utterance::normal(line)),
                    Some(_) => {}
                }
                // Cancellation checkpoint between lines.
                tokio::task::yield_now().await;
            }
            reading.store(false, Ordering::Release);
            debug!(target: "session.say_all", "stop");
        });
    }
}
