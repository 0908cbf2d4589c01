//! The utterance queue: single consumer task driving the speech backend.
//!
//! Dispatch contract per processing tick:
//! - Drain everything queued, then stable-sort by priority (Interrupt first;
//!   equal priorities keep submission order).
//! - Any Interrupt in the batch cancels current backend playback before
//!   anything is spoken.
//! - A batch that is exactly one Normal utterance holds for the 50 ms
//!   coalescing window and drains again, so bursts produced by one user
//!   action become one backend call.
//! - Maximal runs of consecutive Normal utterances collapse into a single
//!   utterance joined with ". "; other priorities speak individually.
//! - Backend errors are logged and skipped; a cancelled speak abandons the
//!   rest of the batch (newer traffic superseded it).
//!
//! `enqueue` never blocks and never fails. Dropping every [`SpeechHandle`]
//! closes the channel; the task finishes the drained work and exits, which
//! is the disposal path (callers bound it with the 2 s budget).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{CueSink, Priority, SpeechBackend, SpeechError, Utterance};

/// Wait applied when a tick drained only a single Normal utterance.
pub const COALESCE_WINDOW: Duration = Duration::from_millis(50);

/// Joiner for collapsed runs of Normal utterances.
const RUN_SEPARATOR: &str = ". ";

/// Producer handle. Cloneable; also exposes the synchronous stop used by the
/// StopSpeech command, which fires both the backend cancel and the token of
/// the in-flight utterance.
#[derive(Clone)]
pub struct SpeechHandle {
    tx: UnboundedSender<Utterance>,
    backend: Arc<dyn SpeechBackend>,
    current: Arc<Mutex<CancellationToken>>,
}

impl SpeechHandle {
    /// Non-blocking enqueue. A closed queue (shutdown in progress) drops the
    /// utterance silently.
    pub fn enqueue(&self, utterance: Utterance) {
        if self.tx.send(utterance).is_err() {
            trace!(target: "speech.queue", "enqueue_after_close");
        }
    }

    /// Cancel current playback and the in-flight utterance future.
    pub fn stop(&self) {
        self.current.lock().expect("token lock").cancel();
        self.backend.cancel();
    }

    pub fn is_speaking(&self) -> bool {
        self.backend.is_speaking()
    }

    pub fn backend(&self) -> &Arc<dyn SpeechBackend> {
        &self.backend
    }
}

pub struct UtteranceQueue;

impl UtteranceQueue {
    /// Spawn the consumer task. The task exits when every handle clone is
    /// dropped and the channel drains.
    pub fn spawn(
        backend: Arc<dyn SpeechBackend>,
        cues: Arc<dyn CueSink>,
    ) -> (SpeechHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let current = Arc::new(Mutex::new(CancellationToken::new()));
        let handle = SpeechHandle {
            tx,
            backend: backend.clone(),
            current: current.clone(),
        };
        let join = tokio::spawn(run(rx, backend, cues, current));
        (handle, join)
    }
}

async fn run(
    mut rx: UnboundedReceiver<Utterance>,
    backend: Arc<dyn SpeechBackend>,
    cues: Arc<dyn CueSink>,
    current: Arc<Mutex<CancellationToken>>,
) {
    debug!(target: "speech.queue", "consumer_start");
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(more) = rx.try_recv() {
            batch.push(more);
        }

        batch.sort_by_key(|u| u.priority);

        if batch.len() == 1 && batch[0].priority == Priority::Normal {
            tokio::time::sleep(COALESCE_WINDOW).await;
            while let Ok(more) = rx.try_recv() {
                batch.push(more);
            }
            batch.sort_by_key(|u| u.priority);
        }

        if batch.iter().any(|u| u.priority == Priority::Interrupt) {
            trace!(target: "speech.queue", "interrupt_cancel");
            backend.cancel();
        }

        let combined = coalesce_normals(batch);
        trace!(target: "speech.queue", utterances = combined.len(), "tick");

        for utterance in combined {
            let token = CancellationToken::new();
            *current.lock().expect("token lock") = token.clone();
            if let Some(cue) = utterance.cue {
                cues.play(cue);
            }
            match backend.speak(&utterance, token).await {
                Ok(()) => {}
                Err(SpeechError::Cancelled) => {
                    // Normal termination; newer traffic superseded this batch.
                    trace!(target: "speech.queue", "speak_cancelled");
                    break;
                }
                Err(error) => {
                    warn!(target: "speech.queue", %error, text_len = utterance.text.len(), "speak_failed");
                }
            }
        }
    }
    debug!(target: "speech.queue", "consumer_stop");
}

/// Collapse maximal runs of consecutive Normal utterances into one. The cue
/// of the first utterance in a run survives; later cues in the same run are
/// dropped with the merge.
fn coalesce_normals(batch: Vec<Utterance>) -> Vec<Utterance> {
    let mut out: Vec<Utterance> = Vec::with_capacity(batch.len());
    for u in batch {
        if u.priority == Priority::Normal {
            if let Some(last) = out.last_mut() {
                if last.priority == Priority::Normal {
                    last.text.push_str(RUN_SEPARATOR);
                    last.text.push_str(&u.text);
                    continue;
                }
            }
        }
        out.push(u);
    }
    out
}
