//! Virtual-buffer refresh on structure changes.
//!
//! Structure-change events carry only the runtime id of the changed
//! subtree; the refresher re-reads that subtree through the apartment host
//! and splices it into a fresh snapshot. Fetch failures keep the prior
//! snapshot; a stale buffer beats a broken one.

use std::sync::Arc;

use core_a11y::{ApartmentHost, Element};
use core_events::{BusSubscriber, Event, EventPayload};
use core_session::DocumentStore;
use core_vbuf::{apply_update, build_document};
use tracing::{debug, warn};

/// Where document trees come from. The Windows adapter implements this over
/// cached UIA reads; the demo and tests serve in-memory trees.
pub trait TreeSource: Send + Sync {
    /// The current document root, if a document is available.
    fn fetch_root(&self) -> Option<Arc<dyn Element>>;
    /// The live subtree rooted at `runtime_id`; `None` means it was removed.
    fn fetch_subtree(&self, runtime_id: &[i32]) -> Option<Arc<dyn Element>>;
}

pub struct BufferRefresher {
    host: Arc<ApartmentHost>,
    source: Arc<dyn TreeSource>,
    store: DocumentStore,
}

impl BufferRefresher {
    pub fn new(host: Arc<ApartmentHost>, source: Arc<dyn TreeSource>, store: DocumentStore) -> Self {
        Self {
            host,
            source,
            store,
        }
    }

    /// Build the initial snapshot from the source's root.
    pub async fn prime(&self) {
        let source = self.source.clone();
        let built = self
            .host
            .run(move || source.fetch_root().map(build_document))
            .await;
        match built {
            Ok(Some(doc)) => {
                debug!(target: "vbuf.refresh", nodes = doc.len(), "primed");
                self.store.swap(doc);
            }
            Ok(None) => debug!(target: "vbuf.refresh", "no_document"),
            Err(error) => warn!(target: "vbuf.refresh", %error, "prime_failed"),
        }
    }
}

impl BusSubscriber for BufferRefresher {
    fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        let EventPayload::StructureChanged { runtime_id } = &event.payload else {
            return Ok(());
        };
        let runtime_id = runtime_id.clone();
        let host = self.host.clone();
        let source = self.source.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            let fetch_id = runtime_id.clone();
            let fetched = host.run(move || source.fetch_subtree(&fetch_id)).await;
            match fetched {
                Ok(subtree) => {
                    let updated = apply_update(&store.snapshot(), &runtime_id, subtree);
                    store.swap(updated);
                }
                Err(error) => {
                    warn!(target: "vbuf.refresh", %error, "subtree_fetch_failed");
                }
            }
        });
        Ok(())
    }
}
