//! Session layer: the scheduling rules that sit on top of input, the bus,
//! the virtual buffer, and speech. Mode management, command handling,
//! Say-All, the Elements-List view model, and the first-run wizard live
//! here.

use std::sync::{Arc, RwLock};

use core_vbuf::VDocument;

pub mod elements_list;
pub mod handler;
pub mod mode;
pub mod say_all;
pub mod wizard;

pub use elements_list::{ElementsList, ListEvent, ListTab};
pub use handler::CommandHandler;
pub use mode::ModeManager;
pub use say_all::SayAll;
pub use wizard::{run_wizard, WizardConfig};

/// Whole-snapshot document store. Readers clone the `Arc` and work against
/// a stable snapshot; updates swap the pointer.
#[derive(Clone, Default)]
pub struct DocumentStore {
    inner: Arc<RwLock<Arc<VDocument>>>,
}

impl DocumentStore {
    pub fn new(doc: VDocument) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(doc))),
        }
    }

    pub fn snapshot(&self) -> Arc<VDocument> {
        self.inner.read().expect("document store lock").clone()
    }

    pub fn swap(&self, doc: VDocument) {
        *self.inner.write().expect("document store lock") = Arc::new(doc);
    }
}
