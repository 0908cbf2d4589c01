//! Accessibility surface: the apartment host, the abstract element tree,
//! platform event fan-in, and the live-region monitor.
//!
//! The platform's accessibility objects are apartment-bound: every call must
//! originate from the single worker thread owned by [`ApartmentHost`].
//! Nothing in this crate hands a live platform object to another thread:
//! data leaves the apartment only as value types ([`core_events::ElementSummary`],
//! [`core_events::Event`]) or through the [`Element`] trait, whose
//! implementations stay on the worker.

use std::sync::Arc;

pub mod fanin;
pub mod host;
pub mod live_region;
pub mod testing;
pub mod translate;

pub use fanin::EventFanIn;
pub use host::{ApartmentHost, HostError};
pub use live_region::{Clock, LiveRegionMonitor, ManualClock, SystemClock, POLITE_COOLDOWN};
pub use testing::TestElement;

#[derive(Debug, thiserror::Error)]
pub enum A11yError {
    /// A property read failed mid-flight (element vanished, COM timing).
    /// Callers degrade the field and continue; logged at debug only.
    #[error("transient accessibility read: {0}")]
    Read(String),
    /// The apartment worker is gone.
    #[error("accessibility host stopped")]
    Stopped,
}

/// Abstract accessible element, as the virtual-buffer builder and the event
/// fan-in consume it. Every accessor can fail transiently; callers substitute
/// defaults rather than aborting a walk.
pub trait Element: Send + Sync {
    /// Platform-assigned identity of the live element.
    fn runtime_id(&self) -> Result<Vec<i32>, A11yError>;
    fn name(&self) -> Result<String, A11yError>;
    /// Short control-type tag ("Button", "Edit", ...), already translated
    /// from the platform's numeric id.
    fn control_type(&self) -> Result<String, A11yError>;
    fn aria_role(&self) -> Result<String, A11yError>;
    /// Raw ARIA property string, `key=value` pairs separated by `;` or `,`.
    fn aria_properties(&self) -> Result<String, A11yError>;
    fn is_focusable(&self) -> Result<bool, A11yError>;
    fn children(&self) -> Result<Vec<Arc<dyn Element>>, A11yError>;
}

/// Join a runtime id into the canonical map/event key ("42,7").
pub fn join_runtime_id(id: &[i32]) -> String {
    id.iter()
        .map(|part| part.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_id_join() {
        assert_eq!(join_runtime_id(&[42, 7]), "42,7");
        assert_eq!(join_runtime_id(&[]), "");
        assert_eq!(join_runtime_id(&[-1, 0]), "-1,0");
    }
}
