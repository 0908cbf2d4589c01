//! Navigation over the virtual buffer: quick-nav across the pre-built
//! indices, and rendering of nodes into spoken announcements.

pub mod announce;
pub mod quick_nav;

pub use announce::{announce, AnnounceSource, VerbosityProfile};
pub use quick_nav::{quick_nav, NavOutcome};
