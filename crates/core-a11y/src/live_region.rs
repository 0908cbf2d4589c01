//! Live-region change detection and throttling.
//!
//! The platform reports only that a region changed; this monitor owns the
//! "what changed" question. Per source it remembers the last text seen and
//! the last time a polite announcement went out. Decision order:
//!
//! 1. no source id: announce iff the text is non-empty;
//! 2. text identical to the last announced text for the source: suppress;
//! 3. empty/whitespace text: remember it, suppress;
//! 4. assertive: announce (no throttle);
//! 5. polite within the 500 ms cooldown: suppress *without* recording the
//!    text, so the pending change announces once the cooldown lapses;
//! 6. otherwise record text + time and announce.
//!
//! State sits behind a single mutex; the injectable clock keeps the cooldown
//! testable without real sleeps.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use core_events::Politeness;
use tracing::trace;

/// Minimum spacing between polite announcements from one source.
pub const POLITE_COOLDOWN: Duration = Duration::from_millis(500);

/// Injectable time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[derive(Debug, Default)]
struct SourceState {
    last_text: Option<String>,
    last_polite_at: Option<Instant>,
}

pub struct LiveRegionMonitor<C: Clock = SystemClock> {
    state: Mutex<HashMap<String, SourceState>>,
    clock: C,
}

impl LiveRegionMonitor<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for LiveRegionMonitor<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> LiveRegionMonitor<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Decide whether this change should be spoken. Mutates per-source
    /// state per the module rules.
    pub fn should_announce(
        &self,
        source_id: Option<&str>,
        text: &str,
        politeness: Politeness,
    ) -> bool {
        let Some(source_id) = source_id else {
            return !text.is_empty();
        };

        let now = self.clock.now();
        let mut state = self.state.lock().expect("live region state lock");
        let entry = state.entry(source_id.to_string()).or_default();

        if entry.last_text.as_deref() == Some(text) {
            trace!(target: "a11y.live", source_id, "duplicate_suppressed");
            return false;
        }
        if text.trim().is_empty() {
            entry.last_text = Some(text.to_string());
            return false;
        }
        if politeness == Politeness::Assertive {
            entry.last_text = Some(text.to_string());
            return true;
        }
        if let Some(last) = entry.last_polite_at {
            if now.duration_since(last) < POLITE_COOLDOWN {
                trace!(target: "a11y.live", source_id, "throttled");
                return false;
            }
        }
        entry.last_text = Some(text.to_string());
        entry.last_polite_at = Some(now);
        true
    }

    /// Forget all per-source state.
    pub fn reset(&self) {
        self.state.lock().expect("live region state lock").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> LiveRegionMonitor<std::sync::Arc<ManualClock>> {
        LiveRegionMonitor::with_clock(std::sync::Arc::new(ManualClock::new()))
    }

    #[test]
    fn absent_source_announces_non_empty_only() {
        let m = monitor();
        assert!(m.should_announce(None, "alert", Politeness::Polite));
        assert!(!m.should_announce(None, "", Politeness::Assertive));
    }

    #[test]
    fn identical_text_announces_once() {
        let m = monitor();
        assert!(m.should_announce(Some("s"), "Loading…", Politeness::Polite));
        assert!(!m.should_announce(Some("s"), "Loading…", Politeness::Polite));
    }

    #[test]
    fn empty_and_whitespace_are_silent() {
        let m = monitor();
        assert!(!m.should_announce(Some("s"), "", Politeness::Polite));
        assert!(!m.should_announce(Some("s"), "   \t", Politeness::Assertive));
    }

    #[test]
    fn polite_cooldown_then_reannounce() {
        let m = monitor();
        let clock = m.clock.clone();
        assert!(m.should_announce(Some("42,7"), "Loading…", Politeness::Polite));

        clock.advance(Duration::from_millis(100));
        assert!(!m.should_announce(Some("42,7"), "Loading…", Politeness::Polite));

        clock.advance(Duration::from_millis(200));
        // Changed text, but inside the 500 ms cooldown.
        assert!(!m.should_announce(Some("42,7"), "Done", Politeness::Polite));

        clock.advance(Duration::from_millis(300));
        // 600 ms after the first announcement the pending change speaks.
        assert!(m.should_announce(Some("42,7"), "Done", Politeness::Polite));
    }

    #[test]
    fn assertive_bypasses_cooldown() {
        let m = monitor();
        let clock = m.clock.clone();
        assert!(m.should_announce(Some("s"), "one", Politeness::Polite));
        clock.advance(Duration::from_millis(100));
        assert!(m.should_announce(Some("s"), "two", Politeness::Assertive));
    }

    #[test]
    fn sources_throttle_independently() {
        let m = monitor();
        let clock = m.clock.clone();
        assert!(m.should_announce(Some("a"), "x", Politeness::Polite));
        clock.advance(Duration::from_millis(100));
        assert!(m.should_announce(Some("b"), "y", Politeness::Polite));
    }

    #[test]
    fn reset_forgets_history() {
        let m = monitor();
        assert!(m.should_announce(Some("s"), "hello", Politeness::Polite));
        m.reset();
        assert!(m.should_announce(Some("s"), "hello", Politeness::Polite));
    }

    #[test]
    fn text_reappearing_after_clear_is_announced() {
        let m = monitor();
        let clock = m.clock.clone();
        assert!(m.should_announce(Some("s"), "status", Politeness::Polite));
        clock.advance(Duration::from_millis(600));
        assert!(!m.should_announce(Some("s"), "", Politeness::Polite));
        assert!(m.should_announce(Some("s"), "status", Politeness::Polite));
    }
}
