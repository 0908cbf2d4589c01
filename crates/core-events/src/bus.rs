//! The central event bus.
//!
//! Unbounded multi-producer single-consumer channel plus the consumer loop
//! that drives all event dispatch. The loop owns two scheduling behaviors:
//!
//! - Focus coalescing: a `FocusChanged` opens a 30 ms window; every further
//!   `FocusChanged` drained inside the window replaces the pending one, while
//!   non-focus events drained in the window are dispatched immediately in
//!   their arrival order. The surviving focus event is dispatched after the
//!   drain. Rapid focus churn (menu traversal, page load) therefore costs one
//!   announcement, not one per intermediate element.
//! - Error containment: a subscriber returning `Err` is logged under the
//!   `bus` target and counted; the loop itself never stops on subscriber
//!   failure.
//!
//! The channel is unbounded: producers include platform callback threads
//! that must never block (the hook path has its own bounded queue upstream,
//! so input cannot flood the bus faster than the keymap consumes it).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{Event, EventPayload, EventSink, FOCUS_EVENTS_COLLAPSED, SUBSCRIBER_ERRORS};

/// Focus coalescing window. See module docs.
pub const FOCUS_COALESCE_WINDOW: Duration = Duration::from_millis(30);

/// Subscriber interface. The bus distinguishes the three notifications the
/// runtime fans out on (focus processed, navigation command, raw key); every
/// other payload arrives through `on_event`. Default implementations are
/// no-ops so subscribers implement only what they consume.
pub trait BusSubscriber: Send + Sync {
    fn on_focus(&self, _event: &Event) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_command(&self, _command: crate::NavCommand, _event: &Event) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_raw_key(&self, _key: crate::KeyEvent, _event: &Event) -> anyhow::Result<()> {
        Ok(())
    }
    /// Catch-all for payloads other than focus / command / raw key.
    fn on_event(&self, _event: &Event) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Cloneable producer half of the bus.
#[derive(Clone)]
pub struct BusHandle {
    tx: UnboundedSender<Event>,
}

impl EventSink for BusHandle {
    fn post(&self, event: Event) {
        crate::EVENTS_POSTED.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(event).is_err() {
            // Consumer gone; only reachable during shutdown.
            trace!(target: "bus", "post_after_close");
        }
    }
}

pub struct EventBus {
    rx: UnboundedReceiver<Event>,
    subscribers: Vec<Arc<dyn BusSubscriber>>,
}

impl EventBus {
    /// Create a bus and its producer handle. Subscribers are registered
    /// before `spawn`; the set is fixed for the life of the loop.
    pub fn new() -> (Self, BusHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx,
                subscribers: Vec::new(),
            },
            BusHandle { tx },
        )
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn BusSubscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Run the consumer loop until every producer handle is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        debug!(target: "bus", subscribers = self.subscribers.len(), "consumer_start");
        while let Some(event) = self.rx.recv().await {
            if event.is_focus() {
                self.coalesce_focus(event).await;
            } else {
                self.dispatch(&event);
            }
        }
        debug!(target: "bus", "consumer_stop");
    }

    /// Hold the focus event for the coalescing window, dispatching any
    /// non-focus traffic that arrives meanwhile and keeping only the last
    /// focus event seen.
    async fn coalesce_focus(&mut self, first: Event) {
        let mut kept = first;
        tokio::time::sleep(FOCUS_COALESCE_WINDOW).await;
        while let Ok(next) = self.rx.try_recv() {
            if next.is_focus() {
                FOCUS_EVENTS_COLLAPSED.fetch_add(1, Ordering::Relaxed);
                kept = next;
            } else {
                self.dispatch(&next);
            }
        }
        self.dispatch(&kept);
    }

    fn dispatch(&self, event: &Event) {
        for sub in &self.subscribers {
            let result = match &event.payload {
                EventPayload::FocusChanged(_) => sub.on_focus(event),
                EventPayload::NavigationCommand(cmd) => sub.on_command(*cmd, event),
                EventPayload::RawKey(key) => sub.on_raw_key(*key, event),
                _ => sub.on_event(event),
            };
            if let Err(error) = result {
                SUBSCRIBER_ERRORS.fetch_add(1, Ordering::Relaxed);
                warn!(target: "bus", %error, payload = ?discriminant_name(&event.payload), "subscriber_error");
            }
        }
    }
}

fn discriminant_name(payload: &EventPayload) -> &'static str {
    match payload {
        EventPayload::FocusChanged(_) => "FocusChanged",
        EventPayload::NavigationCommand(_) => "NavigationCommand",
        EventPayload::RawKey(_) => "RawKey",
        EventPayload::LiveRegionChanged { .. } => "LiveRegionChanged",
        EventPayload::ModeChanged { .. } => "ModeChanged",
        EventPayload::TypingEcho { .. } => "TypingEcho",
        EventPayload::StructureChanged { .. } => "StructureChanged",
        EventPayload::PropertyChanged { .. } => "PropertyChanged",
        EventPayload::Notification { .. } => "Notification",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementSummary, KeyEvent, ModMask, NavCommand};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        focus: Mutex<Vec<String>>,
        commands: Mutex<Vec<NavCommand>>,
        raw: Mutex<Vec<KeyEvent>>,
        other: Mutex<Vec<String>>,
        fail_on_command: bool,
    }

    impl BusSubscriber for Recorder {
        fn on_focus(&self, event: &Event) -> anyhow::Result<()> {
            if let EventPayload::FocusChanged(s) = &event.payload {
                self.focus.lock().unwrap().push(s.name.clone());
            }
            Ok(())
        }
        fn on_command(&self, command: NavCommand, _event: &Event) -> anyhow::Result<()> {
            self.commands.lock().unwrap().push(command);
            if self.fail_on_command {
                anyhow::bail!("subscriber exploded");
            }
            Ok(())
        }
        fn on_raw_key(&self, key: KeyEvent, _event: &Event) -> anyhow::Result<()> {
            self.raw.lock().unwrap().push(key);
            Ok(())
        }
        fn on_event(&self, event: &Event) -> anyhow::Result<()> {
            self.other
                .lock()
                .unwrap()
                .push(format!("{:?}", event.payload));
            Ok(())
        }
    }

    fn focus_event(name: &str) -> Event {
        Event::new(EventPayload::FocusChanged(ElementSummary {
            name: name.to_string(),
            ..ElementSummary::default()
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn three_focus_events_in_window_collapse_to_last() {
        let (mut bus, handle) = EventBus::new();
        let rec = Arc::new(Recorder::default());
        bus.subscribe(rec.clone());
        let join = bus.spawn();

        handle.post(focus_event("first"));
        handle.post(focus_event("second"));
        handle.post(focus_event("third"));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(*rec.focus.lock().unwrap(), vec!["third".to_string()]);

        drop(handle);
        join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn non_focus_events_in_window_dispatch_in_order_before_focus() {
        let (mut bus, handle) = EventBus::new();
        let rec = Arc::new(Recorder::default());
        bus.subscribe(rec.clone());
        let join = bus.spawn();

        handle.post(focus_event("first"));
        handle.post(Event::new(EventPayload::NavigationCommand(
            NavCommand::NextHeading,
        )));
        handle.post(Event::new(EventPayload::NavigationCommand(
            NavCommand::NextLink,
        )));
        handle.post(focus_event("last"));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(
            *rec.commands.lock().unwrap(),
            vec![NavCommand::NextHeading, NavCommand::NextLink]
        );
        // The retained focus event is dispatched after the drained commands.
        assert_eq!(*rec.focus.lock().unwrap(), vec!["last".to_string()]);

        drop(handle);
        join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn subscriber_error_does_not_stop_loop() {
        let (mut bus, handle) = EventBus::new();
        let rec = Arc::new(Recorder {
            fail_on_command: true,
            ..Recorder::default()
        });
        bus.subscribe(rec.clone());
        let join = bus.spawn();

        handle.post(Event::new(EventPayload::NavigationCommand(
            NavCommand::SayAll,
        )));
        handle.post(Event::new(EventPayload::RawKey(KeyEvent::up(
            0x41,
            ModMask::empty(),
        ))));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(rec.commands.lock().unwrap().len(), 1);
        assert_eq!(rec.raw.lock().unwrap().len(), 1, "loop survived the error");

        drop(handle);
        join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn other_payloads_hit_catch_all() {
        let (mut bus, handle) = EventBus::new();
        let rec = Arc::new(Recorder::default());
        bus.subscribe(rec.clone());
        let join = bus.spawn();

        handle.post(Event::new(EventPayload::Notification {
            text: "battery low".into(),
        }));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(rec.other.lock().unwrap().len(), 1);

        drop(handle);
        join.await.unwrap();
    }
}
