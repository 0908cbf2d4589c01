//! Platform event fan-in.
//!
//! The platform invokes these entry points on its own callback threads. The
//! body is restricted to reading properties the platform already cached,
//! translating them into value events, and posting to the bus; it never
//! makes a fresh round-trip into the tree. A read that fails mid-callback degrades
//! that field (or the whole summary) instead of dropping the signal.

use std::sync::Arc;

use core_events::{
    ElementSummary, Event, EventPayload, EventSink, Politeness, PropertyKind,
};
use tracing::debug;

use crate::{join_runtime_id, translate, Element};

pub struct EventFanIn {
    sink: Arc<dyn EventSink>,
}

impl EventFanIn {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Build a value summary from cached properties, degrading per field.
    pub fn summarize(element: &dyn Element) -> ElementSummary {
        let runtime_id = match element.runtime_id() {
            Ok(id) => id,
            Err(error) => {
                debug!(target: "a11y.fanin", %error, "runtime_id_read_failed");
                Vec::new()
            }
        };

        let role = element.aria_role().unwrap_or_default();
        let raw_props = element.aria_properties().unwrap_or_default();
        let traits = translate::derive_traits(&role, &raw_props);
        let control_type = element.control_type().unwrap_or_default();
        let link = traits.link || control_type == "Hyperlink";

        ElementSummary {
            name: element.name().unwrap_or_default(),
            heading_level: traits.heading_level,
            landmark: traits.landmark,
            link,
            visited: traits.visited,
            required: traits.required,
            expandable: traits.expandable,
            expanded: traits.expanded,
            focusable: element.is_focusable().unwrap_or(false),
            description: String::new(),
            control_type,
            runtime_id,
        }
    }

    pub fn focus_changed(&self, element: &dyn Element) {
        let summary = Self::summarize(element);
        self.sink
            .post(Event::new(EventPayload::FocusChanged(summary)));
    }

    /// Live-region change: the platform says only that the region changed,
    /// so the event carries the region's current text; the monitor diffs it
    /// downstream.
    pub fn live_region_changed(&self, element: &dyn Element, politeness: Politeness) {
        let source_id = element
            .runtime_id()
            .map(|id| join_runtime_id(&id))
            .unwrap_or_default();
        let text = element.name().unwrap_or_default();
        self.sink.post(Event::new(EventPayload::LiveRegionChanged {
            source_id,
            text,
            politeness,
        }));
    }

    pub fn structure_changed(&self, runtime_id: Vec<i32>) {
        self.sink
            .post(Event::new(EventPayload::StructureChanged { runtime_id }));
    }

    pub fn property_changed(&self, runtime_id: Vec<i32>, property: PropertyKind, value: String) {
        self.sink.post(Event::new(EventPayload::PropertyChanged {
            runtime_id,
            property,
            value,
        }));
    }

    pub fn notification(&self, text: String) {
        self.sink
            .post(Event::new(EventPayload::Notification { text }));
    }
}
