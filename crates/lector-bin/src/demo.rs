//! Demo document source.
//!
//! Serves a small static page so the whole pipeline (buffer build, quick
//! nav, announcements, Say-All, the elements list) can be driven without a
//! live accessibility platform.

use std::sync::Arc;

use core_a11y::{Element, TestElement};

use crate::refresh::TreeSource;

pub struct DemoTreeSource;

fn demo_page() -> TestElement {
    TestElement::new(vec![1], "Document")
        .child(
            TestElement::named(vec![10], "Text", "Welcome to the demo page")
                .role("heading")
                .properties("level=1"),
        )
        .child(TestElement::new(vec![20], "Group").role("navigation").child(
            TestElement::named(vec![21], "Hyperlink", "Home").properties("visited=true"),
        ))
        .child(
            TestElement::named(vec![30], "Text", "Getting started")
                .role("heading")
                .properties("level=2"),
        )
        .child(TestElement::named(
            vec![31],
            "Text",
            "Press H to jump between headings and K between links.",
        ))
        .child(TestElement::named(vec![40], "Edit", "Search the docs").focusable())
        .child(
            TestElement::named(vec![50], "Text", "Reference")
                .role("heading")
                .properties("level=2"),
        )
        .child(TestElement::named(vec![51], "Hyperlink", "Keyboard reference").focusable())
}

impl TreeSource for DemoTreeSource {
    fn fetch_root(&self) -> Option<Arc<dyn Element>> {
        Some(Arc::new(demo_page()))
    }

    fn fetch_subtree(&self, _runtime_id: &[i32]) -> Option<Arc<dyn Element>> {
        None
    }
}

/// Source for platforms with no adapter wired up: no document.
pub struct EmptyTreeSource;

impl TreeSource for EmptyTreeSource {
    fn fetch_root(&self) -> Option<Arc<dyn Element>> {
        None
    }

    fn fetch_subtree(&self, _runtime_id: &[i32]) -> Option<Arc<dyn Element>> {
        None
    }
}
