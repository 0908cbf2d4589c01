//! Snapshot construction from the abstract element tree.
//!
//! Iterative pre-order walk with an explicit enter/exit stack: entering an
//! element assigns the next dense id, derives its flags, and appends its
//! text; exiting closes the node's range so it spans the whole subtree.
//! Container kinds contribute no text of their own. Every per-element read
//! degrades to a default on failure; a half-broken subtree still snapshots,
//! it just carries less.

use std::sync::Arc;

use core_a11y::{translate, Element};
use tracing::{debug, trace};

use crate::{NodeId, TextRange, VDocument, VNode};

/// Control types that never contribute their name to the flat text.
const CONTAINER_TYPES: [&str; 11] = [
    "Document",
    "Group",
    "Pane",
    "Window",
    "ToolBar",
    "Menu",
    "MenuBar",
    "StatusBar",
    "ScrollBar",
    "TitleBar",
    "AppBar",
];

fn is_container(control_type: &str) -> bool {
    CONTAINER_TYPES.contains(&control_type)
}

enum Step {
    Enter { element: Arc<dyn Element>, parent: Option<NodeId> },
    Exit { id: NodeId },
}

/// Walks an element tree into a node list plus flat-text fragment. Used for
/// full documents and for subtree fragments during incremental updates
/// (fragment offsets start at 0 and are shifted by the splice).
pub struct DocumentBuilder {
    nodes: Vec<VNode>,
    flat: String,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            flat: String::new(),
        }
    }

    /// Walk `root` and return `(nodes, flat_text)`. Node ids are local to
    /// this walk, starting at 0.
    pub fn walk(mut self, root: Arc<dyn Element>) -> (Vec<VNode>, String) {
        let mut stack = vec![Step::Enter {
            element: root,
            parent: None,
        }];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter { element, parent } => {
                    let id = self.nodes.len();
                    let node = self.enter(element.as_ref(), id, parent);
                    if let Some(parent) = parent {
                        self.nodes[parent].children.push(id);
                    }
                    self.nodes.push(node);

                    stack.push(Step::Exit { id });
                    match element.children() {
                        Ok(children) => {
                            for child in children.into_iter().rev() {
                                stack.push(Step::Enter {
                                    element: child,
                                    parent: Some(id),
                                });
                            }
                        }
                        Err(error) => {
                            trace!(target: "vbuf.build", id, %error, "children_read_failed");
                        }
                    }
                }
                Step::Exit { id } => {
                    // Range closes over everything appended by the subtree.
                    self.nodes[id].range.end = self.flat.len();
                }
            }
        }

        (self.nodes, self.flat)
    }

    fn enter(&mut self, element: &dyn Element, id: NodeId, parent: Option<NodeId>) -> VNode {
        let name = element.name().unwrap_or_default();
        let control_type = element.control_type().unwrap_or_default();
        let aria_role = element.aria_role().unwrap_or_default();
        let raw_props = element.aria_properties().unwrap_or_default();
        let traits = translate::derive_traits(&aria_role, &raw_props);
        let link = traits.link || control_type == "Hyperlink";

        let start = self.flat.len();
        if !is_container(&control_type) && !name.trim().is_empty() {
            self.flat.push_str(&name);
            self.flat.push('\n');
        }

        VNode {
            id,
            runtime_id: element.runtime_id().unwrap_or_default(),
            name,
            heading_level: traits.heading_level,
            landmark: traits.landmark,
            link,
            visited: traits.visited,
            required: traits.required,
            expandable: traits.expandable,
            expanded: traits.expanded,
            focusable: element.is_focusable().unwrap_or(false),
            range: TextRange {
                start,
                end: self.flat.len(),
            },
            parent,
            children: Vec::new(),
            prev_in_order: None,
            next_in_order: None,
            control_type,
            aria_role,
        }
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a sealed snapshot from an element tree.
pub fn build_document(root: Arc<dyn Element>) -> VDocument {
    let (nodes, flat) = DocumentBuilder::new().walk(root);
    debug!(target: "vbuf.build", nodes = nodes.len(), text_len = flat.len(), "document_built");
    VDocument::from_parts(nodes, flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexKind;
    use core_a11y::TestElement;
    use pretty_assertions::assert_eq;

    fn sample_page() -> Arc<dyn Element> {
        Arc::new(
            TestElement::new(vec![1], "Document")
                .child(
                    TestElement::named(vec![2], "Text", "Intro")
                        .role("heading")
                        .properties("level=1"),
                )
                .child(
                    TestElement::named(vec![3], "Hyperlink", "Click here")
                        .properties("visited=true")
                        .focusable(),
                )
                .child(
                    TestElement::new(vec![4], "Group")
                        .role("navigation")
                        .child(TestElement::named(vec![5], "Text", "Details").role("h2"))
                        .child(TestElement::named(vec![6], "Edit", "Search").focusable()),
                ),
        )
    }

    #[test]
    fn flat_text_skips_containers() {
        let doc = build_document(sample_page());
        assert_eq!(doc.flat_text(), "Intro\nClick here\nDetails\nSearch\n");
    }

    #[test]
    fn ids_are_pre_order_and_ranges_nest() {
        let doc = build_document(sample_page());
        assert_eq!(doc.len(), 6);
        // Root spans everything.
        let root = doc.root().unwrap();
        assert_eq!(root.range, crate::TextRange { start: 0, end: doc.flat_text().len() });
        // The navigation group spans its two children.
        let group = doc.find_by_runtime_id(&[4]).unwrap();
        let details = doc.find_by_runtime_id(&[5]).unwrap();
        let search = doc.find_by_runtime_id(&[6]).unwrap();
        assert_eq!(group.range.start, details.range.start);
        assert_eq!(group.range.end, search.range.end);
        // Pre-order: walking next_in_order visits ids 0..n.
        let mut walked = Vec::new();
        let mut cursor = Some(0);
        while let Some(id) = cursor {
            walked.push(id);
            cursor = doc.node(id).unwrap().next_in_order;
        }
        assert_eq!(walked, (0..doc.len()).collect::<Vec<_>>());
    }

    #[test]
    fn indices_are_consistent_with_flags() {
        let doc = build_document(sample_page());
        let headings: Vec<_> = doc
            .index(IndexKind::Headings)
            .iter()
            .map(|&id| doc.node(id).unwrap().heading_level)
            .collect();
        assert_eq!(headings, vec![1, 2]);
        assert_eq!(doc.index(IndexKind::Links).len(), 1);
        assert_eq!(doc.index(IndexKind::Landmarks).len(), 1);
        // Form fields: the Edit node.
        let fields = doc.index(IndexKind::FormFields);
        assert_eq!(fields.len(), 1);
        assert_eq!(doc.node(fields[0]).unwrap().control_type, "Edit");
        // Focusable: link + edit.
        assert_eq!(doc.index(IndexKind::FocusableElements).len(), 2);
    }

    #[test]
    fn every_offset_resolves_to_exactly_one_node() {
        let doc = build_document(sample_page());
        for offset in 0..doc.flat_text().len() {
            let node = doc
                .find_node_at_offset(offset)
                .unwrap_or_else(|| panic!("offset {offset} unresolved"));
            assert!(node.range.contains(offset));
        }
    }

    #[test]
    fn failed_reads_degrade_the_node_not_the_walk() {
        let root = Arc::new(
            TestElement::new(vec![1], "Document")
                .child(
                    TestElement::named(vec![2], "Text", "Before")
                        .failing("name")
                        .failing("aria_role"),
                )
                .child(TestElement::named(vec![3], "Text", "After")),
        );
        let doc = build_document(root);
        assert_eq!(doc.len(), 3);
        // Degraded node keeps its place with empty fields and no text.
        let degraded = doc.find_by_runtime_id(&[2]).unwrap();
        assert!(degraded.name.is_empty());
        assert!(degraded.range.is_empty());
        assert_eq!(doc.flat_text(), "After\n");
    }

    #[test]
    fn visited_link_flags_survive() {
        let doc = build_document(sample_page());
        let link = doc.find_by_runtime_id(&[3]).unwrap();
        assert!(link.link);
        assert!(link.visited);
        assert!(link.focusable);
    }

    #[test]
    fn thousand_element_document_builds() {
        let mut root = TestElement::new(vec![0], "Document");
        for i in 1..=1000 {
            root = root.child(TestElement::named(
                vec![i],
                "Text",
                &format!("Paragraph {i}"),
            ));
        }
        let started = std::time::Instant::now();
        let doc = build_document(Arc::new(root));
        assert_eq!(doc.len(), 1001);
        // Budget: well under half a second.
        assert!(started.elapsed() < std::time::Duration::from_millis(500));
    }
}
