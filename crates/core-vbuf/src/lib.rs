//! The virtual buffer: an immutable, indexed snapshot of a document's
//! accessibility tree.
//!
//! A [`VDocument`] owns every node; node identity is the dense document-order
//! id, which doubles as the node's index in the backing vector. Parent,
//! child, and sibling references are ids, never owning pointers, so the tree
//! has no reference cycles and a replacement snapshot drops the old one
//! wholesale. Readers holding an old snapshot are unaffected by updates;
//! nothing mutates a document after [`VDocument::from_parts`] seals it.
//!
//! Flat text is the concatenation of text-bearing nodes' names, each
//! terminated with `\n`. A node's range covers its own text plus its
//! subtree's, so bracketing queries resolve to the deepest (last in document
//! order) node covering an offset.

use std::collections::HashMap;

use core_events::control;

pub mod builder;
pub mod cursor;
pub mod update;

pub use builder::{build_document, DocumentBuilder};
pub use cursor::{Cursor, Granule};
pub use update::apply_update;

/// Dense document-order id; equals the node's index in `VDocument::nodes`.
pub type NodeId = usize;

/// Half-open byte range into the document's flat text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// One node of the snapshot. All flags are pre-derived; consumers never go
/// back to the platform to interpret a node.
#[derive(Debug, Clone, PartialEq)]
pub struct VNode {
    pub id: NodeId,
    /// Platform identity of the live element this snapshot was taken from.
    pub runtime_id: Vec<i32>,
    pub name: String,
    pub control_type: String,
    pub aria_role: String,
    /// 0 = not a heading, 1..=6 otherwise.
    pub heading_level: u8,
    /// One of the fixed landmark names, or empty.
    pub landmark: String,
    pub link: bool,
    pub visited: bool,
    pub required: bool,
    pub expandable: bool,
    pub expanded: bool,
    pub focusable: bool,
    pub range: TextRange,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub prev_in_order: Option<NodeId>,
    pub next_in_order: Option<NodeId>,
}

impl VNode {
    /// Form-field predicate: form control type, or required/expandable flag.
    pub fn is_form_field(&self) -> bool {
        control::is_form_field_type(&self.control_type) || self.required || self.expandable
    }

    pub fn is_heading(&self) -> bool {
        (1..=6).contains(&self.heading_level)
    }
}

/// Element kinds navigable through the pre-built indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Headings,
    Links,
    FormFields,
    Landmarks,
    FocusableElements,
}

/// Immutable snapshot. Construction goes through [`VDocument::from_parts`],
/// which derives the sibling links, the five indices, and the runtime-id
/// map from the node list.
#[derive(Debug, Clone, Default)]
pub struct VDocument {
    flat_text: String,
    nodes: Vec<VNode>,
    headings: Vec<NodeId>,
    links: Vec<NodeId>,
    form_fields: Vec<NodeId>,
    landmarks: Vec<NodeId>,
    focusable: Vec<NodeId>,
    by_runtime_id: HashMap<String, NodeId>,
}

impl VDocument {
    /// Seal a node list into a snapshot. `nodes` must be in document order
    /// with `id == index` and consistent parent/children links; ranges must
    /// lie within `flat_text`. Violations are programmer errors and panic in
    /// debug builds.
    pub fn from_parts(mut nodes: Vec<VNode>, flat_text: String) -> Self {
        let count = nodes.len();
        for (index, node) in nodes.iter_mut().enumerate() {
            debug_assert_eq!(node.id, index, "node ids must be dense document order");
            debug_assert!(
                node.range.start <= node.range.end && node.range.end <= flat_text.len(),
                "node range out of bounds"
            );
            node.prev_in_order = index.checked_sub(1);
            node.next_in_order = (index + 1 < count).then_some(index + 1);
        }

        let mut doc = Self {
            flat_text,
            nodes,
            ..Self::default()
        };
        doc.rebuild_indices();
        doc
    }

    fn rebuild_indices(&mut self) {
        self.headings.clear();
        self.links.clear();
        self.form_fields.clear();
        self.landmarks.clear();
        self.focusable.clear();
        self.by_runtime_id.clear();
        for node in &self.nodes {
            if node.is_heading() {
                self.headings.push(node.id);
            }
            if node.link {
                self.links.push(node.id);
            }
            if node.is_form_field() {
                self.form_fields.push(node.id);
            }
            if !node.landmark.is_empty() {
                self.landmarks.push(node.id);
            }
            if node.focusable {
                self.focusable.push(node.id);
            }
            if !node.runtime_id.is_empty() {
                self.by_runtime_id
                    .insert(core_a11y::join_runtime_id(&node.runtime_id), node.id);
            }
        }
    }

    pub fn flat_text(&self) -> &str {
        &self.flat_text
    }

    pub fn nodes(&self) -> &[VNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&VNode> {
        self.nodes.get(id)
    }

    pub fn root(&self) -> Option<&VNode> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index(&self, kind: IndexKind) -> &[NodeId] {
        match kind {
            IndexKind::Headings => &self.headings,
            IndexKind::Links => &self.links,
            IndexKind::FormFields => &self.form_fields,
            IndexKind::Landmarks => &self.landmarks,
            IndexKind::FocusableElements => &self.focusable,
        }
    }

    /// O(1) lookup by platform identity.
    pub fn find_by_runtime_id(&self, runtime_id: &[i32]) -> Option<&VNode> {
        let key = core_a11y::join_runtime_id(runtime_id);
        self.by_runtime_id.get(&key).map(|&id| &self.nodes[id])
    }

    /// Deepest node covering `offset`: binary search on `range.start`, then
    /// the last (highest-id) node whose range brackets the offset. Absent
    /// for out-of-range offsets.
    pub fn find_node_at_offset(&self, offset: usize) -> Option<&VNode> {
        if offset >= self.flat_text.len() {
            return None;
        }
        let after = self
            .nodes
            .partition_point(|node| node.range.start <= offset);
        self.nodes[..after]
            .iter()
            .rev()
            .find(|node| node.range.contains(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: NodeId, parent: Option<NodeId>, start: usize, end: usize) -> VNode {
        VNode {
            id,
            runtime_id: vec![id as i32],
            name: String::new(),
            control_type: "Text".into(),
            aria_role: String::new(),
            heading_level: 0,
            landmark: String::new(),
            link: false,
            visited: false,
            required: false,
            expandable: false,
            expanded: false,
            focusable: false,
            range: TextRange { start, end },
            parent,
            children: Vec::new(),
            prev_in_order: None,
            next_in_order: None,
        }
    }

    #[test]
    fn from_parts_links_siblings() {
        let text = "ab\ncd\n".to_string();
        let mut root = leaf(0, None, 0, 6);
        root.children = vec![1, 2];
        let doc = VDocument::from_parts(
            vec![root, leaf(1, Some(0), 0, 3), leaf(2, Some(0), 3, 6)],
            text,
        );
        assert_eq!(doc.node(0).unwrap().prev_in_order, None);
        assert_eq!(doc.node(0).unwrap().next_in_order, Some(1));
        assert_eq!(doc.node(1).unwrap().prev_in_order, Some(0));
        assert_eq!(doc.node(2).unwrap().next_in_order, None);
    }

    #[test]
    fn offset_lookup_prefers_deepest() {
        let text = "ab\ncd\n".to_string();
        let mut root = leaf(0, None, 0, 6);
        root.children = vec![1, 2];
        let doc = VDocument::from_parts(
            vec![root, leaf(1, Some(0), 0, 3), leaf(2, Some(0), 3, 6)],
            text,
        );
        assert_eq!(doc.find_node_at_offset(0).unwrap().id, 1);
        assert_eq!(doc.find_node_at_offset(2).unwrap().id, 1);
        assert_eq!(doc.find_node_at_offset(3).unwrap().id, 2);
        assert_eq!(doc.find_node_at_offset(5).unwrap().id, 2);
        assert!(doc.find_node_at_offset(6).is_none());
        assert!(doc.find_node_at_offset(99).is_none());
    }

    #[test]
    fn form_field_rule() {
        let mut n = leaf(0, None, 0, 0);
        n.control_type = "Edit".into();
        assert!(n.is_form_field());
        n.control_type = "Text".into();
        assert!(!n.is_form_field());
        n.required = true;
        assert!(n.is_form_field());
        n.required = false;
        n.expandable = true;
        assert!(n.is_form_field());
    }
}
