//! Incremental splicing of a changed subtree into a snapshot.
//!
//! Pre-order ids are dense, so a subtree is a contiguous id span and its
//! text is a contiguous flat-text span. An update removes that span and
//! (for replacement) splices in a freshly built fragment, shifting the
//! ranges of everything after the span. Sibling links, the five indices,
//! and the runtime-id map are rebuilt by full re-scan, which is cheap next
//! to the tree walk. The result is a new snapshot; the input document is never
//! touched, so concurrent readers of the old snapshot stay valid.
//!
//! A mismatch that would corrupt the splice (fragment root reporting a
//! different runtime id than the one being replaced) abandons the update
//! and returns the prior snapshot unchanged.

use std::sync::Arc;

use core_a11y::Element;
use tracing::{debug, warn};

use crate::{DocumentBuilder, NodeId, VDocument, VNode};

/// Apply a structure change to `doc`, producing a new snapshot.
///
/// `new_subtree` absent means the subtree rooted at `runtime_id` was
/// removed; present means it was replaced. An unknown runtime id returns
/// the document unchanged.
pub fn apply_update(
    doc: &VDocument,
    runtime_id: &[i32],
    new_subtree: Option<Arc<dyn Element>>,
) -> VDocument {
    let Some(old_root) = doc.find_by_runtime_id(runtime_id) else {
        debug!(target: "vbuf.update", "unknown_runtime_id");
        return doc.clone();
    };
    let old_id = old_root.id;
    let subtree_len = subtree_size(doc, old_id);
    let after_subtree = old_id + subtree_len;

    // Text span of the outgoing subtree: from the root's start to the
    // maximum end across the subtree.
    let span_start = old_root.range.start;
    let span_end = doc.nodes()[old_id..after_subtree]
        .iter()
        .map(|n| n.range.end)
        .max()
        .unwrap_or(span_start);
    let span_len = span_end - span_start;

    // Build the incoming fragment (empty for a deletion).
    let (mut fragment, fragment_text) = match new_subtree {
        Some(root) => {
            let (nodes, text) = DocumentBuilder::new().walk(root);
            let identity_ok = nodes.first().map_or(false, |n| n.runtime_id == runtime_id);
            if !identity_ok {
                warn!(target: "vbuf.update", "fragment_root_identity_mismatch");
                return doc.clone();
            }
            (nodes, text)
        }
        None => (Vec::new(), String::new()),
    };

    let fragment_len = fragment.len();
    let delta = fragment_text.len() as isize - span_len as isize;
    let shift = |offset: usize| (offset as isize + delta) as usize;

    // Remap an old id across the splice; ids inside the outgoing subtree
    // have no image.
    let remap = |id: NodeId| -> Option<NodeId> {
        if id < old_id {
            Some(id)
        } else if id < after_subtree {
            None
        } else {
            Some(id - subtree_len + fragment_len)
        }
    };

    let parent_of_subtree = old_root.parent;

    // Ancestors of the splice point: their ranges enclose the old span and
    // stretch with it.
    let mut ancestors = std::collections::HashSet::new();
    let mut up = parent_of_subtree;
    while let Some(id) = up {
        ancestors.insert(id);
        up = doc.node(id).and_then(|n| n.parent);
    }

    let mut nodes: Vec<VNode> = Vec::with_capacity(doc.len() - subtree_len + fragment_len);

    // Prefix: ids unchanged; child lists may reference the spliced root or
    // shifted suffix nodes; ancestor ranges stretch by the text delta.
    for node in &doc.nodes()[..old_id] {
        let mut node = node.clone();
        let mut children = Vec::with_capacity(node.children.len());
        for &child in &node.children {
            if child == old_id {
                // Splice point: the fragment root reuses this id, a
                // deletion drops the entry.
                if fragment_len > 0 {
                    children.push(old_id);
                }
            } else if let Some(mapped) = remap(child) {
                children.push(mapped);
            }
        }
        node.children = children;
        if ancestors.contains(&node.id) {
            node.range.end = shift(node.range.end);
        }
        nodes.push(node);
    }

    // Fragment: local ids/offsets shift to the splice position.
    for mut node in fragment.drain(..) {
        node.id += old_id;
        node.range.start += span_start;
        node.range.end += span_start;
        node.parent = match node.parent {
            Some(p) => Some(p + old_id),
            None => parent_of_subtree,
        };
        for child in &mut node.children {
            *child += old_id;
        }
        nodes.push(node);
    }

    // Suffix: ids shift across the splice, ranges shift by the text delta.
    for node in &doc.nodes()[after_subtree..] {
        let mut node = node.clone();
        node.id = remap(node.id).expect("suffix ids survive the splice");
        node.range.start = shift(node.range.start);
        node.range.end = shift(node.range.end);
        node.parent = node.parent.and_then(remap);
        node.children = node.children.iter().filter_map(|&c| remap(c)).collect();
        nodes.push(node);
    }

    let mut flat = String::with_capacity(doc.flat_text().len().saturating_add_signed(delta));
    flat.push_str(&doc.flat_text()[..span_start]);
    flat.push_str(&fragment_text);
    flat.push_str(&doc.flat_text()[span_end..]);

    debug!(
        target: "vbuf.update",
        removed = subtree_len,
        added = fragment_len,
        text_delta = delta,
        "splice_applied"
    );
    VDocument::from_parts(nodes, flat)
}

/// Number of nodes in the subtree rooted at `id` (including the root).
/// Pre-order density makes the subtree the contiguous id span starting at
/// `id`.
fn subtree_size(doc: &VDocument, id: NodeId) -> usize {
    let mut count = 1;
    let mut stack: Vec<NodeId> = doc.node(id).map(|n| n.children.clone()).unwrap_or_default();
    while let Some(next) = stack.pop() {
        count += 1;
        if let Some(node) = doc.node(next) {
            stack.extend(node.children.iter().copied());
        }
    }
    count
}
