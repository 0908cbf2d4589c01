//! Quick navigation: jump the cursor to the next/previous element of a kind
//! using the document's pre-built indices.
//!
//! Selection contract for "next":
//! - start after the current node's index position when the current node is
//!   itself in the index, otherwise at the first entry past the current
//!   node's id;
//! - scan forward for the first entry satisfying the command's predicate
//!   (heading-level commands match one level, everything else matches all);
//! - with wrap enabled, continue from the index start up to the original
//!   scan position, signalling the wrap earcon on a match;
//! - no match at all: boundary earcon, cursor untouched.
//!
//! "Previous" mirrors this. Table navigation has no index yet and always
//! signals boundary.

use core_events::NavCommand;
use core_speech::{CueKind, CueSink};
use core_vbuf::{Cursor, IndexKind, NodeId, VDocument};
use tracing::trace;

/// Result of one quick-nav dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// Landed on a node; cursor moved to its text start.
    Moved {
        node: NodeId,
        wrapped: bool,
        /// 1-based position within the scanned index, and its length.
        position: (usize, usize),
    },
    /// Nothing to land on; cursor unchanged.
    Boundary,
    /// The command is not a quick-nav command.
    NotQuickNav,
}

#[derive(Clone, Copy)]
enum Direction {
    Next,
    Prev,
}

fn classify(command: NavCommand) -> Option<(IndexKind, Direction, Option<u8>)> {
    use NavCommand::*;
    let mapping = match command {
        NextHeading => (IndexKind::Headings, Direction::Next, None),
        PrevHeading => (IndexKind::Headings, Direction::Prev, None),
        HeadingLevel(level) => (IndexKind::Headings, Direction::Next, Some(level)),
        NextLink => (IndexKind::Links, Direction::Next, None),
        PrevLink => (IndexKind::Links, Direction::Prev, None),
        NextLandmark => (IndexKind::Landmarks, Direction::Next, None),
        PrevLandmark => (IndexKind::Landmarks, Direction::Prev, None),
        NextFormField => (IndexKind::FormFields, Direction::Next, None),
        PrevFormField => (IndexKind::FormFields, Direction::Prev, None),
        NextFocusable => (IndexKind::FocusableElements, Direction::Next, None),
        PrevFocusable => (IndexKind::FocusableElements, Direction::Prev, None),
        _ => return None,
    };
    Some(mapping)
}

/// Dispatch a quick-nav command. Moves `cursor` on success and plays the
/// boundary/wrap earcons per the module contract.
pub fn quick_nav(
    doc: &VDocument,
    cursor: &mut Cursor,
    command: NavCommand,
    cues: &dyn CueSink,
) -> NavOutcome {
    if matches!(command, NavCommand::NextTable | NavCommand::PrevTable) {
        cues.play(CueKind::Boundary);
        return NavOutcome::Boundary;
    }
    let Some((kind, direction, level)) = classify(command) else {
        return NavOutcome::NotQuickNav;
    };

    let index = doc.index(kind);
    let matches_pred = |id: NodeId| -> bool {
        match level {
            Some(level) => doc
                .node(id)
                .map_or(false, |n| n.heading_level == level),
            None => true,
        }
    };

    let current = cursor.current_node(doc);
    let current_id = current.map(|n| n.id);
    let current_index_pos =
        current_id.and_then(|id| index.iter().position(|&entry| entry == id));

    let found = match direction {
        Direction::Next => {
            let start = match (current_index_pos, current_id) {
                (Some(pos), _) => pos + 1,
                (None, Some(id)) => index.partition_point(|&entry| entry < id),
                (None, None) => 0,
            };
            scan(index, start..index.len(), false, &matches_pred).or_else(|| {
                cursor
                    .wrap()
                    .then(|| scan(index, 0..start, true, &matches_pred))
                    .flatten()
            })
        }
        Direction::Prev => {
            let end = match (current_index_pos, current_id) {
                (Some(pos), _) => pos,
                (None, Some(id)) => index.partition_point(|&entry| entry < id),
                (None, None) => 0,
            };
            scan_rev(index, 0..end, false, &matches_pred).or_else(|| {
                cursor
                    .wrap()
                    .then(|| scan_rev(index, end..index.len(), true, &matches_pred))
                    .flatten()
            })
        }
    };

    match found {
        Some((node, wrapped)) => {
            let start = doc.node(node).map(|n| n.range.start).unwrap_or(0);
            cursor.move_to(doc, start);
            if wrapped {
                cues.play(CueKind::Wrap);
            }
            let at = index.iter().position(|&entry| entry == node).unwrap_or(0) + 1;
            trace!(target: "nav.quick", ?command, node, wrapped, "moved");
            NavOutcome::Moved {
                node,
                wrapped,
                position: (at, index.len()),
            }
        }
        None => {
            cues.play(CueKind::Boundary);
            trace!(target: "nav.quick", ?command, "boundary");
            NavOutcome::Boundary
        }
    }
}

fn scan(
    index: &[NodeId],
    range: std::ops::Range<usize>,
    wrapped: bool,
    pred: &impl Fn(NodeId) -> bool,
) -> Option<(NodeId, bool)> {
    index[range].iter().copied().find(|&id| pred(id)).map(|id| (id, wrapped))
}

fn scan_rev(
    index: &[NodeId],
    range: std::ops::Range<usize>,
    wrapped: bool,
    pred: &impl Fn(NodeId) -> bool,
) -> Option<(NodeId, bool)> {
    index[range]
        .iter()
        .rev()
        .copied()
        .find(|&id| pred(id))
        .map(|id| (id, wrapped))
}
