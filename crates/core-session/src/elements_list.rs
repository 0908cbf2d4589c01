//! Elements-List view model.
//!
//! A modal, speech-driven list over a document snapshot: four tabs bound to
//! the pre-built indices, a case-insensitive substring filter, and a small
//! key protocol (Tab cycles tabs, arrows move the selection, printable keys
//! narrow the filter, Backspace widens it, Enter returns the selected node,
//! Escape cancels). The snapshot is pinned at open time; a document update
//! while the dialog is up does not disturb it.

use std::sync::Arc;

use core_events::{KeyEvent, ModMask};
use core_input::vk;
use core_vbuf::{IndexKind, NodeId, VDocument, VNode};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTab {
    Headings,
    Links,
    Landmarks,
    FormFields,
}

impl ListTab {
    pub const ALL: [ListTab; 4] = [
        ListTab::Headings,
        ListTab::Links,
        ListTab::Landmarks,
        ListTab::FormFields,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ListTab::Headings => "Headings",
            ListTab::Links => "Links",
            ListTab::Landmarks => "Landmarks",
            ListTab::FormFields => "Form fields",
        }
    }

    fn index_kind(&self) -> IndexKind {
        match self {
            ListTab::Headings => IndexKind::Headings,
            ListTab::Links => IndexKind::Links,
            ListTab::Landmarks => IndexKind::Landmarks,
            ListTab::FormFields => IndexKind::FormFields,
        }
    }

    fn next(&self) -> ListTab {
        let at = ListTab::ALL.iter().position(|t| t == self).unwrap_or(0);
        ListTab::ALL[(at + 1) % ListTab::ALL.len()]
    }
}

/// What a key press did to the dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    /// Dialog state changed (or the key was ignored); stay open.
    Pending,
    /// Enter on a row: the chosen node is the dialog result.
    Selected(NodeId),
    /// Escape: no result.
    Cancelled,
}

pub struct ElementsList {
    doc: Arc<VDocument>,
    tab: ListTab,
    filter: String,
    selection: usize,
}

impl ElementsList {
    pub fn new(doc: Arc<VDocument>) -> Self {
        Self {
            doc,
            tab: ListTab::Headings,
            filter: String::new(),
            selection: 0,
        }
    }

    pub fn tab(&self) -> ListTab {
        self.tab
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Display text per kind: headings as "H{level}: {name}", landmarks as
    /// "{type}" or "{type}: {name}", everything else the name or
    /// "[{control_type}]" when nameless.
    pub fn display_text(node: &VNode) -> String {
        if node.is_heading() {
            return format!("H{}: {}", node.heading_level, node.name);
        }
        if !node.landmark.is_empty() {
            return if node.name.is_empty() {
                node.landmark.clone()
            } else {
                format!("{}: {}", node.landmark, node.name)
            };
        }
        if node.name.is_empty() {
            format!("[{}]", node.control_type)
        } else {
            node.name.clone()
        }
    }

    /// The active tab's rows after filtering.
    pub fn entries(&self) -> Vec<(NodeId, String)> {
        let needle = self.filter.to_lowercase();
        self.doc
            .index(self.tab.index_kind())
            .iter()
            .filter_map(|&id| self.doc.node(id))
            .map(|node| (node.id, Self::display_text(node)))
            .filter(|(_, text)| needle.is_empty() || text.to_lowercase().contains(&needle))
            .collect()
    }

    /// The selected row, if the filtered list is non-empty.
    pub fn selected(&self) -> Option<(NodeId, String)> {
        let entries = self.entries();
        entries.get(self.selection.min(entries.len().saturating_sub(1))).cloned()
    }

    /// Feed one key event (key-downs only; ups are ignored).
    pub fn handle_key(&mut self, key: KeyEvent) -> ListEvent {
        if !key.down {
            return ListEvent::Pending;
        }
        match key.vk {
            vk::VK_ESCAPE => return ListEvent::Cancelled,
            vk::VK_RETURN => {
                if let Some((id, _)) = self.selected() {
                    return ListEvent::Selected(id);
                }
                return ListEvent::Pending;
            }
            vk::VK_TAB => {
                self.tab = self.tab.next();
                self.selection = 0;
                trace!(target: "session.elements", tab = self.tab.title(), "tab_cycled");
            }
            vk::VK_DOWN => {
                let count = self.entries().len();
                if count > 0 {
                    self.selection = (self.selection + 1).min(count - 1);
                }
            }
            vk::VK_UP => {
                self.selection = self.selection.saturating_sub(1);
            }
            vk::VK_BACK => {
                self.filter.pop();
                self.selection = 0;
            }
            _ => {
                let shifted = key.mods.contains(ModMask::SHIFT);
                if let Some(c) = vk::to_printable(key.vk, shifted) {
                    let typed = if shifted { c } else { c.to_ascii_lowercase() };
                    self.filter.push(typed);
                    self.selection = 0;
                }
            }
        }
        ListEvent::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_a11y::TestElement;
    use core_vbuf::build_document;
    use pretty_assertions::assert_eq;

    fn dialog() -> ElementsList {
        let doc = build_document(Arc::new(
            TestElement::new(vec![1], "Document")
                .child(
                    TestElement::named(vec![2], "Text", "Intro")
                        .role("heading")
                        .properties("level=1"),
                )
                .child(
                    TestElement::named(vec![3], "Text", "Details")
                        .role("heading")
                        .properties("level=2"),
                )
                .child(TestElement::named(vec![4], "Hyperlink", "Download"))
                .child(TestElement::new(vec![5], "Group").role("navigation"))
                .child(TestElement::named(vec![6], "Edit", "Search").focusable()),
        ));
        ElementsList::new(Arc::new(doc))
    }

    fn texts(list: &ElementsList) -> Vec<String> {
        list.entries().into_iter().map(|(_, t)| t).collect()
    }

    fn press(list: &mut ElementsList, vk_code: u16) -> ListEvent {
        list.handle_key(KeyEvent::down(vk_code, ModMask::empty()))
    }

    #[test]
    fn headings_tab_renders_levels() {
        let list = dialog();
        assert_eq!(list.tab(), ListTab::Headings);
        assert_eq!(texts(&list), vec!["H1: Intro", "H2: Details"]);
    }

    #[test]
    fn tab_key_cycles_through_all_tabs() {
        let mut list = dialog();
        press(&mut list, vk::VK_TAB);
        assert_eq!(list.tab(), ListTab::Links);
        assert_eq!(texts(&list), vec!["Download"]);
        press(&mut list, vk::VK_TAB);
        assert_eq!(list.tab(), ListTab::Landmarks);
        assert_eq!(texts(&list), vec!["Navigation"]);
        press(&mut list, vk::VK_TAB);
        assert_eq!(list.tab(), ListTab::FormFields);
        assert_eq!(texts(&list), vec!["Search"]);
        press(&mut list, vk::VK_TAB);
        assert_eq!(list.tab(), ListTab::Headings);
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let mut list = dialog();
        for c in [b'D' as u16, b'E' as u16] {
            press(&mut list, c);
        }
        assert_eq!(list.filter(), "de");
        assert_eq!(texts(&list), vec!["H2: Details"]);
        press(&mut list, vk::VK_BACK);
        assert_eq!(list.filter(), "d");
        assert_eq!(texts(&list), vec!["H2: Details"]);
        press(&mut list, vk::VK_BACK);
        assert_eq!(texts(&list).len(), 2);
    }

    #[test]
    fn enter_selects_and_escape_cancels() {
        let mut list = dialog();
        press(&mut list, vk::VK_DOWN);
        let ListEvent::Selected(id) = press(&mut list, vk::VK_RETURN) else {
            panic!("expected selection");
        };
        assert_eq!(list.doc.node(id).unwrap().name, "Details");
        assert_eq!(press(&mut list, vk::VK_ESCAPE), ListEvent::Cancelled);
    }

    #[test]
    fn selection_clamps_to_list() {
        let mut list = dialog();
        for _ in 0..10 {
            press(&mut list, vk::VK_DOWN);
        }
        let (_, text) = list.selected().unwrap();
        assert_eq!(text, "H2: Details");
        for _ in 0..10 {
            press(&mut list, vk::VK_UP);
        }
        assert_eq!(list.selected().unwrap().1, "H1: Intro");
    }

    #[test]
    fn enter_on_empty_filtered_list_stays_open() {
        let mut list = dialog();
        for c in [b'Z' as u16, b'Z' as u16] {
            press(&mut list, c);
        }
        assert!(list.entries().is_empty());
        assert_eq!(press(&mut list, vk::VK_RETURN), ListEvent::Pending);
    }

    #[test]
    fn key_ups_are_ignored() {
        let mut list = dialog();
        let before = list.tab();
        list.handle_key(KeyEvent::up(vk::VK_TAB, ModMask::empty()));
        assert_eq!(list.tab(), before);
    }
}
