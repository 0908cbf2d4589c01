//! Announcement rendering: node (or focus summary) -> spoken string.
//!
//! Parts are emitted in a fixed order, each gated by its verbosity flag,
//! joined with ", "; blank parts are skipped. When the heading-level part
//! was emitted, a control-type tag of "heading" is suppressed as redundant.

use core_config::VerbosityLevel;
use core_events::ElementSummary;
use core_vbuf::VNode;

/// Which announcement fields are spoken. Three fixed profiles; the session
/// layer may clear individual flags (e.g. visited announcements disabled in
/// settings) before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerbosityProfile {
    pub heading_level: bool,
    pub landmark_type: bool,
    pub control_type: bool,
    pub visited: bool,
    pub required: bool,
    pub expanded: bool,
    pub position_info: bool,
    pub description: bool,
}

impl VerbosityProfile {
    pub const fn beginner() -> Self {
        Self {
            heading_level: true,
            landmark_type: true,
            control_type: true,
            visited: true,
            required: true,
            expanded: true,
            position_info: true,
            description: true,
        }
    }

    pub const fn intermediate() -> Self {
        Self {
            heading_level: true,
            landmark_type: false,
            control_type: true,
            visited: true,
            required: true,
            expanded: true,
            position_info: false,
            description: false,
        }
    }

    pub const fn advanced() -> Self {
        Self {
            heading_level: false,
            landmark_type: false,
            control_type: false,
            visited: false,
            required: false,
            expanded: true,
            position_info: false,
            description: false,
        }
    }

    pub fn for_level(level: VerbosityLevel) -> Self {
        match level {
            VerbosityLevel::Beginner => Self::beginner(),
            VerbosityLevel::Intermediate => Self::intermediate(),
            VerbosityLevel::Advanced => Self::advanced(),
        }
    }
}

/// The fields the renderer consumes, decoupled from where they live
/// (buffer node or focus-event summary).
#[derive(Debug, Clone, Default)]
pub struct AnnounceSource {
    pub name: String,
    pub control_type: String,
    pub heading_level: u8,
    pub landmark: String,
    pub link: bool,
    pub visited: bool,
    pub required: bool,
    pub expandable: bool,
    pub expanded: bool,
    pub description: String,
    /// "x of y" within the relevant index, when known.
    pub position: Option<(usize, usize)>,
}

impl From<&VNode> for AnnounceSource {
    fn from(node: &VNode) -> Self {
        Self {
            name: node.name.clone(),
            control_type: node.control_type.clone(),
            heading_level: node.heading_level,
            landmark: node.landmark.clone(),
            link: node.link,
            visited: node.visited,
            required: node.required,
            expandable: node.expandable,
            expanded: node.expanded,
            description: String::new(),
            position: None,
        }
    }
}

impl From<&ElementSummary> for AnnounceSource {
    fn from(summary: &ElementSummary) -> Self {
        Self {
            name: summary.name.clone(),
            control_type: summary.control_type.clone(),
            heading_level: summary.heading_level,
            landmark: summary.landmark.clone(),
            link: summary.link,
            visited: summary.visited,
            required: summary.required,
            expandable: summary.expandable,
            expanded: summary.expanded,
            description: summary.description.clone(),
            position: None,
        }
    }
}

impl AnnounceSource {
    pub fn with_position(mut self, at: usize, of: usize) -> Self {
        self.position = Some((at, of));
        self
    }
}

/// Render the spoken announcement for `source` under `profile`.
pub fn announce(source: &AnnounceSource, profile: &VerbosityProfile) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut heading_emitted = false;

    if profile.heading_level && (1..=6).contains(&source.heading_level) {
        parts.push(format!("heading level {}", source.heading_level));
        heading_emitted = true;
    }
    if profile.landmark_type && !source.landmark.is_empty() {
        parts.push(format!("{} landmark", source.landmark));
    }
    if !source.name.is_empty() {
        parts.push(source.name.clone());
    }
    if profile.control_type {
        if source.link {
            parts.push("hyperlink".to_string());
        } else if !source.control_type.is_empty() {
            let tag = source.control_type.to_lowercase();
            // "text"/"unknown" are filler tags, and "heading" is redundant
            // once the level part spoke.
            let redundant =
                (heading_emitted && tag == "heading") || tag == "text" || tag == "unknown";
            if !redundant {
                parts.push(tag);
            }
        }
    }
    if profile.visited && source.visited {
        parts.push("visited".to_string());
    }
    if profile.required && source.required {
        parts.push("required".to_string());
    }
    if profile.expanded && source.expandable {
        parts.push(if source.expanded { "expanded" } else { "collapsed" }.to_string());
    }
    if profile.position_info {
        if let Some((at, of)) = source.position {
            parts.push(format!("{at} of {of}"));
        }
    }
    if profile.description && !source.description.is_empty() {
        parts.push(source.description.clone());
    }

    parts.join(", ")
}
