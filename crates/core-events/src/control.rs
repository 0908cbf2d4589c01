//! Shared control-type vocabulary.
//!
//! Control types travel as short strings (the accessibility layer translates
//! platform ids into these). The predicates here are the ones more than one
//! crate keys on; anything used by a single subsystem stays local to it.

/// Control types that make a node a form field. A node is also a form field
/// when its required or expandable flag is set, regardless of type; callers
/// combine this predicate with those flags.
pub const FORM_FIELD_TYPES: [&str; 8] = [
    "Edit",
    "ComboBox",
    "CheckBox",
    "RadioButton",
    "Spinner",
    "Slider",
    "List",
    "ListItem",
];

pub fn is_form_field_type(control_type: &str) -> bool {
    FORM_FIELD_TYPES.contains(&control_type)
}

/// The fixed landmark vocabulary. Landmark fields are either one of these or
/// empty.
pub const LANDMARK_TYPES: [&str; 8] = [
    "Banner",
    "Complementary",
    "Content info",
    "Form",
    "Main",
    "Navigation",
    "Region",
    "Search",
];

pub fn is_landmark_type(landmark: &str) -> bool {
    LANDMARK_TYPES.contains(&landmark)
}
