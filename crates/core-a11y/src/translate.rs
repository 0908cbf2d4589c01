//! Translation maps between platform vocabulary and the value model:
//! numeric control-type ids to short tags, and ARIA role/property strings to
//! the flags carried on nodes and summaries.

use core_events::control;
use tracing::trace;

/// UIA control-type id range handled by [`control_type_name`].
pub const CONTROL_TYPE_FIRST: i32 = 50000;
pub const CONTROL_TYPE_LAST: i32 = 50040;

/// Translate a platform control-type id into its short tag. Anything outside
/// the known range is "Unknown".
pub fn control_type_name(id: i32) -> &'static str {
    match id {
        50000 => "Button",
        50001 => "Calendar",
        50002 => "CheckBox",
        50003 => "ComboBox",
        50004 => "Edit",
        50005 => "Hyperlink",
        50006 => "Image",
        50007 => "ListItem",
        50008 => "List",
        50009 => "Menu",
        50010 => "MenuBar",
        50011 => "MenuItem",
        50012 => "ProgressBar",
        50013 => "RadioButton",
        50014 => "ScrollBar",
        50015 => "Slider",
        50016 => "Spinner",
        50017 => "StatusBar",
        50018 => "Tab",
        50019 => "TabItem",
        50020 => "Text",
        50021 => "ToolBar",
        50022 => "ToolTip",
        50023 => "Tree",
        50024 => "TreeItem",
        50025 => "Custom",
        50026 => "Group",
        50027 => "Thumb",
        50028 => "DataGrid",
        50029 => "DataItem",
        50030 => "Document",
        50031 => "SplitButton",
        50032 => "Window",
        50033 => "Pane",
        50034 => "Header",
        50035 => "HeaderItem",
        50036 => "Table",
        50037 => "TitleBar",
        50038 => "Separator",
        50039 => "SemanticZoom",
        50040 => "AppBar",
        _ => "Unknown",
    }
}

/// Property values meaning "true". Every other token, including non-empty
/// garbage, is false.
pub fn truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
        || value == "1"
        || value.eq_ignore_ascii_case("yes")
}

/// Parse the raw ARIA property string: `key=value` pairs separated by `;`
/// or `,`, whitespace-tolerant. Later duplicates win. Pairs without `=` are
/// ignored.
pub fn parse_properties(raw: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for pair in raw.split([';', ',']) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once('=') else {
            trace!(target: "a11y.translate", pair, "property_without_value");
            continue;
        };
        out.push((
            key.trim().to_ascii_lowercase(),
            value.trim().to_string(),
        ));
    }
    out
}

fn property<'a>(props: &'a [(String, String)], key: &str) -> Option<&'a str> {
    props
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Flags derived from an element's ARIA role and property string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AriaTraits {
    /// 0 = not a heading.
    pub heading_level: u8,
    /// One of the fixed landmark names, or empty.
    pub landmark: String,
    pub link: bool,
    pub visited: bool,
    pub required: bool,
    pub expandable: bool,
    pub expanded: bool,
}

/// Derive [`AriaTraits`] from a role and raw property string.
///
/// Heading level comes from role "heading" plus `level=N`, or from the
/// aliases h1..h6. Landmark names map onto the fixed eight-entry set; any
/// other role leaves the landmark empty. Unknown property keys contribute
/// nothing.
pub fn derive_traits(role: &str, raw_properties: &str) -> AriaTraits {
    let props = parse_properties(raw_properties);
    let role = role.trim().to_ascii_lowercase();

    let heading_level = match role.as_str() {
        "heading" => property(&props, "level")
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|n| (1..=6).contains(n))
            .unwrap_or(0),
        "h1" => 1,
        "h2" => 2,
        "h3" => 3,
        "h4" => 4,
        "h5" => 5,
        "h6" => 6,
        _ => 0,
    };

    let landmark = match role.as_str() {
        "banner" => "Banner",
        "complementary" => "Complementary",
        "contentinfo" => "Content info",
        "form" => "Form",
        "main" => "Main",
        "navigation" => "Navigation",
        "region" => "Region",
        "search" => "Search",
        _ => "",
    };
    debug_assert!(landmark.is_empty() || control::is_landmark_type(landmark));

    AriaTraits {
        heading_level,
        landmark: landmark.to_string(),
        link: role == "link",
        visited: property(&props, "visited").is_some_and(truthy),
        required: property(&props, "required").is_some_and(truthy),
        expandable: property(&props, "expandable").is_some_and(truthy),
        expanded: property(&props, "expanded").is_some_and(truthy),
    }
}
