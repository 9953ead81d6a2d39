//! Namespace-agnostic lookups over `xmltree` elements.
//!
//! `xmltree` stores the local name in `Element::name`, so matching on it
//! ignores whatever prefix a renderer picked.

use xmltree::Element;

/// First child element with local name `name`.
pub(crate) fn child_named<'a>(parent: &'a Element, name: &str) -> Option<&'a Element> {
    parent
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .find(|elem| elem.name == name)
}

/// All child elements with local name `name`.
pub(crate) fn children_named<'a>(
    parent: &'a Element,
    name: &'a str,
) -> impl Iterator<Item = &'a Element> {
    parent
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .filter(move |elem| elem.name == name)
}

/// Trimmed text of the child element with local name `name`.
pub(crate) fn child_text(parent: &Element, name: &str) -> Option<String> {
    child_named(parent, name).map(|elem| {
        elem.get_text()
            .map(|text| text.trim().to_string())
            .unwrap_or_default()
    })
}
