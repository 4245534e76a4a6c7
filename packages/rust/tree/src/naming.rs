//! Default name generator for resolving sibling name collisions.

use crate::node::Node;

/// Derive an alternative name for `node` from its content locators.
///
/// - With a `source`: its last path segment, or `<second-to-last>/<last>`
///   when the last segment equals the current name.
/// - With content selectors only: the concatenated file stems of every
///   selector source plus the node's own extension.
///
/// Returns an empty string when no distinct name can be derived.
pub fn generate_new_name(node: &Node) -> String {
    let candidate = match node.content.source.as_deref().filter(|s| !s.is_empty()) {
        Some(source) => name_from_source(source, &node.name),
        None if !node.content.content_selectors.is_empty() => name_from_selectors(node),
        None => None,
    };

    match candidate {
        Some(name) if !name.is_empty() && name != node.name => name,
        _ => String::new(),
    }
}

fn name_from_source(source: &str, current: &str) -> Option<String> {
    let segments: Vec<&str> = source
        .trim_end_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let last = *segments.last()?;
    if last != current {
        return Some(last.to_string());
    }
    let second_last = segments.len().checked_sub(2).map(|i| segments[i])?;
    Some(format!("{second_last}/{last}"))
}

fn name_from_selectors(node: &Node) -> Option<String> {
    let stems: String = node
        .content
        .content_selectors
        .iter()
        .filter_map(|cs| cs.source.rsplit('/').next())
        .map(|file| split_extension(file).0)
        .collect();
    if stems.is_empty() {
        return None;
    }
    match split_extension(&node.name).1 {
        Some(ext) => Some(format!("{stems}.{ext}")),
        None => Some(stems),
    }
}

/// Split `file` into stem and extension (without the dot).
fn split_extension(file: &str) -> (&str, Option<&str>) {
    match file.rfind('.') {
        Some(idx) if idx > 0 => (&file[..idx], Some(&file[idx + 1..])),
        _ => (file, None),
    }
}
