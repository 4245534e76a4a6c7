//! Owned node fragments, as declared in manifests or produced by resolvers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A locator plus optional selection metadata contributing content to a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSelector {
    /// Content locator (path or URL).
    pub source: String,
    /// Optional selector narrowing the content (e.g. a heading anchor).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl ContentSelector {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            selector: None,
        }
    }
}

/// A parameterized content descriptor: a template file filled from named sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Locator of the template file.
    pub path: String,
    /// Named sources substituted into the template.
    #[serde(default)]
    pub sources: BTreeMap<String, ContentSelector>,
}

/// Asks a resource handler to resolve a container's children from a location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelector {
    /// Root location to resolve (a directory for the filesystem handler).
    pub path: String,
    /// Glob patterns, relative to `path`, that are skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_paths: Vec<String>,
    /// Maximum nesting depth to resolve (unbounded when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
}

/// Content descriptors. Presence of any makes a node a *document*.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Single content locator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Ordered locators assembled into one document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_selectors: Vec<ContentSelector>,
    /// Template-based content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
}

impl Content {
    /// Whether any content descriptor is set.
    pub fn is_document(&self) -> bool {
        self.source.as_deref().is_some_and(|s| !s.is_empty())
            || self.template.is_some()
            || !self.content_selectors.is_empty()
    }

    /// Whether `locator` appears in `source`, any content selector, or any template source.
    pub fn references(&self, locator: &str) -> bool {
        self.source.as_deref() == Some(locator)
            || self.content_selectors.iter().any(|cs| cs.source == locator)
            || self
                .template
                .as_ref()
                .is_some_and(|t| t.sources.values().any(|cs| cs.source == locator))
    }
}

/// A detached node fragment with owned children.
///
/// Fragments are what manifests and resource handlers produce. They are
/// connected into a [`crate::DocTree`] where parent links live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node name; a file or folder name in the output tree.
    pub name: String,
    #[serde(flatten)]
    pub content: Content,
    /// Children resolved from a location at build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<NodeSelector>,
    /// Ordered children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
}

impl Node {
    /// A container node with the given children.
    pub fn container(name: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            nodes,
            ..Self::default()
        }
    }

    /// A document node backed by a single source.
    pub fn document(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Content {
                source: Some(source.into()),
                ..Content::default()
            },
            ..Self::default()
        }
    }

    /// Whether this node carries content (as opposed to being a container).
    pub fn is_document(&self) -> bool {
        self.content.is_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_detection() {
        assert!(Node::document("a.md", "docs/a.md").is_document());
        assert!(!Node::container("guides", vec![]).is_document());

        let mut empty_source = Node::container("x", vec![]);
        empty_source.content.source = Some(String::new());
        assert!(!empty_source.is_document());

        let mut selectors = Node::container("y.md", vec![]);
        selectors
            .content
            .content_selectors
            .push(ContentSelector::new("a.md"));
        assert!(selectors.is_document());
    }

    #[test]
    fn references_checks_every_descriptor() {
        let mut node = Node::container("t.md", vec![]);
        let mut sources = BTreeMap::new();
        sources.insert("intro".to_string(), ContentSelector::new("intro.md"));
        node.content.template = Some(Template {
            path: "tpl.md".into(),
            sources,
        });
        assert!(node.content.references("intro.md"));
        assert!(!node.content.references("tpl.md"));
    }

    #[test]
    fn manifest_fragment_deserializes() {
        let toml_str = r##"
name = "docs"

[[nodes]]
name = "index.md"
source = "README.md"

[[nodes]]
name = "merged.md"
content_selectors = [{ source = "a.md" }, { source = "b.md", selector = "#usage" }]

[[nodes]]
name = "guides"
node_selector = { path = "docs/guides", exclude_paths = ["**/drafts/**"] }
"##;
        let node: Node = toml::from_str(toml_str).expect("parse fragment");
        assert_eq!(node.nodes.len(), 3);
        assert_eq!(node.nodes[0].content.source.as_deref(), Some("README.md"));
        assert_eq!(node.nodes[1].content.content_selectors[1].selector.as_deref(), Some("#usage"));
        assert!(!node.nodes[2].is_document());
        assert_eq!(
            node.nodes[2].node_selector.as_ref().map(|s| s.path.as_str()),
            Some("docs/guides")
        );
    }
}
