//! The resource handler capability set and its registry.

use std::sync::Arc;

use async_trait::async_trait;

use docsmith_dispatch::Context;
use docsmith_shared::{DocsmithError, GitInfo, Result};
use docsmith_tree::{Node, NodeSelector};

use crate::http::HttpClient;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Adapter for one kind of content source.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Human-readable handler name for tracing.
    fn name(&self) -> &str;

    /// Whether this handler can serve `uri`.
    fn accept(&self, uri: &str) -> bool;

    /// Read the raw bytes behind `uri`.
    async fn read(&self, ctx: &Context, uri: &str) -> Result<Vec<u8>>;

    /// Resolve a container's children from a node selector.
    fn resolve_node_selector(&self, selector: &NodeSelector) -> Result<Vec<Node>> {
        Err(DocsmithError::validation(format!(
            "{} handler cannot resolve node selector {}",
            self.name(),
            selector.path
        )))
    }

    /// Authorship summary for `uri`, or `None` if no history is available.
    async fn read_git_info(&self, _ctx: &Context, _uri: &str) -> Result<Option<GitInfo>> {
        Ok(None)
    }

    /// Specialized client for requests to this handler's hosts.
    fn client(&self) -> Option<Arc<dyn HttpClient>> {
        None
    }

    /// Split the last segment of `link` into name and extension (without the dot).
    fn resource_name(&self, link: &str) -> (String, String);

    /// Resolve `link` relative to the document at `source`.
    fn build_abs_link(&self, source: &str, link: &str) -> Result<String>;

    /// Link to the raw (unrendered) form of `abs_link`.
    fn raw_format_link(&self, abs_link: &str) -> Result<String> {
        Ok(abs_link.to_string())
    }

    /// Pin `abs_link` to `version`.
    fn set_version(&self, abs_link: &str, _version: &str) -> Result<String> {
        Ok(abs_link.to_string())
    }
}

/// Split a file name into stem and extension, the way links are named in output.
pub(crate) fn split_name(file: &str) -> (String, String) {
    match file.rfind('.') {
        Some(idx) if idx > 0 => (file[..idx].to_string(), file[idx + 1..].to_string()),
        _ => (file.to_string(), String::new()),
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered handlers in priority order.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn ResourceHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; earlier handlers win when several accept a URI.
    pub fn register(&mut self, handler: Arc<dyn ResourceHandler>) {
        self.handlers.push(handler);
    }

    pub fn with(mut self, handler: Arc<dyn ResourceHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// The first handler accepting `uri`.
    pub fn get(&self, uri: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.iter().find(|h| h.accept(uri)).cloned()
    }

    /// Read `uri` through the handler that accepts it.
    pub async fn read(&self, ctx: &Context, uri: &str) -> Result<Vec<u8>> {
        let handler = self
            .get(uri)
            .ok_or_else(|| DocsmithError::validation(format!("no resource handler accepts {uri}")))?;
        handler.read(ctx, uri).await
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PrefixHandler(&'static str);

    #[async_trait]
    impl ResourceHandler for PrefixHandler {
        fn name(&self) -> &str {
            self.0
        }
        fn accept(&self, uri: &str) -> bool {
            uri.starts_with(self.0)
        }
        async fn read(&self, _ctx: &Context, uri: &str) -> Result<Vec<u8>> {
            Ok(format!("{}:{uri}", self.0).into_bytes())
        }
        fn resource_name(&self, link: &str) -> (String, String) {
            split_name(link)
        }
        fn build_abs_link(&self, _source: &str, link: &str) -> Result<String> {
            Ok(link.to_string())
        }
    }

    #[tokio::test]
    async fn registry_picks_first_accepting_handler() {
        let registry = HandlerRegistry::new()
            .with(Arc::new(PrefixHandler("mem")))
            .with(Arc::new(PrefixHandler("me")));

        assert_eq!(registry.get("memo").map(|h| h.name().to_string()).as_deref(), Some("mem"));
        assert_eq!(registry.get("meta").map(|h| h.name().to_string()).as_deref(), Some("me"));
        assert!(registry.get("other").is_none());

        let ctx = Context::background();
        assert_eq!(registry.read(&ctx, "memo").await.unwrap(), b"mem:memo");
        let err = registry.read(&ctx, "other").await.unwrap_err();
        assert!(err.to_string().contains("no resource handler accepts other"));
    }

    #[test]
    fn default_capabilities() {
        let handler = PrefixHandler("x");
        assert!(handler.client().is_none());
        assert_eq!(handler.raw_format_link("x/a.md").unwrap(), "x/a.md");
        assert_eq!(handler.set_version("x/a.md", "v2").unwrap(), "x/a.md");
        assert!(
            handler
                .resolve_node_selector(&NodeSelector {
                    path: "x".into(),
                    ..NodeSelector::default()
                })
                .is_err()
        );
    }

    #[test]
    fn split_name_handles_dotfiles_and_plain_names() {
        assert_eq!(split_name("guide.md"), ("guide".into(), "md".into()));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar".into(), "gz".into()));
        assert_eq!(split_name(".gitignore"), (".gitignore".into(), String::new()));
        assert_eq!(split_name("LICENSE"), ("LICENSE".into(), String::new()));
    }
}
