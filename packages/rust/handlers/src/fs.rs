//! Local filesystem resource handler.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument};

use docsmith_dispatch::Context;
use docsmith_shared::{DocsmithError, GitInfo, Result};
use docsmith_tree::{Node, NodeSelector};

use crate::git;
use crate::handler::{ResourceHandler, split_name};

/// Serves local filesystem paths, i.e. any locator without a URL scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsHandler;

impl FsHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResourceHandler for FsHandler {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn accept(&self, uri: &str) -> bool {
        !uri.is_empty() && !uri.contains("://")
    }

    async fn read(&self, ctx: &Context, uri: &str) -> Result<Vec<u8>> {
        ctx.run(tokio::fs::read(uri))
            .await?
            .map_err(|e| DocsmithError::io(uri, e))
    }

    fn resolve_node_selector(&self, selector: &NodeSelector) -> Result<Vec<Node>> {
        resolve_directory(selector)
    }

    async fn read_git_info(&self, ctx: &Context, uri: &str) -> Result<Option<GitInfo>> {
        git::read_git_info(ctx, Path::new(uri)).await
    }

    fn resource_name(&self, link: &str) -> (String, String) {
        let file = Path::new(link)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        split_name(&file)
    }

    fn build_abs_link(&self, source: &str, link: &str) -> Result<String> {
        let link_path = Path::new(link);
        if link_path.is_absolute() {
            return Ok(link.to_string());
        }
        let dir = Path::new(source).parent().unwrap_or(Path::new(""));
        let joined = clean(&dir.join(link_path));
        let absolute = if joined.is_absolute() {
            joined
        } else {
            std::path::absolute(&joined).map_err(|e| DocsmithError::io(&joined, e))?
        };
        Ok(absolute.to_string_lossy().into_owned())
    }
}

// ---------------------------------------------------------------------------
// Node selector resolution
// ---------------------------------------------------------------------------

struct Entry {
    name: String,
    path: PathBuf,
    rel: String,
    is_dir: bool,
}

/// A directory whose entries are still being turned into nodes.
struct Frame {
    node: Node,
    entries: std::vec::IntoIter<Entry>,
    depth: usize,
}

/// Mirror the directory at `selector.path` as node fragments.
///
/// Directories become containers and regular files become documents whose
/// `source` is their path. Entries are sorted by name, paths matching an
/// exclude glob (relative to the selector root) are skipped, directories
/// deeper than `depth` are not entered, and directories left without any
/// nodes are dropped.
#[instrument(skip_all, fields(path = %selector.path))]
pub fn resolve_directory(selector: &NodeSelector) -> Result<Vec<Node>> {
    let root = Path::new(&selector.path);
    let meta = std::fs::metadata(root).map_err(|e| DocsmithError::io(root, e))?;
    if !meta.is_dir() {
        return Err(DocsmithError::validation(format!(
            "node selector path {} is not a directory",
            selector.path
        )));
    }

    let excludes: Vec<Regex> = selector
        .exclude_paths
        .iter()
        .filter_map(|p| glob_to_regex(p))
        .collect();

    let mut stack = vec![Frame {
        node: Node::container("", Vec::new()),
        entries: read_entries(root, "", &excludes)?.into_iter(),
        depth: 1,
    }];

    while let Some(frame) = stack.last_mut() {
        match frame.entries.next() {
            Some(entry) if entry.is_dir => {
                if selector.depth.is_some_and(|max| frame.depth >= max) {
                    debug!(dir = %entry.rel, "depth limit reached");
                    continue;
                }
                let depth = frame.depth + 1;
                let entries = read_entries(&entry.path, &entry.rel, &excludes)?.into_iter();
                stack.push(Frame {
                    node: Node::container(entry.name, Vec::new()),
                    entries,
                    depth,
                });
            }
            Some(entry) => {
                let source = entry.path.to_string_lossy().into_owned();
                frame.node.nodes.push(Node::document(entry.name, source));
            }
            None => {
                let Some(done) = stack.pop() else { break };
                match stack.last_mut() {
                    Some(parent) if !done.node.nodes.is_empty() => parent.node.nodes.push(done.node),
                    Some(_) => {}
                    None => return Ok(done.node.nodes),
                }
            }
        }
    }
    Ok(Vec::new())
}

fn read_entries(dir: &Path, rel_dir: &str, excludes: &[Regex]) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for item in std::fs::read_dir(dir).map_err(|e| DocsmithError::io(dir, e))? {
        let item = item.map_err(|e| DocsmithError::io(dir, e))?;
        let file_type = item.file_type().map_err(|e| DocsmithError::io(item.path(), e))?;
        let name = item.file_name().to_string_lossy().into_owned();
        let rel = if rel_dir.is_empty() {
            name.clone()
        } else {
            format!("{rel_dir}/{name}")
        };
        let is_dir = file_type.is_dir();
        if is_excluded(&rel, is_dir, excludes) {
            debug!(path = %rel, "excluded");
            continue;
        }
        entries.push(Entry {
            name,
            path: item.path(),
            rel,
            is_dir,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn is_excluded(rel: &str, is_dir: bool, excludes: &[Regex]) -> bool {
    excludes.iter().any(|re| {
        re.is_match(rel) || (is_dir && re.is_match(&format!("{rel}/")))
    })
}

/// Convert a simple glob pattern to a regex.
/// Supports `**/` (any leading directories), `**`, `*` (one segment) and `?`.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*/", "(?:.*/)?")
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", "[^/]");
    Regex::new(&format!("^{escaped}$")).ok()
}

/// Lexically normalize `.` and `..` components.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
