//! Documentation manifests.
//!
//! A manifest declares the output structure as an ordered list of top-level
//! nodes plus any remote resources copied verbatim into the output root.
//! Manifests ending in `.json` are read as JSON, anything else as TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use docsmith_shared::{DocsmithError, Result};
use docsmith_tree::Node;

/// A blob in a GitHub repository, addressed by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResource {
    pub owner: String,
    pub repository: String,
    pub sha: String,
    /// Destination path relative to the output root.
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Top-level nodes of the documentation structure.
    #[serde(default)]
    pub structure: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<RemoteResource>,
}

impl Manifest {
    /// Read and validate the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| DocsmithError::io(path, e))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let manifest = if is_json {
            Self::from_json(&raw)?
        } else {
            Self::from_toml(&raw)?
        };
        debug!(
            path = %path.display(),
            nodes = manifest.structure.len(),
            resources = manifest.resources.len(),
            "loaded manifest"
        );
        Ok(manifest)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let manifest: Self =
            toml::from_str(raw).map_err(|e| DocsmithError::parse(format!("invalid TOML manifest: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(raw)
            .map_err(|e| DocsmithError::parse(format!("invalid JSON manifest: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        let mut stack: Vec<(&Node, String)> = self
            .structure
            .iter()
            .rev()
            .map(|n| (n, String::new()))
            .collect();
        while let Some((node, parent)) = stack.pop() {
            if node.name.trim().is_empty() {
                let at = if parent.is_empty() { "top level" } else { parent.as_str() };
                return Err(DocsmithError::validation(format!("unnamed node under {at}")));
            }
            if node.is_document() && !node.nodes.is_empty() {
                return Err(DocsmithError::validation(format!(
                    "document node {} cannot have child nodes",
                    node.name
                )));
            }
            let path = if parent.is_empty() {
                node.name.clone()
            } else {
                format!("{parent}/{}", node.name)
            };
            stack.extend(node.nodes.iter().rev().map(|child| (child, path.clone())));
        }

        for resource in &self.resources {
            if resource.path.trim().is_empty() || resource.sha.trim().is_empty() {
                return Err(DocsmithError::validation(format!(
                    "resource {}/{} needs both a sha and a path",
                    resource.owner, resource.repository
                )));
            }
        }
        Ok(())
    }
}
