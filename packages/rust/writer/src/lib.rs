//! Output writers for docsmith.
//!
//! A [`Writer`] persists a named blob under a relative directory of its
//! configured root. [`FsWriter`] writes to the local filesystem.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use docsmith_shared::{DocsmithError, Result};

/// Persists documents and resources.
#[async_trait]
pub trait Writer: Send + Sync {
    /// Write `blob` as `name` inside the relative directory `path`.
    ///
    /// Intermediate directories are created as needed. An empty blob is a
    /// no-op.
    async fn write(&self, name: &str, path: &str, blob: &[u8]) -> Result<()>;
}

/// Writes under a root directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsWriter {
    root: PathBuf,
}

impl FsWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `name` inside `path` ends up.
    pub fn target(&self, name: &str, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path).join(name);
        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes || name.is_empty() {
            return Err(DocsmithError::validation(format!(
                "refusing to write {} outside of {}",
                relative.display(),
                self.root.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Writer for FsWriter {
    async fn write(&self, name: &str, path: &str, blob: &[u8]) -> Result<()> {
        if blob.is_empty() {
            return Ok(());
        }
        let target = self.target(name, path)?;
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| DocsmithError::io(dir, e))?;
        }
        tokio::fs::write(&target, blob)
            .await
            .map_err(|e| DocsmithError::io(&target, e))?;
        debug!(path = %target.display(), bytes = blob.len(), "wrote file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_into_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsWriter::new(dir.path());

        writer.write("intro.md", "guides/basics", b"# Intro").await.unwrap();
        writer.write("index.md", "", b"# Home").await.unwrap();
        // Repeating the directory creation is harmless.
        writer.write("next.md", "guides/basics", b"# Next").await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("guides/basics/intro.md")).unwrap();
        assert_eq!(written, "# Intro");
        assert!(dir.path().join("index.md").exists());
        assert!(dir.path().join("guides/basics/next.md").exists());
    }

    #[tokio::test]
    async fn empty_blob_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsWriter::new(dir.path());

        writer.write("empty.md", "nested", b"").await.unwrap();
        assert!(!dir.path().join("nested").exists());
    }

    #[tokio::test]
    async fn rejects_paths_escaping_root() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsWriter::new(dir.path().join("out"));

        let err = writer.write("x.md", "../elsewhere", b"x").await.unwrap_err();
        assert!(matches!(err, DocsmithError::Validation { .. }));
        assert!(writer.target("x.md", "/abs").is_err());
        assert!(writer.target("", "dir").is_err());
    }

    #[tokio::test]
    async fn names_may_carry_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsWriter::new(dir.path());
        writer.write("setup/install.md", "guides", b"# Setup").await.unwrap();
        assert!(dir.path().join("guides/setup/install.md").exists());
    }
}
