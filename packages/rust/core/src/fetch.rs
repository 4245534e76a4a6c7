//! Content fetch tasks and their workers.
//!
//! Each task kind has its own small worker; [`FetchWorker`] routes a mixed
//! batch of [`FetchTask`]s to them so a single dispatch covers a build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, Request};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use url::Url;

use docsmith_dispatch::{Context, Task, Worker};
use docsmith_handlers::{HandlerRegistry, HttpClient};
use docsmith_linkcheck::{DiscoveredLink, extract_links};
use docsmith_shared::{DocsmithError, Result};
use docsmith_tree::{Content, NodeId};
use docsmith_writer::Writer;

use crate::assemble::{assemble_content, primary_locator, resolve_locator};
use crate::manifest::RemoteResource;

/// Media type asking the GitHub API for raw blob bytes.
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Materialize one document node into the output tree.
#[derive(Debug, Clone)]
pub struct DocumentTask {
    pub node: NodeId,
    /// Output file name.
    pub name: String,
    /// Output directory, relative to the output root.
    pub dir: String,
    pub content: Content,
    /// Directory relative locators are resolved against.
    pub base: PathBuf,
}

impl Task for DocumentTask {
    fn id(&self) -> String {
        format!("doc:{}", join_rel(&self.dir, &self.name))
    }
}

/// Fetch a blob by hash into the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobTask {
    pub owner: String,
    pub repository: String,
    /// Content hash of the blob.
    pub sha: String,
    /// Destination path, relative to the output root.
    pub path: String,
}

impl From<RemoteResource> for BlobTask {
    fn from(resource: RemoteResource) -> Self {
        Self {
            owner: resource.owner,
            repository: resource.repository,
            sha: resource.sha,
            path: resource.path,
        }
    }
}

impl Task for BlobTask {
    fn id(&self) -> String {
        format!("blob:{}/{}@{}", self.owner, self.repository, self.sha)
    }
}

/// Write a `<name>.gitinfo.json` sidecar for a locally sourced document.
#[derive(Debug, Clone)]
pub struct GitInfoTask {
    pub name: String,
    pub dir: String,
    /// Resolved locator of the document's source.
    pub source: String,
}

impl Task for GitInfoTask {
    fn id(&self) -> String {
        format!("gitinfo:{}", self.source)
    }
}

/// Any task a build dispatches.
#[derive(Debug, Clone)]
pub enum FetchTask {
    Document(DocumentTask),
    Blob(BlobTask),
    GitInfo(GitInfoTask),
}

impl Task for FetchTask {
    fn id(&self) -> String {
        match self {
            Self::Document(t) => t.id(),
            Self::Blob(t) => t.id(),
            Self::GitInfo(t) => t.id(),
        }
    }
}

fn join_rel(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

// ---------------------------------------------------------------------------
// Document worker
// ---------------------------------------------------------------------------

/// What a document task wrote.
#[derive(Debug, Clone)]
pub struct WrittenDocument {
    pub node: NodeId,
    /// Output path relative to the output root.
    pub path: String,
    /// Primary locator of the content.
    pub source: String,
    pub bytes: usize,
    /// Hex SHA-256 of the written content.
    pub sha256: String,
    /// External links found in the content.
    pub links: Vec<DiscoveredLink>,
}

pub struct DocumentWorker {
    handlers: Arc<HandlerRegistry>,
    writer: Arc<dyn Writer>,
    written: Mutex<Vec<WrittenDocument>>,
}

impl DocumentWorker {
    pub fn new(handlers: Arc<HandlerRegistry>, writer: Arc<dyn Writer>) -> Self {
        Self {
            handlers,
            writer,
            written: Mutex::new(Vec::new()),
        }
    }

    /// Drain the records of documents written so far.
    pub async fn take_written(&self) -> Vec<WrittenDocument> {
        std::mem::take(&mut *self.written.lock().await)
    }
}

#[async_trait]
impl Worker<DocumentTask> for DocumentWorker {
    #[instrument(skip_all, fields(doc = %join_rel(&task.dir, &task.name)))]
    async fn work(&self, ctx: &Context, task: &DocumentTask) -> Result<()> {
        let content = assemble_content(ctx, &self.handlers, &task.base, &task.content).await?;
        self.writer.write(&task.name, &task.dir, &content).await?;

        let source = primary_locator(&task.content)
            .map(|l| resolve_locator(&task.base, l))
            .unwrap_or_default();
        let record = WrittenDocument {
            node: task.node,
            path: join_rel(&task.dir, &task.name),
            source,
            bytes: content.len(),
            sha256: format!("{:x}", Sha256::digest(&content)),
            links: extract_links(&String::from_utf8_lossy(&content)),
        };
        debug!(bytes = record.bytes, links = record.links.len(), "document written");
        self.written.lock().await.push(record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Blob worker
// ---------------------------------------------------------------------------

/// Fetches blobs by hash from the GitHub API and writes them verbatim.
pub struct BlobWorker {
    client: Arc<dyn HttpClient>,
    api_url: Url,
    writer: Arc<dyn Writer>,
}

impl BlobWorker {
    pub fn new(client: Arc<dyn HttpClient>, api_url: &str, writer: Arc<dyn Writer>) -> Result<Self> {
        let mut api_url = Url::parse(api_url)
            .map_err(|e| DocsmithError::config(format!("invalid GitHub API URL {api_url}: {e}")))?;
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }
        Ok(Self {
            client,
            api_url,
            writer,
        })
    }

    /// `{api}/repos/{owner}/{repository}/git/blobs/{sha}`
    pub fn blob_url(&self, task: &BlobTask) -> Result<Url> {
        self.api_url
            .join(&format!("repos/{}/{}/git/blobs/{}", task.owner, task.repository, task.sha))
            .map_err(|e| DocsmithError::validation(format!("invalid blob reference {}: {e}", task.id())))
    }
}

#[async_trait]
impl Worker<BlobTask> for BlobWorker {
    #[instrument(skip_all, fields(blob = %task.sha, path = %task.path))]
    async fn work(&self, ctx: &Context, task: &BlobTask) -> Result<()> {
        let url = self.blob_url(task)?;
        let mut request = Request::new(Method::GET, url.clone());
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static(RAW_MEDIA_TYPE));

        let response = ctx
            .run(self.client.execute(request))
            .await?
            .map_err(|e| DocsmithError::Network(format!("GET {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(DocsmithError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        let blob = ctx
            .run(response.bytes())
            .await?
            .map_err(|e| DocsmithError::Network(format!("reading blob {}: {e}", task.sha)))?;

        let destination = Path::new(&task.path);
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DocsmithError::validation(format!("resource path {} has no file name", task.path)))?;
        let dir = destination
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.writer.write(&name, &dir, &blob).await
    }
}

// ---------------------------------------------------------------------------
// Git info worker
// ---------------------------------------------------------------------------

/// Writes authorship sidecars from version-control history.
pub struct GitInfoWorker {
    handlers: Arc<HandlerRegistry>,
    writer: Arc<dyn Writer>,
}

impl GitInfoWorker {
    pub fn new(handlers: Arc<HandlerRegistry>, writer: Arc<dyn Writer>) -> Self {
        Self { handlers, writer }
    }
}

#[async_trait]
impl Worker<GitInfoTask> for GitInfoWorker {
    async fn work(&self, ctx: &Context, task: &GitInfoTask) -> Result<()> {
        let handler = self
            .handlers
            .get(&task.source)
            .ok_or_else(|| DocsmithError::validation(format!("no resource handler accepts {}", task.source)))?;
        let Some(info) = handler.read_git_info(ctx, &task.source).await? else {
            debug!(source = %task.source, "no history available");
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&info)
            .map_err(|e| DocsmithError::validation(format!("failed to serialize git info: {e}")))?;
        self.writer
            .write(&format!("{}.gitinfo.json", task.name), &task.dir, &json)
            .await
    }
}

// ---------------------------------------------------------------------------
// Routing worker
// ---------------------------------------------------------------------------

/// Hands each [`FetchTask`] to the worker for its kind.
pub struct FetchWorker {
    pub documents: DocumentWorker,
    pub blobs: BlobWorker,
    pub git_info: GitInfoWorker,
}

#[async_trait]
impl Worker<FetchTask> for FetchWorker {
    async fn work(&self, ctx: &Context, task: &FetchTask) -> Result<()> {
        match task {
            FetchTask::Document(t) => self.documents.work(ctx, t).await,
            FetchTask::Blob(t) => self.blobs.work(ctx, t).await,
            FetchTask::GitInfo(t) => self.git_info.work(ctx, t).await,
        }
    }
}
