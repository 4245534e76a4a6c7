//! End-to-end build: manifest → tree → fetch → link validation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use docsmith_dispatch::{Context, Dispatcher, WorkerError};
use docsmith_handlers::{
    FsHandler, GitHubHandler, HandlerRegistry, HttpClient, ResourceHandler, TokenClient, default_client,
};
use docsmith_linkcheck::{LinkCheckReport, LinkProbeTask, LinkValidator, check_links, extract_links};
use docsmith_shared::{BuildConfig, DocsmithError, Result, Stat, ValidatorConfig};
use docsmith_tree::{DocTree, Node, NodeId, NodeSelector, UnionReport, generate_new_name};
use docsmith_writer::{FsWriter, Writer};

use crate::assemble::{primary_locator, resolve_locator};
use crate::fetch::{
    BlobTask, BlobWorker, DocumentTask, DocumentWorker, FetchTask, FetchWorker, GitInfoTask, GitInfoWorker,
    WrittenDocument,
};
use crate::manifest::Manifest;

/// Per-request timeout for content reads and link probes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a build.
#[derive(Debug)]
pub struct BuildResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    /// The resolved documentation structure, with per-document stats.
    pub tree: DocTree,
    /// Documents written to the output tree.
    pub documents: Vec<WrittenDocument>,
    /// Remote resources requested by the manifest.
    pub resources: usize,
    /// Tasks that failed, each attributed to its task.
    pub failures: Vec<WorkerError>,
    /// Whether the build context was cancelled or timed out.
    pub cancelled: bool,
    /// Link validation outcome, when it ran.
    pub links: Option<LinkCheckReport>,
    /// Merges performed while resolving node selectors, keyed by container path.
    pub unions: Vec<(String, UnionReport)>,
    pub elapsed: Duration,
}

impl BuildResult {
    /// Broken links never fail a build; failed tasks and cancellation do.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub fn broken_links(&self) -> usize {
        self.links.as_ref().map_or(0, |l| l.broken().count())
    }
}

/// Progress callback for reporting build status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each fetch task finishes.
    fn task_done(&self, id: &str, ok: bool, current: usize, total: usize);
    /// Called when the build completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn task_done(&self, _id: &str, _ok: bool, _current: usize, _total: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

struct Services {
    handlers: Arc<HandlerRegistry>,
    client: Arc<dyn HttpClient>,
    api_client: Arc<dyn HttpClient>,
    writer: Arc<dyn Writer>,
}

impl Services {
    fn new(config: &BuildConfig) -> Result<Self> {
        let client = default_client(REQUEST_TIMEOUT)?;
        let token = config.github_token.clone();
        let github = GitHubHandler::new(TokenClient::new(client.clone(), token.clone()))?;
        let handlers = HandlerRegistry::new()
            .with(Arc::new(FsHandler::new()))
            .with(Arc::new(github));
        Ok(Self {
            handlers: Arc::new(handlers),
            api_client: Arc::new(TokenClient::new(client.clone(), token)),
            client: Arc::new(client),
            writer: Arc::new(FsWriter::new(&config.output_dir)),
        })
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Run a full build.
///
/// 1. Load the manifest
/// 2. Build the node tree and resolve node selectors
/// 3. Fetch documents, git info and remote resources concurrently
/// 4. Validate external links found in the written documents
#[instrument(skip_all, fields(manifest = %config.manifest.display()))]
pub async fn build_docs(
    ctx: &Context,
    config: &BuildConfig,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = std::time::Instant::now();
    let run_id = Uuid::now_v7();
    let started_at = Utc::now();
    info!(%run_id, output = %config.output_dir.display(), "starting build");

    // --- Phase 1: Manifest ---
    progress.phase("Loading manifest");
    let manifest = Manifest::load(&config.manifest)?;
    let base = manifest_base(&config.manifest)?;
    let services = Services::new(config)?;

    // --- Phase 2: Structure ---
    progress.phase("Resolving structure");
    let location = manifest_location(&config.manifest)?;
    let mut tree = DocTree::new();
    for node in manifest.structure {
        let root = tree.add_root(node);
        for id in subtree(&tree, root) {
            tree.set_source_location(id, location.clone());
        }
    }
    tree.relink();
    let unions = resolve_node_selectors(&mut tree, &services.handlers, &base)?;

    // --- Phase 3: Fetch ---
    let mut tasks = Vec::new();
    for id in tree.documents() {
        let node = tree.node(id);
        let dir = tree.path(id, "/");
        let local_source = node
            .content
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| resolve_locator(&base, s))
            .filter(|s| !s.contains("://"));
        if let Some(source) = local_source.filter(|_| config.git_info) {
            tasks.push(FetchTask::GitInfo(GitInfoTask {
                name: node.name.clone(),
                dir: dir.clone(),
                source,
            }));
        }
        tasks.push(FetchTask::Document(DocumentTask {
            node: id,
            name: node.name.clone(),
            dir,
            content: node.content.clone(),
            base: base.clone(),
        }));
    }
    let resources = manifest.resources.len();
    tasks.extend(manifest.resources.into_iter().map(|r| FetchTask::Blob(BlobTask::from(r))));

    progress.phase("Fetching content");
    let worker = Arc::new(FetchWorker {
        documents: DocumentWorker::new(services.handlers.clone(), services.writer.clone()),
        blobs: BlobWorker::new(services.api_client.clone(), &config.github_api_url, services.writer.clone())?,
        git_info: GitInfoWorker::new(services.handlers.clone(), services.writer.clone()),
    });
    let total = tasks.len();
    let mut current = 0;
    let dispatch = Dispatcher::new(config.workers)
        .dispatch_observed(ctx, worker.clone(), tasks, |id, error| {
            current += 1;
            progress.task_done(id, error.is_none(), current, total);
        })
        .await;
    let cancelled = dispatch.cancelled() || ctx.error().is_some();
    for failure in dispatch.failures() {
        warn!(task = %failure.task, error = %failure.cause, "task failed");
    }

    let documents = worker.documents.take_written().await;
    for doc in &documents {
        tree.add_stats(doc.node, document_stats(doc));
    }

    // --- Phase 4: Links ---
    let links = if config.validate_links && !cancelled {
        progress.phase("Validating links");
        let tasks = documents
            .iter()
            .flat_map(|doc| {
                doc.links.iter().map(|link| LinkProbeTask {
                    url: link.url.clone(),
                    destination: link.destination.clone(),
                    source: doc.path.clone(),
                })
            })
            .collect();
        let validator = LinkValidator::new(
            services.client.clone(),
            services.handlers.clone(),
            config.validator.clone(),
        );
        Some(check_links(ctx, Arc::new(validator), config.validation_workers, tasks).await)
    } else {
        None
    };
    let cancelled = cancelled || links.as_ref().is_some_and(LinkCheckReport::cancelled);

    let result = BuildResult {
        run_id,
        started_at,
        output_dir: config.output_dir.clone(),
        tree,
        documents,
        resources,
        failures: dispatch.errors,
        cancelled,
        links,
        unions,
        elapsed: start.elapsed(),
    };

    info!(
        %run_id,
        documents = result.documents.len(),
        failures = result.failures.len(),
        broken_links = result.broken_links(),
        cancelled = result.cancelled,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "build completed"
    );
    progress.done(&result);
    Ok(result)
}

/// Directory that relative locators in the manifest are resolved against.
fn manifest_base(manifest: &Path) -> Result<PathBuf> {
    let dir = manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::path::absolute(dir).map_err(|e| DocsmithError::io(dir, e))
}

/// Absolute path of the manifest, recorded as the declaring location of its nodes.
fn manifest_location(manifest: &Path) -> Result<String> {
    std::path::absolute(manifest)
        .map(|p| p.display().to_string())
        .map_err(|e| DocsmithError::io(manifest, e))
}

/// `id` and all of its descendants, depth-first.
fn subtree(tree: &DocTree, id: NodeId) -> Vec<NodeId> {
    let mut found = Vec::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        found.push(current);
        stack.extend(tree.children(current).iter().rev());
    }
    found
}

/// Replace every node selector in the tree with the children it resolves to.
fn resolve_node_selectors(
    tree: &mut DocTree,
    handlers: &HandlerRegistry,
    base: &Path,
) -> Result<Vec<(String, UnionReport)>> {
    let pending: Vec<(NodeId, NodeSelector)> = tree
        .roots()
        .to_vec()
        .into_iter()
        .flat_map(|root| subtree(tree, root))
        .filter_map(|id| tree.node(id).node_selector.clone().map(|s| (id, s)))
        .collect();

    let mut reports = Vec::with_capacity(pending.len());
    for (id, mut selector) in pending {
        selector.path = resolve_locator(base, &selector.path);
        let handler = handlers
            .get(&selector.path)
            .ok_or_else(|| DocsmithError::validation(format!("no resource handler accepts {}", selector.path)))?;
        let resolved = handler.resolve_node_selector(&selector)?;
        debug!(path = %selector.path, nodes = resolved.len(), handler = handler.name(), "resolved node selector");

        let report = tree.union(id, resolved, generate_new_name)?;
        for child in tree.children(id).to_vec() {
            for node in subtree(tree, child) {
                if tree.source_location(node).is_none() {
                    tree.set_source_location(node, selector.path.clone());
                }
            }
        }

        let container = match tree.path(id, "/") {
            parent if parent.is_empty() => tree.node(id).name.clone(),
            parent => format!("{parent}/{}", tree.node(id).name),
        };
        reports.push((container, report));
    }
    tree.relink();
    Ok(reports)
}

fn document_stats(doc: &WrittenDocument) -> Vec<Stat> {
    vec![
        Stat::new("content", format!("{} bytes", doc.bytes)).with_detail(format!("sha256 {}", doc.sha256)),
        Stat::new("links", format!("{} external links", doc.links.len())),
    ]
}

// ---------------------------------------------------------------------------
// Standalone link check
// ---------------------------------------------------------------------------

/// Validate the external links of every Markdown file under `dir`.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub async fn check_directory_links(
    ctx: &Context,
    dir: &Path,
    workers: usize,
    github_token: Option<String>,
    config: ValidatorConfig,
) -> Result<LinkCheckReport> {
    let fs = FsHandler::new();
    let selector = NodeSelector {
        path: dir.display().to_string(),
        ..NodeSelector::default()
    };

    let mut files = Vec::new();
    let mut stack: Vec<Node> = fs.resolve_node_selector(&selector)?;
    while let Some(node) = stack.pop() {
        match primary_locator(&node.content) {
            Some(source) if source.ends_with(".md") => files.push(source.to_string()),
            _ => stack.extend(node.nodes),
        }
    }
    files.sort();

    let mut tasks = Vec::new();
    for file in &files {
        let raw = fs.read(ctx, file).await?;
        let display = Path::new(file)
            .strip_prefix(dir)
            .map_or_else(|_| file.clone(), |p| p.display().to_string());
        tasks.extend(extract_links(&String::from_utf8_lossy(&raw)).into_iter().map(|link| {
            LinkProbeTask {
                url: link.url,
                destination: link.destination,
                source: display.clone(),
            }
        }));
    }
    info!(files = files.len(), links = tasks.len(), "collected links");

    let client = default_client(REQUEST_TIMEOUT)?;
    let github = GitHubHandler::new(TokenClient::new(client.clone(), github_token))?;
    let handlers = Arc::new(HandlerRegistry::new().with(Arc::new(github)));
    let validator = LinkValidator::new(Arc::new(client), handlers, config);
    Ok(check_links(ctx, Arc::new(validator), workers, tasks).await)
}
