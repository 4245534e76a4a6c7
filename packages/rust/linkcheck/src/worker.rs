//! Link probes as dispatchable tasks.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use url::Url;

use docsmith_dispatch::{Context, Dispatcher, Task, Worker, WorkerError};
use docsmith_shared::Result;

use crate::validator::{LinkStatus, LinkValidator};

/// One link to probe, with where it was found.
#[derive(Debug, Clone)]
pub struct LinkProbeTask {
    pub url: Url,
    /// Destination text as written in the document.
    pub destination: String,
    /// Path of the document containing the link.
    pub source: String,
}

impl Task for LinkProbeTask {
    fn id(&self) -> String {
        format!("link:{}", self.url)
    }
}

/// The status a probed link ended up with.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub url: Url,
    pub destination: String,
    pub source: String,
    pub status: LinkStatus,
}

/// Runs [`LinkProbeTask`]s through a shared validator and records outcomes.
pub struct LinkProbeWorker {
    validator: Arc<LinkValidator>,
    outcomes: Mutex<Vec<LinkOutcome>>,
}

impl LinkProbeWorker {
    pub fn new(validator: Arc<LinkValidator>) -> Self {
        Self {
            validator,
            outcomes: Mutex::new(Vec::new()),
        }
    }

    /// Drain the outcomes recorded so far.
    pub async fn take_outcomes(&self) -> Vec<LinkOutcome> {
        std::mem::take(&mut *self.outcomes.lock().await)
    }
}

#[async_trait]
impl Worker<LinkProbeTask> for LinkProbeWorker {
    async fn work(&self, ctx: &Context, task: &LinkProbeTask) -> Result<()> {
        let status = self
            .validator
            .validate(ctx, &task.url, &task.destination, &task.source)
            .await?;
        self.outcomes.lock().await.push(LinkOutcome {
            url: task.url.clone(),
            destination: task.destination.clone(),
            source: task.source.clone(),
            status,
        });
        Ok(())
    }
}

/// Summary of a link-check batch.
#[derive(Debug, Default)]
pub struct LinkCheckReport {
    /// Every link that produced a status.
    pub outcomes: Vec<LinkOutcome>,
    /// Probes that ended in an error (cancellation or malformed request).
    pub errors: Vec<WorkerError>,
}

impl LinkCheckReport {
    pub fn checked(&self) -> usize {
        self.outcomes.len()
    }

    /// Links that are broken or unreachable.
    pub fn broken(&self) -> impl Iterator<Item = &LinkOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_ok())
    }

    pub fn cancelled(&self) -> bool {
        self.errors.iter().any(WorkerError::is_cancellation)
    }
}

/// Probe `tasks` concurrently with at most `workers` requests in flight.
#[instrument(skip_all, fields(links = tasks.len(), workers = workers))]
pub async fn check_links(
    ctx: &Context,
    validator: Arc<LinkValidator>,
    workers: usize,
    tasks: Vec<LinkProbeTask>,
) -> LinkCheckReport {
    let worker = Arc::new(LinkProbeWorker::new(validator));
    let dispatch = Dispatcher::new(workers).dispatch(ctx, worker.clone(), tasks).await;
    let report = LinkCheckReport {
        outcomes: worker.take_outcomes().await,
        errors: dispatch.errors,
    };
    info!(
        checked = report.checked(),
        broken = report.broken().count(),
        errors = report.errors.len(),
        "link check completed"
    );
    report
}

#[cfg(test)]
mod tests {
    use docsmith_handlers::HandlerRegistry;
    use docsmith_shared::ValidatorConfig;
    use reqwest::Client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn task(link: &str) -> LinkProbeTask {
        LinkProbeTask {
            url: Url::parse(link).unwrap(),
            destination: link.to_string(),
            source: "docs/index.md".into(),
        }
    }

    #[tokio::test]
    async fn batch_reports_broken_links_without_failing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = ValidatorConfig {
            ignored_hosts: Vec::new(),
            ..ValidatorConfig::default()
        };
        let validator = Arc::new(LinkValidator::new(
            Arc::new(Client::new()),
            Arc::new(HandlerRegistry::new()),
            config,
        ));

        let tasks = vec![
            task(&format!("{}/ok", server.uri())),
            task(&format!("{}/missing", server.uri())),
            task("http://foo.bar.example/sample"),
        ];
        let report = check_links(&Context::background(), validator, 2, tasks).await;

        assert!(report.errors.is_empty());
        assert_eq!(report.checked(), 3);
        let broken: Vec<&str> = report.broken().map(|o| o.url.path()).collect();
        assert_eq!(broken, vec!["/missing"]);
        assert!(!report.cancelled());
    }

    #[test]
    fn task_id_names_the_link() {
        assert_eq!(task("https://example.com/a").id(), "link:https://example.com/a");
    }
}
