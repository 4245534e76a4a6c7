//! External link validator.
//!
//! Probes links with `HEAD`, falling back to `GET` when the server answers
//! with an error status, and retries `429 Too Many Requests` on a backoff
//! schedule. Unreachable links are reported as warnings and a
//! [`LinkStatus`]; only cancellation and malformed requests are errors.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, Request, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use docsmith_dispatch::Context;
use docsmith_handlers::{HandlerRegistry, HttpClient};
use docsmith_shared::{DocsmithError, Result, ValidatorConfig};

use crate::set::LinkSet;

// ---------------------------------------------------------------------------
// LinkStatus
// ---------------------------------------------------------------------------

/// Outcome of validating one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Sample or loopback host; never probed.
    Skipped,
    /// Already validated earlier in this run.
    Cached,
    /// The server answered with a non-error status.
    Reachable { status: u16 },
    /// The resource exists but requires credentials (401/403).
    AccessControlled { status: u16 },
    /// The server answered with an error status to both `HEAD` and `GET`.
    Broken { status: u16 },
    /// The request failed at the transport level.
    Unreachable { reason: String },
}

impl LinkStatus {
    /// Whether the link counts as valid.
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            Self::Skipped | Self::Cached | Self::Reachable { .. } | Self::AccessControlled { .. }
        )
    }
}

/// Result of a single probe after rate-limit retries.
enum Probe {
    Status(u16),
    Transport(String),
}

/// Error statuses other than the access-control ones.
fn is_broken_status(status: u16) -> bool {
    status >= 400 && status != 401 && status != 403
}

// ---------------------------------------------------------------------------
// LinkValidator
// ---------------------------------------------------------------------------

/// Checks reachability of external links, remembering the ones that passed.
pub struct LinkValidator {
    client: Arc<dyn HttpClient>,
    handlers: Arc<HandlerRegistry>,
    validated: LinkSet,
    config: ValidatorConfig,
}

impl LinkValidator {
    /// `client` is used unless a registered handler for the link supplies its own.
    pub fn new(client: Arc<dyn HttpClient>, handlers: Arc<HandlerRegistry>, config: ValidatorConfig) -> Self {
        Self {
            client,
            handlers,
            validated: LinkSet::new(),
            config,
        }
    }

    /// Number of distinct links validated so far.
    pub async fn validated_count(&self) -> usize {
        self.validated.len().await
    }

    /// Validate `link`, found as `destination` in the document at `source`.
    #[instrument(skip_all, fields(link = %link, source = %source))]
    pub async fn validate(
        &self,
        ctx: &Context,
        link: &Url,
        destination: &str,
        source: &str,
    ) -> Result<LinkStatus> {
        if self.is_sample_host(link) {
            debug!("sample host, skipping");
            return Ok(LinkStatus::Skipped);
        }
        if !matches!(link.scheme(), "http" | "https") {
            return Err(DocsmithError::validation(format!(
                "cannot validate {destination} from {source}: unsupported scheme {}",
                link.scheme()
            )));
        }

        let key = normalize(link);
        if self.validated.contains(&key).await {
            return Ok(LinkStatus::Cached);
        }

        let client = self.client_for(link);
        let status = match self.probe(ctx, client.as_ref(), Method::HEAD, link).await? {
            Probe::Status(status) if is_broken_status(status) => {
                debug!(status, "HEAD failed, retrying with GET");
                match self.probe(ctx, client.as_ref(), Method::GET, link).await? {
                    Probe::Status(status) => status,
                    Probe::Transport(reason) => return Ok(report_unreachable(destination, source, reason)),
                }
            }
            Probe::Status(status) => status,
            Probe::Transport(reason) => return Ok(report_unreachable(destination, source, reason)),
        };

        if is_broken_status(status) {
            warn!(link = %destination, source = %source, status, "failed to validate link");
            return Ok(LinkStatus::Broken { status });
        }

        self.validated.insert(key).await;
        if status == 401 || status == 403 {
            Ok(LinkStatus::AccessControlled { status })
        } else {
            Ok(LinkStatus::Reachable { status })
        }
    }

    fn is_sample_host(&self, link: &Url) -> bool {
        let Some(host) = link.host_str() else {
            return false;
        };
        self.config.ignored_hosts.iter().any(|h| h == host)
            || self.config.ignored_host_markers.iter().any(|m| host.contains(m.as_str()))
    }

    fn client_for(&self, link: &Url) -> Arc<dyn HttpClient> {
        self.handlers
            .get(link.as_str())
            .and_then(|handler| handler.client())
            .unwrap_or_else(|| self.client.clone())
    }

    /// Issue one request, retrying while the server answers 429.
    async fn probe(&self, ctx: &Context, client: &dyn HttpClient, method: Method, link: &Url) -> Result<Probe> {
        let mut attempt = 0;
        loop {
            let request = Request::new(method.clone(), link.clone());
            let response = match ctx.run(client.execute(request)).await? {
                Ok(response) => response,
                Err(e) if e.is_builder() => {
                    return Err(DocsmithError::validation(format!(
                        "failed to prepare {method} validation request for {link}: {e}"
                    )));
                }
                Err(e) => return Ok(Probe::Transport(e.to_string())),
            };

            let status = response.status();
            if status != StatusCode::TOO_MANY_REQUESTS || attempt >= self.config.retry_intervals.len() {
                return Ok(Probe::Status(status.as_u16()));
            }

            let delay = self.retry_delay(attempt, response.headers());
            drop(response);
            warn!(
                method = %method,
                attempt = attempt + 1,
                delay_secs = delay.as_secs(),
                "rate limited, retrying"
            );
            ctx.sleep(delay).await?;
            attempt += 1;
        }
    }

    /// Scheduled delay plus jitter, unless the server asked for an acceptable `Retry-After`.
    fn retry_delay(&self, attempt: usize, headers: &HeaderMap) -> Duration {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .filter(|after| *after <= self.config.max_retry_after);
        if let Some(after) = retry_after {
            return after;
        }

        let base = self.config.retry_intervals.get(attempt).copied().unwrap_or_default();
        base + Duration::from_secs(jitter_secs(attempt))
    }
}

/// Random whole seconds in `0..=attempt`, drawn from the random bits of a v7 UUID.
fn jitter_secs(attempt: usize) -> u64 {
    let bound = attempt as u128 + 1;
    (Uuid::now_v7().as_u128() % bound) as u64
}

fn report_unreachable(destination: &str, source: &str, reason: String) -> LinkStatus {
    warn!(link = %destination, source = %source, error = %reason, "failed to validate link");
    LinkStatus::Unreachable { reason }
}

/// Keep only scheme, host (with port) and path.
pub fn normalize(link: &Url) -> String {
    let mut unified = link.clone();
    unified.set_query(None);
    unified.set_fragment(None);
    // Only fails for URLs that cannot carry credentials, which have none to strip.
    let _ = unified.set_username("");
    let _ = unified.set_password(None);
    unified.to_string()
}
