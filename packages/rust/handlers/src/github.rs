//! GitHub resource handler: raw content reads and link transforms for
//! `github.com` URLs, with an authenticated client for API and link probes.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Request};
use tracing::{debug, instrument};
use url::Url;

use docsmith_dispatch::Context;
use docsmith_shared::{DocsmithError, Result};

use crate::handler::{ResourceHandler, split_name};
use crate::http::{HttpClient, TokenClient};

const WEB_HOST: &str = "github.com";
const RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Serves `github.com` blob/tree/raw URLs and raw content URLs.
#[derive(Debug, Clone)]
pub struct GitHubHandler {
    client: Arc<TokenClient>,
    raw_base: Url,
}

impl GitHubHandler {
    pub fn new(client: TokenClient) -> Result<Self> {
        let raw_base = Url::parse(RAW_BASE)
            .map_err(|e| DocsmithError::config(format!("invalid raw content URL: {e}")))?;
        Ok(Self {
            client: Arc::new(client),
            raw_base,
        })
    }

    /// Serve raw content from `raw_base` instead of `raw.githubusercontent.com`.
    pub fn with_raw_base(mut self, raw_base: Url) -> Self {
        self.raw_base = raw_base;
        self
    }

    fn is_raw(&self, url: &Url) -> bool {
        url.host_str() == self.raw_base.host_str()
            && url.port_or_known_default() == self.raw_base.port_or_known_default()
    }

    fn is_web(url: &Url) -> bool {
        url.host_str() == Some(WEB_HOST)
    }
}

/// Path segments of `url`, without empty ones.
fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default()
}

fn parse(link: &str) -> Result<Url> {
    Url::parse(link).map_err(|e| DocsmithError::validation(format!("invalid GitHub URL {link}: {e}")))
}

#[async_trait]
impl ResourceHandler for GitHubHandler {
    fn name(&self) -> &str {
        "github"
    }

    fn accept(&self, uri: &str) -> bool {
        Url::parse(uri).is_ok_and(|url| Self::is_web(&url) || self.is_raw(&url))
    }

    #[instrument(skip_all, fields(uri = %uri))]
    async fn read(&self, ctx: &Context, uri: &str) -> Result<Vec<u8>> {
        let raw = parse(&self.raw_format_link(uri)?)?;
        debug!(raw = %raw, "fetching raw content");

        let response = ctx
            .run(self.client.execute(Request::new(Method::GET, raw.clone())))
            .await?
            .map_err(|e| DocsmithError::Network(format!("GET {raw}: {e}")))?;
        if !response.status().is_success() {
            return Err(DocsmithError::Http {
                status: response.status().as_u16(),
                url: raw.to_string(),
            });
        }
        let bytes = ctx
            .run(response.bytes())
            .await?
            .map_err(|e| DocsmithError::Network(format!("reading body of {raw}: {e}")))?;
        Ok(bytes.to_vec())
    }

    fn client(&self) -> Option<Arc<dyn HttpClient>> {
        Some(self.client.clone())
    }

    fn resource_name(&self, link: &str) -> (String, String) {
        let last = Url::parse(link)
            .ok()
            .and_then(|url| segments(&url).last().map(|s| s.to_string()))
            .unwrap_or_default();
        split_name(&last)
    }

    fn build_abs_link(&self, source: &str, link: &str) -> Result<String> {
        let base = parse(source)?;
        base.join(link)
            .map(String::from)
            .map_err(|e| DocsmithError::validation(format!("cannot resolve {link} against {source}: {e}")))
    }

    /// `github.com/{owner}/{repo}/(blob|tree|raw)/{ref}/{path}` becomes
    /// `{raw_base}/{owner}/{repo}/{ref}/{path}`; anything else is unchanged.
    fn raw_format_link(&self, abs_link: &str) -> Result<String> {
        let url = parse(abs_link)?;
        if !Self::is_web(&url) {
            return Ok(abs_link.to_string());
        }
        let segs = segments(&url);
        match segs.as_slice() {
            [owner, repo, "blob" | "tree" | "raw", rest @ ..] if !rest.is_empty() => {
                let mut raw = self.raw_base.clone();
                raw.set_path(&format!("{owner}/{repo}/{}", rest.join("/")));
                Ok(raw.to_string())
            }
            _ => Ok(abs_link.to_string()),
        }
    }

    /// Replace the ref segment of a blob/tree/raw or raw-content URL.
    fn set_version(&self, abs_link: &str, version: &str) -> Result<String> {
        let mut url = parse(abs_link)?;
        let ref_index = if Self::is_web(&url) {
            match segments(&url).get(2).copied() {
                Some("blob" | "tree" | "raw") => 3,
                _ => return Ok(abs_link.to_string()),
            }
        } else if self.is_raw(&url) {
            2
        } else {
            return Ok(abs_link.to_string());
        };

        let mut segs: Vec<String> = segments(&url).into_iter().map(str::to_string).collect();
        let Some(slot) = segs.get_mut(ref_index) else {
            return Ok(abs_link.to_string());
        };
        *slot = version.to_string();
        url.set_path(&segs.join("/"));
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::default_client;

    fn handler(token: Option<&str>) -> GitHubHandler {
        let client = TokenClient::new(default_client(Duration::from_secs(5)).unwrap(), token.map(String::from));
        GitHubHandler::new(client).unwrap()
    }

    #[test]
    fn accepts_github_urls_only() {
        let h = handler(None);
        assert!(h.accept("https://github.com/org/repo/blob/main/README.md"));
        assert!(h.accept("https://raw.githubusercontent.com/org/repo/main/README.md"));
        assert!(!h.accept("https://gitlab.com/org/repo"));
        assert!(!h.accept("docs/README.md"));
    }

    #[test]
    fn raw_format_link_rewrites_blob_urls() {
        let h = handler(None);
        assert_eq!(
            h.raw_format_link("https://github.com/org/repo/blob/main/docs/a.md").unwrap(),
            "https://raw.githubusercontent.com/org/repo/main/docs/a.md"
        );
        assert_eq!(
            h.raw_format_link("https://github.com/org/repo/tree/v1/docs").unwrap(),
            "https://raw.githubusercontent.com/org/repo/v1/docs"
        );
        assert_eq!(
            h.raw_format_link("https://github.com/org/repo/issues/1").unwrap(),
            "https://github.com/org/repo/issues/1"
        );
    }

    #[test]
    fn set_version_swaps_ref_segment() {
        let h = handler(None);
        assert_eq!(
            h.set_version("https://github.com/org/repo/blob/main/docs/a.md", "v2.0").unwrap(),
            "https://github.com/org/repo/blob/v2.0/docs/a.md"
        );
        assert_eq!(
            h.set_version("https://raw.githubusercontent.com/org/repo/main/a.md", "dev").unwrap(),
            "https://raw.githubusercontent.com/org/repo/dev/a.md"
        );
        assert_eq!(
            h.set_version("https://github.com/org/repo", "dev").unwrap(),
            "https://github.com/org/repo"
        );
    }

    #[test]
    fn link_helpers() {
        let h = handler(None);
        assert_eq!(
            h.resource_name("https://github.com/org/repo/blob/main/docs/setup.md"),
            ("setup".into(), "md".into())
        );
        assert_eq!(
            h.build_abs_link("https://github.com/org/repo/blob/main/docs/a.md", "../img/x.png").unwrap(),
            "https://github.com/org/repo/blob/main/img/x.png"
        );
        assert!(h.client().is_some());
    }

    #[tokio::test]
    async fn reads_raw_content_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/org/repo/main/README.md"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Hello"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/org/repo/main/missing.md"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let h = handler(Some("t0ken")).with_raw_base(Url::parse(&server.uri()).unwrap());
        let ctx = Context::background();

        let uri = format!("{}/org/repo/main/README.md", server.uri());
        assert!(h.accept(&uri));
        assert_eq!(h.read(&ctx, &uri).await.unwrap(), b"# Hello");

        let err = h
            .read(&ctx, &format!("{}/org/repo/main/missing.md", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, DocsmithError::Http { status: 404, .. }));
    }
}
