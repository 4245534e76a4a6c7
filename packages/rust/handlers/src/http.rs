//! HTTP client capability shared by resource handlers and the link validator.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Request, Response};

use docsmith_shared::{DocsmithError, Result};

/// User-Agent string for outgoing requests.
pub const USER_AGENT: &str = concat!("docsmith/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 10;

/// Something that can execute a prepared HTTP request.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl HttpClient for Client {
    async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        Client::execute(self, request).await
    }
}

/// Build the default HTTP client.
pub fn default_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| DocsmithError::Network(format!("failed to build HTTP client: {e}")))
}

/// A client that attaches a bearer token to every request.
#[derive(Clone)]
pub struct TokenClient {
    inner: Client,
    token: Option<String>,
}

impl TokenClient {
    pub fn new(inner: Client, token: Option<String>) -> Self {
        Self {
            inner,
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClient")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl HttpClient for TokenClient {
    async fn execute(&self, mut request: Request) -> reqwest::Result<Response> {
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                request.headers_mut().insert(AUTHORIZATION, value);
            }
        }
        self.inner.execute(request).await
    }
}
