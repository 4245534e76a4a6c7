//! Resource handlers for docsmith.
//!
//! A resource handler adapts one kind of content source: it reads content,
//! resolves node selectors, reports version history and transforms links.
//!
//! - [`ResourceHandler`] / [`HandlerRegistry`] — the capability set and lookup
//! - [`FsHandler`] — local files and directories
//! - [`GitHubHandler`] — `github.com` content through an authenticated client
//! - [`HttpClient`] — request execution shared with the link validator
//! - [`git`] — history reader backed by the `git` CLI

pub mod fs;
pub mod git;
pub mod github;
pub mod handler;
pub mod http;

pub use fs::FsHandler;
pub use github::GitHubHandler;
pub use handler::{HandlerRegistry, ResourceHandler};
pub use http::{HttpClient, TokenClient, USER_AGENT, default_client};
