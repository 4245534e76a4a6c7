//! Shared types, error model, and configuration for docsmith.
//!
//! This crate is the foundation depended on by all other docsmith crates.
//! It provides:
//! - [`DocsmithError`] — the unified error type, plus [`Cancellation`] kinds
//! - Domain records ([`Stat`], [`GitInfo`], [`Commit`], [`Person`])
//! - Configuration ([`AppConfig`], [`BuildConfig`], [`ValidatorConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, DefaultsConfig, GitHubConfig, LinkValidationConfig, ValidatorConfig,
    config_dir, config_file_path, github_token, init_config, load_config, load_config_from,
};
pub use error::{Cancellation, DocsmithError, Result};
pub use types::{Commit, GitInfo, Person, Stat};
