//! Build driver for docsmith.
//!
//! This crate ties the node tree, resource handlers, dispatcher, writer and
//! link validator together into an end-to-end documentation build
//! ([`build_docs`]).

pub mod assemble;
pub mod fetch;
pub mod manifest;
pub mod pipeline;

pub use assemble::{assemble_content, select_section};
pub use fetch::{
    BlobTask, BlobWorker, DocumentTask, DocumentWorker, FetchTask, FetchWorker, GitInfoTask, GitInfoWorker,
    WrittenDocument,
};
pub use manifest::{Manifest, RemoteResource};
pub use pipeline::{BuildResult, ProgressReporter, SilentProgress, build_docs, check_directory_links};
