//! External link validation for docsmith.
//!
//! - [`LinkValidator`] — deduplicating HEAD/GET prober with 429 backoff
//! - [`extract_links`] — absolute links found in Markdown
//! - [`check_links`] — concurrent batch validation through the dispatcher

pub mod links;
pub mod set;
pub mod validator;
pub mod worker;

pub use links::{DiscoveredLink, extract_links};
pub use set::LinkSet;
pub use validator::{LinkStatus, LinkValidator, normalize};
pub use worker::{LinkCheckReport, LinkOutcome, LinkProbeTask, LinkProbeWorker, check_links};
