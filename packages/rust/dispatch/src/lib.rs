//! Generic concurrent task dispatch for docsmith.
//!
//! - [`Context`] — cancellation and deadline shared by a batch
//! - [`Task`] / [`Worker`] — a unit of work and its executor
//! - [`Dispatcher`] — bounded fan-out collecting a [`WorkerError`] per failed task

pub mod context;
pub mod dispatcher;
pub mod task;

pub use context::{CancelHandle, Context};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use task::{Task, Worker, WorkerError};
