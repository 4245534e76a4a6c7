//! Task and worker contracts.

use async_trait::async_trait;
use docsmith_shared::{DocsmithError, Result};

use crate::context::Context;

/// A unit of dispatchable work.
pub trait Task: Send + Sync + 'static {
    /// Identity used when reporting a failure of this task.
    fn id(&self) -> String;
}

/// Executes tasks of one kind.
///
/// Implementations should pass `ctx` down to their blocking calls so that
/// cancellation is observed where the work actually waits.
#[async_trait]
pub trait Worker<T: Task>: Send + Sync + 'static {
    async fn work(&self, ctx: &Context, task: &T) -> Result<()>;
}

/// A task-scoped failure: which task failed and why.
#[derive(Debug, thiserror::Error)]
#[error("task {task} failed: {cause}")]
pub struct WorkerError {
    /// Identity of the failed task.
    pub task: String,
    /// Underlying failure.
    #[source]
    pub cause: DocsmithError,
}

impl WorkerError {
    pub fn new(task: impl Into<String>, cause: DocsmithError) -> Self {
        Self {
            task: task.into(),
            cause,
        }
    }

    /// Whether the task stopped because the batch context was cancelled.
    pub fn is_cancellation(&self) -> bool {
        self.cause.is_cancellation()
    }
}
