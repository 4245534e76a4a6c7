//! Bounded-concurrency batch executor.

use std::sync::Arc;

use docsmith_shared::DocsmithError;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::context::Context;
use crate::task::{Task, Worker, WorkerError};

// ---------------------------------------------------------------------------
// DispatchReport
// ---------------------------------------------------------------------------

/// Aggregated outcome of one dispatch batch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of tasks in the batch.
    pub total: usize,
    /// Number of tasks that completed without error.
    pub succeeded: usize,
    /// One entry per failed task, in submission order.
    pub errors: Vec<WorkerError>,
}

impl DispatchReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether any task stopped because of cancellation or deadline expiry.
    pub fn cancelled(&self) -> bool {
        self.errors.iter().any(WorkerError::is_cancellation)
    }

    /// Errors that are not cancellations.
    pub fn failures(&self) -> impl Iterator<Item = &WorkerError> {
        self.errors.iter().filter(|e| !e.is_cancellation())
    }

    /// `Ok(succeeded)` when every task succeeded, otherwise all errors.
    pub fn into_result(self) -> Result<usize, Vec<WorkerError>> {
        if self.errors.is_empty() {
            Ok(self.succeeded)
        } else {
            Err(self.errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Runs a batch of tasks against a worker with at most `workers` in flight.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    workers: usize,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute `tasks` with `worker`, collecting every failure.
    pub async fn dispatch<T, W>(&self, ctx: &Context, worker: Arc<W>, tasks: Vec<T>) -> DispatchReport
    where
        T: Task,
        W: Worker<T> + ?Sized,
    {
        self.dispatch_observed(ctx, worker, tasks, |_, _| {}).await
    }

    /// Like [`Dispatcher::dispatch`], calling `observe(task_id, error)` as each
    /// task's outcome is collected.
    #[instrument(skip_all, fields(tasks = tasks.len(), workers = self.workers))]
    pub async fn dispatch_observed<T, W, F>(
        &self,
        ctx: &Context,
        worker: Arc<W>,
        tasks: Vec<T>,
        mut observe: F,
    ) -> DispatchReport
    where
        T: Task,
        W: Worker<T> + ?Sized,
        F: FnMut(&str, Option<&WorkerError>),
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut report = DispatchReport {
            total: tasks.len(),
            ..DispatchReport::default()
        };

        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = task.id();
            let worker = worker.clone();
            let sem = semaphore.clone();
            let ctx = ctx.clone();

            handles.push((
                id,
                tokio::spawn(async move {
                    // Queued tasks give up their slot as soon as the batch is cancelled.
                    let _permit = match ctx.run(sem.acquire_owned()).await {
                        Ok(Ok(permit)) => permit,
                        Ok(Err(_)) => return Err(DocsmithError::Task("worker pool closed".into())),
                        Err(reason) => return Err(reason.into()),
                    };
                    match ctx.run(worker.work(&ctx, &task)).await {
                        Ok(result) => result,
                        Err(reason) => Err(reason.into()),
                    }
                }),
            ));
        }

        for (id, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(())) => None,
                Ok(Err(cause)) => Some(WorkerError::new(&id, cause)),
                Err(join) => Some(WorkerError::new(&id, DocsmithError::Task(join.to_string()))),
            };

            match outcome {
                None => {
                    report.succeeded += 1;
                    observe(&id, None);
                }
                Some(err) => {
                    if err.is_cancellation() {
                        debug!(task = %id, reason = %err.cause, "task cancelled");
                    } else {
                        warn!(task = %id, error = %err.cause, "task failed");
                    }
                    observe(&id, Some(&err));
                    report.errors.push(err);
                }
            }
        }

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.errors.len(),
            "dispatch completed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use docsmith_shared::{Cancellation, Result};

    use super::*;

    struct WriteTask {
        index: usize,
        dir: PathBuf,
    }

    impl Task for WriteTask {
        fn id(&self) -> String {
            format!("write-{}", self.index)
        }
    }

    /// Writes one file per task and fails for `fail_at`.
    struct WriteWorker {
        fail_at: usize,
    }

    #[async_trait]
    impl Worker<WriteTask> for WriteWorker {
        async fn work(&self, _ctx: &Context, task: &WriteTask) -> Result<()> {
            if task.index == self.fail_at {
                return Err(DocsmithError::network("connection reset"));
            }
            let path = task.dir.join(format!("{}.txt", task.index));
            tokio::fs::write(&path, b"ok")
                .await
                .map_err(|e| DocsmithError::io(&path, e))
        }
    }

    struct SleepTask(usize);

    impl Task for SleepTask {
        fn id(&self) -> String {
            format!("sleep-{}", self.0)
        }
    }

    /// Sleeps through the context while tracking the peak number of concurrent runs.
    struct SleepWorker {
        duration: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SleepWorker {
        fn new(duration: Duration) -> Self {
            Self {
                duration,
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Worker<SleepTask> for SleepWorker {
        async fn work(&self, ctx: &Context, _task: &SleepTask) -> Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let slept = ctx.sleep(self.duration).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            slept.map_err(DocsmithError::from)
        }
    }

    #[tokio::test]
    async fn one_failing_task_does_not_stop_siblings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tasks: Vec<WriteTask> = (0..8)
            .map(|index| WriteTask {
                index,
                dir: dir.path().to_path_buf(),
            })
            .collect();

        let report = Dispatcher::new(3)
            .dispatch(&Context::background(), Arc::new(WriteWorker { fail_at: 5 }), tasks)
            .await;

        assert_eq!(report.total, 8);
        assert_eq!(report.succeeded, 7);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].task, "write-5");
        assert!(!report.cancelled());

        for index in (0..8).filter(|i| *i != 5) {
            assert!(dir.path().join(format!("{index}.txt")).exists());
        }
        assert!(!dir.path().join("5.txt").exists());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let worker = Arc::new(SleepWorker::new(Duration::from_millis(30)));
        let tasks = (0..9).map(SleepTask).collect();

        let report = Dispatcher::new(2)
            .dispatch(&Context::background(), worker.clone(), tasks)
            .await;

        assert!(report.is_ok());
        assert_eq!(report.succeeded, 9);
        assert!(worker.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn deadline_stops_in_flight_and_queued_tasks() {
        let worker = Arc::new(SleepWorker::new(Duration::from_secs(30)));
        let tasks = (0..6).map(SleepTask).collect();
        let ctx = Context::background().with_timeout(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let report = Dispatcher::new(2).dispatch(&ctx, worker, tasks).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.errors.len(), 6);
        assert!(report.errors.iter().all(|e| matches!(
            e.cause,
            DocsmithError::Cancelled(Cancellation::DeadlineExceeded)
        )));
        assert_eq!(report.failures().count(), 0);
    }

    #[tokio::test]
    async fn explicit_cancel_is_reported_as_cancellation() {
        let worker = Arc::new(SleepWorker::new(Duration::from_secs(30)));
        let tasks = (0..3).map(SleepTask).collect();
        let (ctx, handle) = Context::background().with_cancel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });

        let mut observed = Vec::new();
        let report = Dispatcher::new(4)
            .dispatch_observed(&ctx, worker, tasks, |id, err| {
                observed.push((id.to_string(), err.is_some()));
            })
            .await;

        assert!(report.cancelled());
        assert_eq!(report.succeeded, 0);
        assert_eq!(observed.len(), 3);
        assert!(observed.iter().all(|(_, failed)| *failed));
        assert!(report.into_result().is_err());
    }
}
