//! Task-group bookkeeping for every long-running unit in the hall.
//!
//! All tasks share one [`CancellationToken`]; [`ActorSystem::graceful_shutdown`]
//! cancels it and then joins every tracked task. Failures surfaced during the
//! drain are logged and counted, never retried.
use anyhow::Result;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Outcome of [`ActorSystem::graceful_shutdown`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub finished: usize,
    pub failed: usize,
}

pub struct ActorSystem {
    joinset: JoinSet<Result<()>>,
    cancel: CancellationToken,
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorSystem {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Bind the system to an externally owned token (usually the runtime's).
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            joinset: JoinSet::new(),
            cancel,
        }
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn track(&mut self, fut: impl std::future::Future<Output = Result<()>> + Send + 'static) {
        self.joinset.spawn(fut);
    }

    /// Number of tracked tasks that have not been joined yet.
    pub fn len(&self) -> usize {
        self.joinset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joinset.is_empty()
    }

    pub async fn graceful_shutdown(mut self) -> DrainReport {
        self.cancel.cancel();
        let mut report = DrainReport::default();
        while let Some(res) = self.joinset.join_next().await {
            match res {
                Ok(Ok(())) => report.finished += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(error = ?e, "system.drain.task_failed");
                }
                Err(join_err) => {
                    report.failed += 1;
                    tracing::warn!(error = %join_err, "system.drain.task_panicked");
                }
            }
        }
        tracing::info!(finished = report.finished, failed = report.failed, "system.drained");
        report
    }
}
