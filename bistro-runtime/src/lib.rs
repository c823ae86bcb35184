//! The process-wide Tokio runtime and the cancellation token every
//! long-running unit in the dining hall is bound to.
use anyhow::Result;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct BistroHandle {
    cancel: CancellationToken,
}

pub struct BistroRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl BistroRuntime {
    /// Build a multi-threaded runtime whose worker threads are named `thread_name`.
    ///
    /// ```
    /// use bistro_runtime::BistroRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = BistroRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        Ok(Self {
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    /// Obtain a cloned handle for sharing cancellation.
    ///
    /// ```
    /// use bistro_runtime::BistroRuntime;
    ///
    /// let runtime = BistroRuntime::build("handle-example", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// assert!(!handle.cancellation().is_cancelled());
    /// ```
    pub fn handle(&self) -> BistroHandle {
        BistroHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Drive a future to completion, blocking the calling thread.
    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel the shared token, then give outstanding tasks `graceful` to
    /// finish before the runtime is torn down.
    ///
    /// ```
    /// use bistro_runtime::BistroRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = BistroRuntime::build("shutdown-example", Some(1)).unwrap();
    /// let token = runtime.handle().cancellation();
    /// runtime.shutdown(Duration::from_millis(5));
    /// assert!(token.is_cancelled());
    /// ```
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
        tracing::debug!(?graceful, "runtime.shutdown");
    }
}

impl BistroHandle {
    /// The shared cancellation token. Cancelling any clone cancels them all.
    ///
    /// ```
    /// use bistro_runtime::BistroRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = BistroRuntime::build("cancel-example", Some(1)).unwrap();
    /// let cancel = runtime.handle().cancellation();
    /// cancel.cancel();
    /// assert!(runtime.handle().cancellation().is_cancelled());
    /// runtime.shutdown(Duration::from_millis(5));
    /// ```
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
