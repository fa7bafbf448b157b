//! Tokio runtime shared by the sitetrace binary, plus the cancellation token
//! every long-running phase watches.
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct SitetraceRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl SitetraceRuntime {
    /// Build a multi-threaded runtime. `worker_threads` of `None` lets Tokio
    /// pick one worker per core.
    ///
    /// ```
    /// use sitetrace_runtime::SitetraceRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = SitetraceRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// assert_eq!(runtime.block_on(async { 2 + 2 }), 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build().context("failed to build tokio runtime")?;
        Ok(Self {
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    /// Token cancelled on Ctrl-C (once [`cancel_on_ctrl_c`](Self::cancel_on_ctrl_c)
    /// is installed) and on [`shutdown`](Self::shutdown).
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the shared token when the process receives Ctrl-C.
    ///
    /// ```
    /// use sitetrace_runtime::SitetraceRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = SitetraceRuntime::build("ctrl-c-example", Some(1)).unwrap();
    /// runtime.cancel_on_ctrl_c();
    /// assert!(!runtime.cancellation().is_cancelled());
    /// runtime.shutdown(Duration::from_millis(5));
    /// ```
    pub fn cancel_on_ctrl_c(&self) {
        let cancel = self.cancel.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        warn!(target: "runtime", "interrupt received; finishing in-flight work");
                        cancel.cancel();
                    }
                    Err(e) => warn!(target: "runtime", error = %e, "cannot listen for Ctrl-C"),
                },
                _ = cancel.cancelled() => {}
            }
        });
    }

    /// Run a future to completion on the runtime.
    ///
    /// ```
    /// use sitetrace_runtime::SitetraceRuntime;
    ///
    /// let runtime = SitetraceRuntime::build("block-on-example", Some(1)).unwrap();
    /// assert_eq!(runtime.block_on(async { "done" }), "done");
    /// ```
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and shut the runtime down gracefully.
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_cancels_the_shared_token() {
        let runtime = SitetraceRuntime::build("shutdown-test", Some(1)).unwrap();
        let token = runtime.cancellation();
        runtime.shutdown(Duration::from_millis(5));
        assert!(token.is_cancelled());
    }

    #[test]
    fn running_work_observes_cancellation() {
        let runtime = SitetraceRuntime::build("cancel-test", Some(1)).unwrap();
        let token = runtime.cancellation();
        let trigger = runtime.cancellation();
        let stopped = runtime.block_on(async move {
            tokio::spawn(async move { trigger.cancel() });
            token.cancelled().await;
            "stopped"
        });
        assert_eq!(stopped, "stopped");
    }
}
