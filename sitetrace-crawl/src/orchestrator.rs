use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use sitetrace_drivers::browser::BrowserLauncher;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::session::{CrawlSession, SessionContext, SessionSettings};
use crate::target::Target;

/// What happened to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Sealed { index: usize, dir: PathBuf },
    Failed { index: usize, url: String, error: String },
    /// Not started because the crawl was cancelled first.
    Skipped { index: usize },
}

#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    /// One outcome per target, in target order.
    pub outcomes: Vec<TargetOutcome>,
}

impl CrawlSummary {
    pub fn sealed(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Sealed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&TargetOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Runs one crawl session per target and contains every per-target failure.
///
/// At most `concurrency` sessions (and therefore browser instances) are live
/// at once; the default of one reproduces a strictly sequential crawl. Targets
/// are never retried.
pub struct CrawlOrchestrator {
    ctx: SessionContext,
    concurrency: usize,
    cancel: CancellationToken,
}

impl CrawlOrchestrator {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: SessionSettings) -> Self {
        Self {
            ctx: SessionContext::new(launcher, settings),
            concurrency: 1,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Once `cancel` fires no new session starts; running ones finish.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn crawl(&self, targets: &[Target]) -> CrawlSummary {
        info!(
            target: "crawl.orchestrator",
            targets = targets.len(),
            concurrency = self.concurrency,
            "crawl started"
        );

        let outcomes = stream::iter(targets)
            .map(|target| self.crawl_one(target))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let summary = CrawlSummary { outcomes };
        info!(
            target: "crawl.orchestrator",
            crawled = summary.sealed(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "crawl finished"
        );
        summary
    }

    async fn crawl_one(&self, target: &Target) -> TargetOutcome {
        if self.cancel.is_cancelled() {
            return TargetOutcome::Skipped {
                index: target.index(),
            };
        }

        info!(target: "crawl.orchestrator", "crawling {target}");
        let run = AssertUnwindSafe(CrawlSession::new(target, &self.ctx).run()).catch_unwind();
        let error = match run.await {
            Ok(Ok(sealed)) => {
                return TargetOutcome::Sealed {
                    index: target.index(),
                    dir: sealed.dir,
                };
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("session panicked: {}", panic_message(panic.as_ref())),
        };

        warn!(
            target: "crawl.orchestrator",
            index = target.index(),
            url = %target.url(),
            error = %error,
            "target failed"
        );
        TargetOutcome::Failed {
            index: target.index(),
            url: target.url().to_string(),
            error,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
