//! One browser-driven crawl of one target, from provision to seal.
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use sitetrace_common::StealthLevel;
use sitetrace_config::{CrawlSettings, RangeSetting};
use sitetrace_drivers::browser::{
    behavioral::BehavioralEngine,
    fingerprint::{UserAgentManager, UserAgentProfile},
    intercept::{InterceptionScript, HARVEST_SCRIPT},
    page,
    stealth::StealthScripts,
    BrowserLauncher, BrowserSession, LogKind,
};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bundle::{ArtifactBundle, SealedBundle};
use crate::capture::{
    parse_call_buffer, parse_console_entries, parse_network_events, reconcile_calls,
    recover_calls_from_console,
};
use crate::error::CrawlSessionError;
use crate::target::Target;

/// Knobs for a single session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub stealth: StealthLevel,
    pub output_root: PathBuf,
    pub max_scrolls: u32,
    pub scroll_delta_px: RangeSetting,
    pub scroll_pause_ms: RangeSetting,
    pub settle_ms: RangeSetting,
    pub dwell_ms: RangeSetting,
    /// Budget for provision..harvest; `None` relies on the scroll cap and
    /// dwell bound alone.
    pub timeout: Option<Duration>,
    /// Separate bound on closing the browser, applied on every path.
    pub release_timeout: Duration,
    pub intercepted_functions: Vec<String>,
}

/// How long a browser gets to shut down before it is abandoned.
pub const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(15);

impl From<&CrawlSettings> for SessionSettings {
    fn from(cfg: &CrawlSettings) -> Self {
        Self {
            stealth: cfg.stealth,
            output_root: cfg.output_dir.clone(),
            max_scrolls: cfg.max_scrolls,
            scroll_delta_px: cfg.scroll_delta_px.normalized(),
            scroll_pause_ms: cfg.scroll_pause_ms.normalized(),
            settle_ms: cfg.settle_ms.normalized(),
            dwell_ms: cfg.dwell_ms.normalized(),
            timeout: (cfg.session_timeout_secs > 0)
                .then(|| Duration::from_secs(cfg.session_timeout_secs)),
            release_timeout: DEFAULT_RELEASE_TIMEOUT,
            intercepted_functions: cfg.intercepted_functions.clone(),
        }
    }
}

/// Collaborators shared, read-only, by every session of a crawl.
pub struct SessionContext {
    pub launcher: Arc<dyn BrowserLauncher>,
    pub settings: SessionSettings,
    pub fingerprints: UserAgentManager,
    pub behavior: BehavioralEngine,
}

impl SessionContext {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: SessionSettings) -> Self {
        Self {
            launcher,
            settings,
            fingerprints: UserAgentManager::new(),
            behavior: BehavioralEngine::new(),
        }
    }
}

/// Result of the scroll simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementOutcome {
    /// Scroll steps performed.
    pub iterations: u32,
    /// Whether the viewport bottom reached the document height.
    pub reached_bottom: bool,
}

pub struct CrawlSession<'a> {
    id: Uuid,
    target: &'a Target,
    ctx: &'a SessionContext,
}

impl<'a> CrawlSession<'a> {
    pub fn new(target: &'a Target, ctx: &'a SessionContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            ctx,
        }
    }

    /// Run every phase and seal the bundle. The browser is released on every
    /// path once provisioned; a failed session leaves no bundle behind.
    pub async fn run(self) -> Result<SealedBundle, CrawlSessionError> {
        let span = info_span!(
            "crawl_session",
            index = self.target.index(),
            url = %self.target.url(),
            session = %self.id,
        );
        self.run_phases().instrument(span).await
    }

    async fn run_phases(&self) -> Result<SealedBundle, CrawlSessionError> {
        let settings = &self.ctx.settings;
        let budget = settings.timeout.map(|b| Budget {
            deadline: Instant::now() + b,
            total: b,
        });

        let profile = self.ctx.fingerprints.random_profile();
        let browser = within(budget, async {
            self.ctx
                .launcher
                .launch(&profile, settings.stealth)
                .await
                .map_err(CrawlSessionError::Provision)
        })
        .await?;

        let outcome = within(budget, self.drive(browser.as_ref(), &profile)).await;
        release(browser.as_ref(), settings.release_timeout).await;

        let bundle = outcome?;
        let sealed = bundle.seal(&settings.output_root, &self.target.dir_name())?;
        info!(
            target: "crawl.session",
            dir = %sealed.dir.display(),
            requests = sealed.counts.requests,
            responses = sealed.counts.responses,
            console = sealed.counts.console_entries,
            js_calls = sealed.counts.js_calls,
            "bundle sealed"
        );
        Ok(sealed)
    }

    async fn drive(
        &self,
        browser: &dyn BrowserSession,
        profile: &UserAgentProfile,
    ) -> Result<ArtifactBundle, CrawlSessionError> {
        let settings = &self.ctx.settings;
        let behavior = &self.ctx.behavior;

        let interceptor = self
            .instrument(browser, profile)
            .await
            .map_err(CrawlSessionError::Instrument)?;

        browser
            .goto(self.target.url())
            .await
            .map_err(CrawlSessionError::Navigate)?;
        behavior
            .random_delay(settings.settle_ms.min, settings.settle_ms.max)
            .await;

        let engagement = simulate_engagement(browser, behavior, settings)
            .await
            .map_err(CrawlSessionError::Engage)?;
        debug!(
            target: "crawl.session",
            iterations = engagement.iterations,
            reached_bottom = engagement.reached_bottom,
            "scroll simulation finished"
        );

        let dwell = behavior
            .random_delay(settings.dwell_ms.min, settings.dwell_ms.max)
            .await;
        debug!(target: "crawl.session", dwell_ms = dwell.as_millis() as u64, "dwell finished");

        harvest(browser, &interceptor)
            .await
            .map_err(CrawlSessionError::Harvest)
    }

    async fn instrument(
        &self,
        browser: &dyn BrowserSession,
        profile: &UserAgentProfile,
    ) -> anyhow::Result<InterceptionScript> {
        let settings = &self.ctx.settings;
        let interceptor =
            InterceptionScript::new(&settings.intercepted_functions, &self.id.simple().to_string())?;
        browser
            .add_init_script(&StealthScripts::for_level(settings.stealth, profile))
            .await?;
        browser.add_init_script(&interceptor.render()).await?;
        Ok(interceptor)
    }
}

#[derive(Debug, Clone, Copy)]
struct Budget {
    deadline: Instant,
    total: Duration,
}

/// Run `phase` against the session deadline, if there is one.
async fn within<T, F>(budget: Option<Budget>, phase: F) -> Result<T, CrawlSessionError>
where
    F: Future<Output = Result<T, CrawlSessionError>>,
{
    match budget {
        Some(b) => tokio::time::timeout_at(b.deadline, phase)
            .await
            .unwrap_or(Err(CrawlSessionError::Timeout(b.total))),
        None => phase.await,
    }
}

async fn release(browser: &dyn BrowserSession, limit: Duration) {
    match tokio::time::timeout(limit, browser.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(target: "crawl.session", error = %e, "failed to release browser"),
        Err(_) => warn!(
            target: "crawl.session",
            limit_ms = limit.as_millis() as u64,
            "browser did not close in time; abandoning it"
        ),
    }
}

/// Scroll by human-like steps until the viewport bottom reaches the document
/// height or `max_scrolls` steps have been taken.
pub async fn simulate_engagement(
    browser: &dyn BrowserSession,
    behavior: &BehavioralEngine,
    settings: &SessionSettings,
) -> anyhow::Result<EngagementOutcome> {
    for iteration in 1..=settings.max_scrolls {
        let delta = behavior.scroll_delta(settings.scroll_delta_px.min, settings.scroll_delta_px.max);
        page::scroll_by(browser, delta).await?;
        behavior
            .random_delay(settings.scroll_pause_ms.min, settings.scroll_pause_ms.max)
            .await;

        let metrics = page::measure(browser).await?;
        debug!(
            target: "crawl.scroll",
            iteration,
            delta,
            position = metrics.position,
            total_height = metrics.total_height,
            "scrolled"
        );
        if metrics.at_bottom() {
            return Ok(EngagementOutcome {
                iterations: iteration,
                reached_bottom: true,
            });
        }
    }

    Ok(EngagementOutcome {
        iterations: settings.max_scrolls,
        reached_bottom: false,
    })
}

async fn harvest(
    browser: &dyn BrowserSession,
    interceptor: &InterceptionScript,
) -> anyhow::Result<ArtifactBundle> {
    let buffer = browser
        .execute(HARVEST_SCRIPT, vec![json!(interceptor.buffer_key())])
        .await?;
    let performance = browser.read_log(LogKind::Performance).await?;
    let console = browser.read_log(LogKind::Browser).await?;

    let (requests, responses) = parse_network_events(&performance);
    let console_entries = parse_console_entries(&console);
    let buffered = parse_call_buffer(&buffer);
    if buffered.is_none() {
        debug!(target: "crawl.session", "in-page call buffer lost; using console mirror");
    }
    let js_calls = reconcile_calls(buffered, recover_calls_from_console(&console_entries));

    Ok(ArtifactBundle {
        requests,
        responses,
        console_entries,
        js_calls,
    })
}
