//! Wires configuration, CLI overrides and the crawl/mine libraries together.
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sitetrace_config::{CrawlSettings, SitetraceConfig};
use sitetrace_crawl::target::load_targets;
use sitetrace_crawl::{CrawlOrchestrator, CrawlSummary, SessionSettings, TargetList, TargetOutcome};
use sitetrace_drivers::browser::driver::{DriverSettings, WebDriverLauncher};
use sitetrace_mining::{MiningOutcome, MiningRequest, mine_to_report};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{CrawlArgs, MineArgs, RunArgs};

/// Sealed bundles are JSON documents; `run` mines them directly.
const BUNDLE_EXTENSION: &str = "json";

pub fn apply_crawl_overrides(settings: &mut CrawlSettings, args: &CrawlArgs) {
    if let Some(dir) = &args.output_dir {
        settings.output_dir = dir.clone();
    }
    if args.headless {
        settings.headless = true;
    }
    if let Some(url) = &args.webdriver_url {
        settings.webdriver_url = url.clone();
    }
    if let Some(n) = args.concurrency {
        settings.concurrency = n;
    }
    if let Some(n) = args.max_scrolls {
        settings.max_scrolls = n;
    }
    if let Some(level) = args.stealth {
        settings.stealth = level;
    }
    if let Some(secs) = args.session_timeout {
        settings.session_timeout_secs = secs;
    }
    if let Some(col) = args.url_column {
        settings.url_column = col;
    }
}

pub fn mining_request(cfg: &SitetraceConfig, args: &MineArgs) -> MiningRequest {
    MiningRequest {
        domains: args.domains.clone(),
        functions: args.functions.clone(),
        root: args.root.clone(),
        output: args.output.clone().unwrap_or_else(|| cfg.mining.output.clone()),
        extension: args
            .extension
            .clone()
            .unwrap_or_else(|| cfg.mining.log_extension.clone()),
        concurrency: args.concurrency.unwrap_or(cfg.mining.concurrency),
    }
}

pub async fn crawl(
    mut cfg: SitetraceConfig,
    args: &CrawlArgs,
    cancel: CancellationToken,
) -> Result<CrawlSummary> {
    apply_crawl_overrides(&mut cfg.crawl, args);
    let settings = &cfg.crawl;

    let list = load_targets(&args.targets, settings.url_column)
        .with_context(|| format!("loading targets from {}", args.targets.display()))?;
    print_skipped_targets(&list);
    if list.targets.is_empty() {
        warn!(target: "app", path = %args.targets.display(), "no valid targets");
    }

    let launcher = Arc::new(WebDriverLauncher::new(DriverSettings {
        webdriver_url: settings.webdriver_url.clone(),
        headless: settings.headless,
    }));
    let summary = CrawlOrchestrator::new(launcher, SessionSettings::from(settings))
        .with_concurrency(settings.concurrency)
        .with_cancellation(cancel)
        .crawl(&list.targets)
        .await;

    print_crawl_summary(&summary, &settings.output_dir);
    Ok(summary)
}

pub async fn mine(cfg: &SitetraceConfig, args: &MineArgs) -> Result<MiningOutcome> {
    let request = mining_request(cfg, args);
    let outcome = mine_to_report(&request).await?;
    print_mining_summary(&outcome, &request.output);
    Ok(outcome)
}

/// Crawl, then mine the artifact root that crawl wrote to.
pub async fn run(cfg: SitetraceConfig, args: &RunArgs, cancel: CancellationToken) -> Result<()> {
    let mut crawl_settings = cfg.crawl.clone();
    apply_crawl_overrides(&mut crawl_settings, &args.crawl);
    let root = crawl_settings.output_dir.clone();

    crawl(cfg.clone(), &args.crawl, cancel.clone()).await?;
    if cancel.is_cancelled() {
        info!(target: "app", "crawl interrupted; skipping mining");
        return Ok(());
    }

    let mine_args = MineArgs {
        domains: args.domains.clone(),
        functions: args.functions.clone(),
        root,
        output: args.report.clone(),
        extension: Some(BUNDLE_EXTENSION.into()),
        concurrency: None,
    };
    mine(&cfg, &mine_args).await?;
    Ok(())
}

fn print_skipped_targets(list: &TargetList) {
    for entry in skipped_target_lines(list) {
        eprintln!("{entry}");
    }
}

fn skipped_target_lines(list: &TargetList) -> Vec<String> {
    list.skipped
        .iter()
        .map(|s| format!("warning: target [{:04}] skipped: {}", s.index, s.error))
        .collect()
}

fn print_crawl_summary(summary: &CrawlSummary, root: &Path) {
    for outcome in &summary.outcomes {
        if let TargetOutcome::Failed { index, url, error } = outcome {
            eprintln!("warning: [{index:04}] {url}: {error}");
        }
    }
    println!(
        "crawl: {} crawled, {} failed, {} skipped -> {}",
        summary.sealed(),
        summary.failed(),
        summary.skipped(),
        root.display()
    );
}

fn skipped_artifact_lines(outcome: &MiningOutcome) -> Vec<String> {
    outcome
        .skipped
        .iter()
        .map(|s| format!("warning: {}: skipped {}", s.site, s.error))
        .collect()
}

fn print_mining_summary(outcome: &MiningOutcome, output: &Path) {
    let stats = &outcome.stats;
    for line in skipped_artifact_lines(outcome) {
        eprintln!("{line}");
    }
    println!(
        "mine: {} site(s) reported of {} scanned ({} files) -> {}",
        stats.sites_reported,
        stats.sites_scanned,
        stats.files_scanned,
        output.display()
    );
}
