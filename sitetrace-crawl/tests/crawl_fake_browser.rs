use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sitetrace_common::StealthLevel;
use sitetrace_config::RangeSetting;
use sitetrace_crawl::bundle::{ArtifactBundle, JS_CALLS_FILE};
use sitetrace_crawl::session::simulate_engagement;
use sitetrace_crawl::{
    CrawlOrchestrator, CrawlSession, CrawlSessionError, SessionContext, SessionSettings, Target,
    TargetOutcome,
};
use sitetrace_drivers::browser::behavioral::BehavioralEngine;
use sitetrace_drivers::browser::fingerprint::UserAgentProfile;
use sitetrace_drivers::browser::intercept::HARVEST_SCRIPT;
use sitetrace_drivers::browser::page::{MEASURE_SCRIPT, SCROLL_BY_SCRIPT};
use sitetrace_drivers::browser::{BrowserLauncher, BrowserSession, LogKind, RawLogEntry};
use tokio_util::sync::CancellationToken;

/// Scripted page behaviour shared by every browser a launcher hands out.
#[derive(Clone, Default)]
struct Script {
    /// Measurement on which the viewport reaches the bottom (1-based).
    bottom_after: Option<u32>,
    /// URLs whose navigation fails.
    failing_urls: Vec<String>,
    /// URLs whose navigation panics.
    panicking_urls: Vec<String>,
    /// Navigation stalls this long before succeeding.
    goto_delay: Option<Duration>,
    /// Launching stalls this long before handing out a browser.
    launch_delay: Option<Duration>,
    /// Closing stalls this long.
    close_delay: Option<Duration>,
    call_buffer: Value,
    console: Vec<RawLogEntry>,
    performance: Vec<RawLogEntry>,
}

#[derive(Default)]
struct Journal {
    events: Vec<String>,
    scrolls: u32,
    measures: u32,
    launched: u32,
    closed: u32,
}

struct FakeBrowser {
    script: Script,
    journal: Arc<Mutex<Journal>>,
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn add_init_script(&self, _source: &str) -> Result<()> {
        self.journal.lock().unwrap().events.push("init_script".into());
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.journal.lock().unwrap().events.push(format!("goto {url}"));
        if self.script.panicking_urls.iter().any(|u| u == url) {
            panic!("renderer crashed on {url}");
        }
        if let Some(delay) = self.script.goto_delay {
            tokio::time::sleep(delay).await;
        }
        if self.script.failing_urls.iter().any(|u| u == url) {
            return Err(anyhow!("net::ERR_NAME_NOT_RESOLVED"));
        }
        Ok(())
    }

    async fn execute(&self, script: &str, _args: Vec<Value>) -> Result<Value> {
        let mut journal = self.journal.lock().unwrap();
        if script == SCROLL_BY_SCRIPT {
            journal.scrolls += 1;
            Ok(Value::Null)
        } else if script == MEASURE_SCRIPT {
            journal.measures += 1;
            let at_bottom = self
                .script
                .bottom_after
                .is_some_and(|n| journal.measures >= n);
            let position = if at_bottom { 5000.0 } else { 800.0 };
            Ok(json!({ "position": position, "total_height": 5000.0 }))
        } else if script == HARVEST_SCRIPT {
            Ok(self.script.call_buffer.clone())
        } else {
            Err(anyhow!("unexpected script"))
        }
    }

    async fn read_log(&self, kind: LogKind) -> Result<Vec<RawLogEntry>> {
        Ok(match kind {
            LogKind::Performance => self.script.performance.clone(),
            LogKind::Browser => self.script.console.clone(),
        })
    }

    async fn close(&self) -> Result<()> {
        if let Some(delay) = self.script.close_delay {
            tokio::time::sleep(delay).await;
        }
        self.journal.lock().unwrap().closed += 1;
        Ok(())
    }
}

struct FakeLauncher {
    script: Script,
    journal: Arc<Mutex<Journal>>,
}

impl FakeLauncher {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            journal: Arc::default(),
        })
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(
        &self,
        _profile: &UserAgentProfile,
        _stealth: StealthLevel,
    ) -> Result<Box<dyn BrowserSession>> {
        if let Some(delay) = self.script.launch_delay {
            tokio::time::sleep(delay).await;
        }
        self.journal.lock().unwrap().launched += 1;
        Ok(Box::new(FakeBrowser {
            script: self.script.clone(),
            journal: self.journal.clone(),
        }))
    }
}

fn instant_settings(root: &std::path::Path) -> SessionSettings {
    SessionSettings {
        stealth: StealthLevel::Maximum,
        output_root: root.to_path_buf(),
        max_scrolls: 100,
        scroll_delta_px: RangeSetting::new(200, 800),
        scroll_pause_ms: RangeSetting::new(0, 0),
        settle_ms: RangeSetting::new(0, 0),
        dwell_ms: RangeSetting::new(0, 0),
        timeout: None,
        release_timeout: Duration::from_secs(5),
        intercepted_functions: vec!["fetch".into(), "XMLHttpRequest.open".into()],
    }
}

fn desktop_profile() -> UserAgentProfile {
    UserAgentProfile {
        user_agent: "UA".into(),
        viewport: (1200, 700),
        platform: "Win32".into(),
        languages: vec!["en-US".into()],
    }
}

fn perf_request(url: &str) -> RawLogEntry {
    RawLogEntry {
        level: "INFO".into(),
        message: json!({ "message": {
            "method": "Network.requestWillBeSent",
            "params": { "request": { "url": url, "method": "GET", "headers": {} } }
        }})
        .to_string(),
        timestamp: 1,
    }
}

#[tokio::test]
async fn scrolling_stops_once_bottom_is_reached() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(Script {
        bottom_after: Some(7),
        ..Script::default()
    });
    let browser = launcher
        .launch(&desktop_profile(), StealthLevel::Maximum)
        .await
        .unwrap();

    let outcome = simulate_engagement(
        browser.as_ref(),
        &BehavioralEngine::new(),
        &instant_settings(tmp.path()),
    )
    .await
    .unwrap();

    assert_eq!(outcome.iterations, 7);
    assert!(outcome.reached_bottom);
    assert_eq!(launcher.journal.lock().unwrap().scrolls, 7);
}

#[tokio::test]
async fn scrolling_is_capped() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(Script::default());
    let browser = launcher
        .launch(&desktop_profile(), StealthLevel::Lightweight)
        .await
        .unwrap();
    let settings = SessionSettings {
        max_scrolls: 5,
        ..instant_settings(tmp.path())
    };

    let outcome = simulate_engagement(browser.as_ref(), &BehavioralEngine::new(), &settings)
        .await
        .unwrap();

    assert_eq!(outcome.iterations, 5);
    assert!(!outcome.reached_bottom);
}

#[tokio::test]
async fn successful_session_seals_bundle_and_releases_browser() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(Script {
        bottom_after: Some(2),
        call_buffer: json!([{ "fn": "fetch", "args": ["https://api.openai.com/v1/models"] }]),
        performance: vec![perf_request("https://api.openai.com/v1/models")],
        console: vec![RawLogEntry {
            level: "WARNING".into(),
            message: "deprecated API".into(),
            timestamp: 2,
        }],
        ..Script::default()
    });
    let ctx = SessionContext::new(launcher.clone(), instant_settings(tmp.path()));
    let target = Target::new(1, "example.com").unwrap();

    let sealed = CrawlSession::new(&target, &ctx).run().await.unwrap();

    assert_eq!(sealed.dir, tmp.path().join("0001_https_example.com"));
    let bundle = ArtifactBundle::read_from(&sealed.dir).unwrap();
    assert_eq!(bundle.requests[0].url, "https://api.openai.com/v1/models");
    assert_eq!(bundle.console_entries[0].level, "WARNING");
    assert_eq!(bundle.js_calls[0].function, "fetch");
    assert!(sealed.dir.join(JS_CALLS_FILE).is_file());

    let journal = launcher.journal.lock().unwrap();
    assert_eq!(journal.closed, 1);
    // both init scripts are installed before the first navigation
    assert_eq!(
        &journal.events[..3],
        ["init_script", "init_script", "goto https://example.com"]
    );
}

#[tokio::test]
async fn failed_navigation_leaves_no_bundle() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(Script {
        failing_urls: vec!["https://down.example".into()],
        ..Script::default()
    });
    let ctx = SessionContext::new(launcher.clone(), instant_settings(tmp.path()));
    let target = Target::new(4, "down.example").unwrap();

    let err = CrawlSession::new(&target, &ctx).run().await.unwrap_err();

    assert!(matches!(err, CrawlSessionError::Navigate(_)));
    assert_eq!(std::fs::read_dir(tmp.path()).map(|d| d.count()).unwrap_or(0), 0);
    assert_eq!(launcher.journal.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn hung_session_times_out_and_still_releases() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(Script {
        goto_delay: Some(Duration::from_secs(30)),
        ..Script::default()
    });
    let settings = SessionSettings {
        timeout: Some(Duration::from_millis(50)),
        ..instant_settings(tmp.path())
    };
    let ctx = SessionContext::new(launcher.clone(), settings);
    let target = Target::new(1, "slow.example").unwrap();

    let err = CrawlSession::new(&target, &ctx).run().await.unwrap_err();

    assert!(matches!(err, CrawlSessionError::Timeout(_)));
    assert!(!tmp.path().join(target.dir_name()).exists());
    assert_eq!(launcher.journal.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn hung_launch_counts_against_the_budget() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(Script {
        launch_delay: Some(Duration::from_secs(3600)),
        ..Script::default()
    });
    let settings = SessionSettings {
        timeout: Some(Duration::from_millis(100)),
        ..instant_settings(tmp.path())
    };
    let ctx = SessionContext::new(launcher.clone(), settings);
    let target = Target::new(1, "slow.example").unwrap();

    let started = std::time::Instant::now();
    let err = CrawlSession::new(&target, &ctx).run().await.unwrap_err();

    assert!(matches!(err, CrawlSessionError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(launcher.journal.lock().unwrap().launched, 0);
}

#[tokio::test]
async fn hung_close_is_abandoned_and_bundle_still_sealed() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(Script {
        bottom_after: Some(1),
        close_delay: Some(Duration::from_secs(3600)),
        ..Script::default()
    });
    let settings = SessionSettings {
        release_timeout: Duration::from_millis(100),
        ..instant_settings(tmp.path())
    };
    let ctx = SessionContext::new(launcher.clone(), settings);
    let target = Target::new(2, "sticky.example").unwrap();

    let sealed = CrawlSession::new(&target, &ctx).run().await.unwrap();

    assert_eq!(sealed.dir, tmp.path().join("0002_https_sticky.example"));
    assert_eq!(launcher.journal.lock().unwrap().closed, 0);
}

#[tokio::test]
async fn panicking_session_fails_only_its_target() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(Script {
        bottom_after: Some(1),
        panicking_urls: vec!["https://bad.example".into()],
        call_buffer: json!([]),
        ..Script::default()
    });
    let targets = vec![
        Target::new(1, "bad.example").unwrap(),
        Target::new(2, "good.example").unwrap(),
    ];

    let summary = CrawlOrchestrator::new(launcher.clone(), instant_settings(tmp.path()))
        .crawl(&targets)
        .await;

    match &summary.outcomes[0] {
        TargetOutcome::Failed { index, error, .. } => {
            assert_eq!(*index, 1);
            assert!(error.contains("renderer crashed"), "{error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(
        summary.outcomes[1],
        TargetOutcome::Sealed {
            index: 2,
            dir: tmp.path().join("0002_https_good.example"),
        }
    );
    assert!(!tmp.path().join("0001_https_bad.example").exists());
}

#[tokio::test]
async fn orchestrator_isolates_failures_and_keeps_order() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(Script {
        bottom_after: Some(1),
        failing_urls: vec!["https://b.example".into()],
        call_buffer: json!([]),
        ..Script::default()
    });
    let targets = vec![
        Target::new(1, "a.example").unwrap(),
        Target::new(2, "b.example").unwrap(),
        Target::new(3, "c.example").unwrap(),
    ];

    let summary = CrawlOrchestrator::new(launcher.clone(), instant_settings(tmp.path()))
        .with_concurrency(2)
        .crawl(&targets)
        .await;

    assert_eq!(summary.sealed(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(matches!(summary.outcomes[1], TargetOutcome::Failed { index: 2, .. }));
    assert!(tmp.path().join("0001_https_a.example").is_dir());
    assert!(!tmp.path().join("0002_https_b.example").exists());
    assert!(tmp.path().join("0003_https_c.example").is_dir());

    let journal = launcher.journal.lock().unwrap();
    assert_eq!(journal.launched, 3);
    assert_eq!(journal.closed, 3);
}

#[tokio::test]
async fn cancelled_crawl_starts_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(Script::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = CrawlOrchestrator::new(launcher.clone(), instant_settings(tmp.path()))
        .with_cancellation(cancel)
        .crawl(&[Target::new(1, "a.example").unwrap()])
        .await;

    assert_eq!(summary.skipped(), 1);
    assert_eq!(launcher.journal.lock().unwrap().launched, 0);
}
