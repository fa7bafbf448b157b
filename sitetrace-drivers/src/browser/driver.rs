use crate::browser::{
    commands::{CdpExecute, GetLog},
    fingerprint::UserAgentProfile,
    stealth::build_stealth_arguments,
    BrowserLauncher, BrowserSession, LogKind, RawLogEntry,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Value};
use sitetrace_common::StealthLevel;
use tracing::debug;
use webdriver::capabilities::Capabilities;

/// Where and how browser instances are started.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Chromedriver endpoint, e.g. `http://localhost:9515`.
    pub webdriver_url: String,
    pub headless: bool,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
        }
    }
}

/// Build the capability set: stealth arguments plus performance and
/// console logging.
pub fn build_capabilities(
    settings: &DriverSettings,
    profile: &UserAgentProfile,
    stealth: StealthLevel,
) -> Capabilities {
    let mut args = build_stealth_arguments(stealth, profile);
    if settings.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }

    let mut caps = Capabilities::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "excludeSwitches": ["enable-automation"],
        }),
    );
    caps.insert(
        "goog:loggingPrefs".to_string(),
        json!({ "performance": "ALL", "browser": "ALL" }),
    );
    caps
}

/// Thin wrapper around one `fantoccini` WebDriver session.
pub struct StealthDriver {
    client: Client,
}

impl StealthDriver {
    /// Open a new, isolated browser session on the configured endpoint.
    pub async fn connect(
        settings: &DriverSettings,
        profile: &UserAgentProfile,
        stealth: StealthLevel,
    ) -> Result<Self> {
        let caps = build_capabilities(settings, profile, stealth);
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&settings.webdriver_url)
            .await
            .with_context(|| format!("failed to open session on {}", settings.webdriver_url))?;

        debug!(
            target: "browser.driver",
            user_agent = %profile.user_agent,
            width = profile.viewport.0,
            height = profile.viewport.1,
            %stealth,
            "browser session opened"
        );
        Ok(Self { client })
    }
}

#[async_trait]
impl BrowserSession for StealthDriver {
    async fn add_init_script(&self, source: &str) -> Result<()> {
        self.client
            .issue_cmd(CdpExecute::add_script_on_new_document(source))
            .await
            .context("Page.addScriptToEvaluateOnNewDocument failed")?;
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.client
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        Ok(self.client.execute(script, args).await?)
    }

    async fn read_log(&self, kind: LogKind) -> Result<Vec<RawLogEntry>> {
        let raw = self
            .client
            .issue_cmd(GetLog { kind })
            .await
            .with_context(|| format!("reading {} log failed", kind.as_str()))?;
        if raw.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(raw)
            .with_context(|| format!("malformed {} log payload", kind.as_str()))
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().close().await?;
        Ok(())
    }
}

/// Starts one [`StealthDriver`] per crawl session.
#[derive(Debug, Clone, Default)]
pub struct WebDriverLauncher {
    settings: DriverSettings,
}

impl WebDriverLauncher {
    pub fn new(settings: DriverSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(
        &self,
        profile: &UserAgentProfile,
        stealth: StealthLevel,
    ) -> Result<Box<dyn BrowserSession>> {
        let driver = StealthDriver::connect(&self.settings, profile, stealth).await?;
        Ok(Box::new(driver))
    }
}
