//! Browser capability consumed by crawl sessions.
//!
//! [`BrowserSession`] is the narrow surface a crawl needs from a live browser:
//! install init scripts, navigate, run scripts, and read back the browser's
//! own logs. [`driver::StealthDriver`] implements it over WebDriver; tests
//! implement it in memory.
pub mod behavioral;
pub mod commands;
pub mod driver;
pub mod fingerprint;
pub mod intercept;
pub mod page;
pub mod stealth;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitetrace_common::StealthLevel;

use crate::browser::fingerprint::UserAgentProfile;

/// Log buffers exposed by Chromedriver through `goog:loggingPrefs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// DevTools events (`Network.*`, `Page.*`) serialized as JSON strings.
    Performance,
    /// Page console output.
    Browser,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Performance => "performance",
            LogKind::Browser => "browser",
        }
    }
}

/// One entry as returned by the WebDriver log endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLogEntry {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// A live browser instance owned by exactly one crawl session.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Register `source` to run in every new document before page scripts.
    async fn add_init_script(&self, source: &str) -> Result<()>;

    async fn goto(&self, url: &str) -> Result<()>;

    /// Execute a synchronous script; `arguments[n]` maps to `args[n]`.
    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value>;

    /// Drain the given log buffer. Entries are returned once.
    async fn read_log(&self, kind: LogKind) -> Result<Vec<RawLogEntry>>;

    /// Release the browser. Safe to call once per session.
    async fn close(&self) -> Result<()>;
}

/// Opens fresh, isolated browser instances.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Start a browser presenting `profile`, hardened to the `stealth` level.
    async fn launch(
        &self,
        profile: &UserAgentProfile,
        stealth: StealthLevel,
    ) -> Result<Box<dyn BrowserSession>>;
}
