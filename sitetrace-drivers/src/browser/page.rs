use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::json;

use super::BrowserSession;

/// Scrolls the window by `arguments[0]` pixels.
pub const SCROLL_BY_SCRIPT: &str = "window.scrollBy(0, arguments[0]);";

/// Bottom edge of the viewport and the document's scrollable height.
pub const MEASURE_SCRIPT: &str = r#"
    const body = document.body;
    const total = Math.max(
        body ? body.scrollHeight : 0,
        document.documentElement ? document.documentElement.scrollHeight : 0
    );
    return { position: window.pageYOffset + window.innerHeight, total_height: total };
"#;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScrollMetrics {
    pub position: f64,
    pub total_height: f64,
}

impl ScrollMetrics {
    pub fn at_bottom(&self) -> bool {
        self.position >= self.total_height
    }
}

pub async fn scroll_by(browser: &dyn BrowserSession, delta: i64) -> Result<()> {
    browser.execute(SCROLL_BY_SCRIPT, vec![json!(delta)]).await?;
    Ok(())
}

pub async fn measure(browser: &dyn BrowserSession) -> Result<ScrollMetrics> {
    let raw = browser.execute(MEASURE_SCRIPT, vec![]).await?;
    serde_json::from_value(raw.clone())
        .map_err(|e| anyhow!("unexpected scroll metrics {raw}: {e}"))
}
