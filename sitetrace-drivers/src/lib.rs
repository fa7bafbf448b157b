//! Driver layer for instrumented browser crawls.
//!
//! This crate wraps a WebDriver endpoint (Chromedriver) with the pieces a
//! stealth crawl needs: evasion arguments and scripts, a fingerprint pool,
//! human-like timing, the in-page call interceptor, and access to the
//! browser's performance and console logs.
//!
//! - [`browser::driver::StealthDriver`]: WebDriver client wrapper
//! - [`browser::BrowserSession`] / [`browser::BrowserLauncher`]: the seam crawl sessions drive
//! - [`browser::behavioral::BehavioralEngine`]: human-like delays and scroll deltas
//! - [`browser::stealth`]: Chrome arguments and JS evasions per [`StealthLevel`]
//! - [`browser::intercept`]: observer script for network-issuing entry points
//!
//! [`StealthLevel`]: sitetrace_common::StealthLevel
pub mod browser;
