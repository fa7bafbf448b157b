//! Common types and utilities shared across sitetrace crates.
//!
//! This crate holds the handful of enums every layer agrees on, the
//! observability bootstrap, and the error their parsers return. It stays
//! dependency-light so the driver, crawl and mining crates can all lean on it.
//!
//! # Overview
//!
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`StealthLevel`]: how aggressively the browser hides automation signals
//! - [`SitetraceError`] and [`Result`]: errors from parsing the shared enums
//!
//! # Examples
//!
//! ```rust
//! use sitetrace_common::StealthLevel;
//!
//! let level: StealthLevel = "balanced".parse().unwrap();
//! assert_eq!(level, StealthLevel::Balanced);
//! assert_eq!(StealthLevel::default(), StealthLevel::Maximum);
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod observability;

/// Browser automation stealth level.
///
/// Each level is a superset of the one before it: `Lightweight` only hides
/// the webdriver flag and fakes plugins/languages, `Balanced` adds canvas
/// noise, `Maximum` also patches WebGL vendor strings and `navigator.platform`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    Balanced,
    #[default]
    Maximum,
}

impl FromStr for StealthLevel {
    type Err = SitetraceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lightweight" | "light" => Ok(Self::Lightweight),
            "balanced" => Ok(Self::Balanced),
            "maximum" | "max" => Ok(Self::Maximum),
            other => Err(SitetraceError::Config(format!(
                "unknown stealth level: {other}"
            ))),
        }
    }
}

impl fmt::Display for StealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lightweight => "lightweight",
            Self::Balanced => "balanced",
            Self::Maximum => "maximum",
        };
        f.write_str(name)
    }
}

/// Errors raised by the shared types themselves. Each crate with real I/O
/// carries its own error enum.
#[derive(thiserror::Error, Debug)]
pub enum SitetraceError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient alias for results that use [`SitetraceError`].
pub type Result<T> = std::result::Result<T, SitetraceError>;
