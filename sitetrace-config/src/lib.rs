//! Loader for sitetrace configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. built-in defaults (every field of [`SitetraceConfig`] has one),
//! 2. YAML files and inline snippets, in the order they were attached,
//! 3. `SITETRACE_`-prefixed environment variables, with `__` separating
//!    nesting levels (`SITETRACE_CRAWL__MAX_SCROLLS=20`).
//!
//! String values may reference other environment variables as `${VAR}`;
//! they are expanded after merging.
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitetrace_common::StealthLevel;
use sitetrace_common::observability::LogFormat;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// File name looked up in the working directory and the user config dir.
pub const DEFAULT_CONFIG_FILE: &str = "sitetrace.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SitetraceConfig {
    pub crawl: CrawlSettings,
    pub mining: MiningSettings,
    pub logging: LoggingSettings,
}

/// Inclusive `[min, max]` bound used for every randomised quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSetting {
    pub min: u64,
    pub max: u64,
}

impl RangeSetting {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Swap the bounds if they were written the wrong way round.
    pub fn normalized(self) -> Self {
        if self.min <= self.max {
            self
        } else {
            Self::new(self.max, self.min)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthLevel,
    /// Root under which one artifact bundle directory per target is sealed.
    pub output_dir: PathBuf,
    pub max_scrolls: u32,
    pub scroll_delta_px: RangeSetting,
    pub scroll_pause_ms: RangeSetting,
    pub settle_ms: RangeSetting,
    pub dwell_ms: RangeSetting,
    pub session_timeout_secs: u64,
    /// Number of browser instances allowed at once.
    pub concurrency: usize,
    /// Zero-based column holding the URL when the target list is a `.csv`
    /// file.
    pub url_column: usize,
    /// Page entry points wrapped by the interception script.
    pub intercepted_functions: Vec<String>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: false,
            stealth: StealthLevel::Maximum,
            output_dir: PathBuf::from("logs_selenium_stealth"),
            max_scrolls: 100,
            scroll_delta_px: RangeSetting::new(200, 800),
            scroll_pause_ms: RangeSetting::new(500, 1500),
            settle_ms: RangeSetting::new(1000, 3000),
            dwell_ms: RangeSetting::new(5000, 10000),
            session_timeout_secs: 180,
            concurrency: 1,
            url_column: 1,
            intercepted_functions: vec![
                "fetch".into(),
                "XMLHttpRequest.open".into(),
                "XMLHttpRequest.send".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    /// Extension (without the dot) of the files scanned in each site folder.
    pub log_extension: String,
    pub output: PathBuf,
    /// Number of site folders scanned at once.
    pub concurrency: usize,
}

impl Default for MiningSettings {
    fn default() -> Self {
        Self {
            log_extension: "log".into(),
            output: PathBuf::from("site_domain_usage.json"),
            concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub stderr: bool,
    pub dir: Option<PathBuf>,
}

/// Location of the per-user config file, e.g. `~/.config/sitetrace/sitetrace.yaml`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sitetrace").join(DEFAULT_CONFIG_FILE))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct SitetraceConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for SitetraceConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SitetraceConfigLoader {
    /// Start from defaults; `SITETRACE_` env overrides are applied on [`load`](Self::load).
    ///
    /// ```
    /// use sitetrace_config::SitetraceConfigLoader;
    ///
    /// let config = SitetraceConfigLoader::new()
    ///     .with_yaml_str("crawl:\n  max_scrolls: 7")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.crawl.max_scrolls, 7);
    /// assert_eq!(config.mining.log_extension, "log");
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: "SITETRACE".into(),
        }
    }

    /// Use a different environment prefix (tests use this to stay isolated).
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is silently skipped when missing.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use sitetrace_common::StealthLevel;
    /// use sitetrace_config::SitetraceConfigLoader;
    ///
    /// let cfg = SitetraceConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// crawl:
    ///   stealth: lightweight
    ///   dwell_ms: { min: 0, max: 10 }
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.crawl.stealth, StealthLevel::Lightweight);
    /// assert_eq!(cfg.crawl.dwell_ms.max, 10);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    pub fn load(self) -> Result<SitetraceConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
