use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MiningError;

/// Tokens matched for one site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUsage {
    pub domains: BTreeSet<String>,
    pub functions: BTreeSet<String>,
}

impl SiteUsage {
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.functions.is_empty()
    }

    pub fn merge(&mut self, other: SiteUsage) {
        self.domains.extend(other.domains);
        self.functions.extend(other.functions);
    }
}

/// Site name to matched tokens, kept sorted for byte-stable output.
///
/// ```
/// use sitetrace_mining::{SiteUsage, UsageReport};
///
/// let mut report = UsageReport::default();
/// report.record("0001_https_quiet.io", SiteUsage::default());
/// assert!(report.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageReport {
    sites: BTreeMap<String, SiteUsage>,
}

impl UsageReport {
    /// Add a site's usage. Sites with no match in either dictionary are left
    /// out; otherwise both lists are kept, even if one is empty.
    pub fn record(&mut self, site: impl Into<String>, usage: SiteUsage) -> bool {
        if usage.is_empty() {
            return false;
        }
        self.sites.entry(site.into()).or_default().merge(usage);
        true
    }

    pub fn get(&self, site: &str) -> Option<&SiteUsage> {
        self.sites.get(site)
    }

    pub fn sites(&self) -> impl Iterator<Item = (&str, &SiteUsage)> {
        self.sites.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, MiningError> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

/// Write `report` to `path`, creating parent directories as needed.
pub fn write_report(report: &UsageReport, path: &Path) -> Result<(), MiningError> {
    let io_err = |source| MiningError::ReportIo {
        path: path.to_path_buf(),
        source,
    };

    let json = report.to_json()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut file = fs::File::create(path).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;

    info!(target: "mining.report", path = %path.display(), sites = report.len(), "report written");
    Ok(())
}
