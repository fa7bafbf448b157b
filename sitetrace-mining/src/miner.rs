use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::dictionary::PatternDictionary;
use crate::error::{ArtifactReadError, MiningError};
use crate::report::{SiteUsage, UsageReport};

/// Counts describing one mining pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MiningStats {
    pub sites_scanned: usize,
    pub sites_reported: usize,
    pub files_scanned: usize,
    pub files_skipped: usize,
}

#[derive(Debug, Default)]
pub struct MiningOutcome {
    pub report: UsageReport,
    pub stats: MiningStats,
    /// Every file or folder that could not be read, in site order.
    pub skipped: Vec<SkippedArtifact>,
}

/// An artifact left out of the report, with the site it belongs to.
#[derive(Debug)]
pub struct SkippedArtifact {
    pub site: String,
    pub error: ArtifactReadError,
}

/// Result of scanning one site folder.
#[derive(Debug, Default)]
pub struct SiteScan {
    pub usage: SiteUsage,
    pub files_scanned: usize,
    pub skipped: Vec<ArtifactReadError>,
}

#[derive(Clone)]
struct MinerInner {
    domains: PatternDictionary,
    functions: PatternDictionary,
    extension: String,
    concurrency: usize,
}

/// Applies both dictionaries to every site folder under an artifact root.
///
/// Cheap to clone; the compiled dictionaries are shared.
#[derive(Clone)]
pub struct LogMiner {
    inner: Arc<MinerInner>,
}

impl LogMiner {
    pub fn new(domains: PatternDictionary, functions: PatternDictionary) -> Self {
        Self {
            inner: Arc::new(MinerInner {
                domains,
                functions,
                extension: "log".into(),
                concurrency: 8,
            }),
        }
    }

    /// Scan files whose name ends in `.{extension}` (case-insensitive).
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.inner_mut().extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self
    }

    /// Number of site folders scanned at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.inner_mut().concurrency = concurrency.max(1);
        self
    }

    fn inner_mut(&mut self) -> &mut MinerInner {
        Arc::make_mut(&mut self.inner)
    }

    /// Scan every immediate subdirectory of `root` as one site.
    ///
    /// Hidden folders (staging directories of unfinished bundles) are
    /// ignored. Unreadable files are logged and skipped; only an unreadable
    /// `root` fails the run.
    pub async fn mine(&self, root: &Path) -> Result<MiningOutcome, MiningError> {
        let sites = list_sites(root)?;
        info!(
            target: "mining.miner",
            root = %root.display(),
            sites = sites.len(),
            domains = self.inner.domains.len(),
            functions = self.inner.functions.len(),
            "mining started"
        );

        let scans = stream::iter(sites)
            .map(|(name, dir)| {
                let miner = self.clone();
                tokio::task::spawn_blocking(move || {
                    let scan = miner.scan_site(&dir);
                    (name, scan)
                })
            })
            .buffer_unordered(self.inner.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut report = UsageReport::default();
        let mut stats = MiningStats::default();
        let mut skipped = Vec::new();
        for joined in scans {
            let (site, scan) = joined?;
            stats.sites_scanned += 1;
            stats.files_scanned += scan.files_scanned;
            stats.files_skipped += scan.skipped.len();
            for error in scan.skipped {
                warn!(target: "mining.miner", site = %site, error = %error, "skipped artifact");
                skipped.push(SkippedArtifact {
                    site: site.clone(),
                    error,
                });
            }
            if report.record(site, scan.usage) {
                stats.sites_reported += 1;
            }
        }
        // scans complete out of order
        skipped.sort_by(|a, b| a.site.cmp(&b.site));

        info!(
            target: "mining.miner",
            sites_scanned = stats.sites_scanned,
            sites_reported = stats.sites_reported,
            files_scanned = stats.files_scanned,
            files_skipped = stats.files_skipped,
            "mining finished"
        );
        Ok(MiningOutcome {
            report,
            stats,
            skipped,
        })
    }

    /// Scan the matching files directly inside `site_dir`, non-recursively.
    pub fn scan_site(&self, site_dir: &Path) -> SiteScan {
        let mut scan = SiteScan::default();
        let entries = match fs::read_dir(site_dir) {
            Ok(entries) => entries,
            Err(source) => {
                scan.skipped.push(ArtifactReadError::ListSite {
                    path: site_dir.to_path_buf(),
                    source,
                });
                return scan;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| self.has_log_extension(p))
            .collect();
        files.sort();

        for path in files {
            match self.scan_file(&path, &mut scan.usage) {
                Ok(()) => scan.files_scanned += 1,
                Err(e) => scan.skipped.push(e),
            }
        }
        scan
    }

    /// Match one file line by line. Bytes that are not valid UTF-8 are
    /// dropped from the line, so a token split by stray bytes still matches.
    pub fn scan_file(&self, path: &Path, usage: &mut SiteUsage) -> Result<(), ArtifactReadError> {
        let file = File::open(path).map_err(|source| ArtifactReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();

        // Collect into a local set so a mid-file failure contributes nothing.
        let mut found = SiteUsage::default();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| ArtifactReadError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
            if read == 0 {
                break;
            }
            let line = decode_dropping_invalid(&buf);
            found
                .domains
                .extend(self.inner.domains.matches(&line).map(str::to_string));
            found
                .functions
                .extend(self.inner.functions.matches(&line).map(str::to_string));
        }

        debug!(
            target: "mining.miner",
            path = %path.display(),
            domains = found.domains.len(),
            functions = found.functions.len(),
            "file scanned"
        );
        usage.merge(found);
        Ok(())
    }

    fn has_log_extension(&self, path: &Path) -> bool {
        let suffix = format!(".{}", self.inner.extension);
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.to_ascii_lowercase().ends_with(&suffix))
    }
}

fn decode_dropping_invalid(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()),
    }
}

fn list_sites(root: &Path) -> Result<Vec<(String, PathBuf)>, MiningError> {
    let entries = fs::read_dir(root).map_err(|source| MiningError::ArtifactRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let mut sites: Vec<(String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            (!name.starts_with('.')).then(|| (name, e.path()))
        })
        .collect();
    sites.sort();
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn miner() -> LogMiner {
        LogMiner::new(
            PatternDictionary::from_lines(["api.openai.com"]).unwrap(),
            PatternDictionary::from_lines(["fetch"]).unwrap(),
        )
    }

    #[test]
    fn only_matching_extension_is_scanned() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.LOG"), "fetch(x)\n").unwrap();
        fs::write(tmp.path().join("b.txt"), "api.openai.com\n").unwrap();
        let scan = miner().scan_site(tmp.path());
        assert_eq!(scan.files_scanned, 1);
        assert!(scan.usage.domains.is_empty());
        assert!(scan.usage.functions.contains("fetch"));
    }

    #[test]
    fn nested_folders_are_not_descended() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("deep")).unwrap();
        fs::write(tmp.path().join("deep/x.log"), "api.openai.com\n").unwrap();
        assert!(miner().scan_site(tmp.path()).usage.is_empty());
    }

    #[test]
    fn invalid_utf8_is_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        let mut bytes = b"\xff\xfe garbage ".to_vec();
        bytes.extend_from_slice(b"https://api.openai.com/v1\n\xc3\x28 fetch(");
        fs::write(tmp.path().join("raw.log"), bytes).unwrap();
        let scan = miner().scan_site(tmp.path());
        assert!(scan.skipped.is_empty());
        assert!(scan.usage.domains.contains("api.openai.com"));
        assert!(scan.usage.functions.contains("fetch"));
    }

    #[test]
    fn invalid_bytes_are_dropped_not_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("raw.log"), b"GET https://api.open\xffai.com/v1\n").unwrap();
        let scan = miner().scan_site(tmp.path());
        assert!(scan.usage.domains.contains("api.openai.com"));
        assert_eq!(decode_dropping_invalid(b"fe\xc3\x28tch"), "fe(tch");
        assert_eq!(decode_dropping_invalid("caf\u{e9}".as_bytes()), "caf\u{e9}");
    }

    #[test]
    fn custom_extension_accepts_leading_dot() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("requests.json"), "\"https://api.openai.com\"\n").unwrap();
        let scan = miner().with_extension(".json").scan_site(tmp.path());
        assert!(scan.usage.domains.contains("api.openai.com"));
    }
}
