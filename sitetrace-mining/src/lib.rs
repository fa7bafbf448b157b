//! Classify captured site traffic against known API domains and client
//! functions.
//!
//! Two [`PatternDictionary`] values are compiled from word lists, a
//! [`LogMiner`] applies them to every site folder of an artifact root, and the
//! resulting [`UsageReport`] is written as a single JSON document.
use std::path::PathBuf;

use tracing::warn;

pub mod dictionary;
pub mod error;
pub mod miner;
pub mod report;

pub use dictionary::PatternDictionary;
pub use error::{ArtifactReadError, DictionaryCompileError, MiningError};
pub use miner::{LogMiner, MiningOutcome, MiningStats, SiteScan, SkippedArtifact};
pub use report::{SiteUsage, UsageReport, write_report};

/// Everything a full mining pass needs.
#[derive(Debug, Clone)]
pub struct MiningRequest {
    pub domains: PathBuf,
    pub functions: PathBuf,
    pub root: PathBuf,
    pub output: PathBuf,
    pub extension: String,
    pub concurrency: usize,
}

/// Compile both dictionaries, mine `root` and write the report.
///
/// Dictionary problems abort before any file is scanned. When both
/// dictionaries are empty nothing can match, so the scan is skipped and an
/// empty report is written.
pub async fn mine_to_report(request: &MiningRequest) -> Result<MiningOutcome, MiningError> {
    let domains = PatternDictionary::load(&request.domains)?;
    let functions = PatternDictionary::load(&request.functions)?;

    if domains.is_empty() && functions.is_empty() {
        warn!(
            target: "mining",
            domains = %request.domains.display(),
            functions = %request.functions.display(),
            "both dictionaries are empty; writing an empty report"
        );
        let outcome = MiningOutcome::default();
        write_report(&outcome.report, &request.output)?;
        return Ok(outcome);
    }
    if domains.is_empty() {
        warn!(target: "mining", path = %request.domains.display(), "domain dictionary is empty");
    }
    if functions.is_empty() {
        warn!(target: "mining", path = %request.functions.display(), "function dictionary is empty");
    }

    let outcome = LogMiner::new(domains, functions)
        .with_extension(&request.extension)
        .with_concurrency(request.concurrency)
        .mine(&request.root)
        .await?;
    write_report(&outcome.report, &request.output)?;
    Ok(outcome)
}
