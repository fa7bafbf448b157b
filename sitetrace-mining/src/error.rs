use std::path::PathBuf;

use thiserror::Error;

/// A dictionary entry could not be turned into a literal matcher.
#[derive(Debug, Error)]
pub enum DictionaryCompileError {
    #[error("entry on line {line} contains a control character: {entry:?}")]
    ControlCharacter { line: usize, entry: String },

    #[error("failed to compile dictionary matcher: {0}")]
    Regex(#[from] regex::Error),

    #[error("failed to read dictionary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One artifact file that was skipped during a scan.
#[derive(Debug, Error)]
pub enum ArtifactReadError {
    #[error("could not open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not list site folder {path}: {source}")]
    ListSite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures that abort the whole mining run.
#[derive(Debug, Error)]
pub enum MiningError {
    #[error(transparent)]
    Dictionary(#[from] DictionaryCompileError),

    #[error("artifact root {path} is not readable: {source}")]
    ArtifactRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("failed to write report {path}: {source}")]
    ReportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode report: {0}")]
    ReportEncode(#[from] serde_json::Error),
}
