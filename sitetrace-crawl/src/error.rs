use std::path::PathBuf;
use std::time::Duration;

/// Failure of one crawl session. Contained at the target boundary.
#[derive(thiserror::Error, Debug)]
pub enum CrawlSessionError {
    #[error("failed to provision browser: {0:#}")]
    Provision(anyhow::Error),

    #[error("failed to instrument page: {0:#}")]
    Instrument(anyhow::Error),

    #[error("navigation failed: {0:#}")]
    Navigate(anyhow::Error),

    #[error("scroll simulation failed: {0:#}")]
    Engage(anyhow::Error),

    #[error("harvest failed: {0:#}")]
    Harvest(anyhow::Error),

    #[error("session exceeded its {0:?} budget")]
    Timeout(Duration),

    #[error(transparent)]
    Seal(#[from] BundleError),
}

/// Writing an artifact bundle to disk failed; nothing is left under the
/// final bundle name.
#[derive(thiserror::Error, Debug)]
pub enum BundleError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {file}: {source}")]
    Encode {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl BundleError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TargetListError {
    #[error("cannot read target list {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid target URL {raw:?}: {source}")]
    InvalidUrl {
        raw: String,
        #[source]
        source: url::ParseError,
    },

    #[error("row has no URL in column {column}")]
    MissingUrl { column: usize },

    #[error("malformed CSV row: {0}")]
    Csv(#[from] csv::Error),
}
