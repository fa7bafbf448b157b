//! Instrumented crawl of arbitrary sites.
//!
//! A [`Target`] is crawled by exactly one [`CrawlSession`], which drives an
//! isolated browser through provision, instrument, navigate, engage, dwell and
//! harvest phases and seals the result as an [`ArtifactBundle`] on disk. The
//! [`CrawlOrchestrator`] runs sessions over a target list and contains every
//! per-target failure.
pub mod bundle;
pub mod capture;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod target;

pub use bundle::{ArtifactBundle, SealedBundle};
pub use error::{BundleError, CrawlSessionError, TargetListError};
pub use orchestrator::{CrawlOrchestrator, CrawlSummary, TargetOutcome};
pub use session::{CrawlSession, SessionContext, SessionSettings};
pub use target::{SkippedEntry, Target, TargetList};
