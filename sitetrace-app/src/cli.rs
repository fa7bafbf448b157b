use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sitetrace_common::StealthLevel;
use sitetrace_common::observability::LogFormat;

/// Crawl sites with an instrumented browser and report which external APIs
/// they call.
#[derive(Debug, Parser)]
#[command(name = "sitetrace", version)]
pub struct Cli {
    /// Configuration file (default: ./sitetrace.yaml and the user config dir)
    #[arg(short, long, global = true, env = "SITETRACE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log line format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Mirror log events to stderr
    #[arg(long, global = true)]
    pub log_stderr: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl every target and seal one artifact bundle per site
    Crawl(CrawlArgs),
    /// Scan artifact folders against domain and function dictionaries
    Mine(MineArgs),
    /// Crawl, then mine the fresh artifact root
    Run(RunArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct CrawlArgs {
    /// Target list: one URL per line, or a .csv file
    pub targets: PathBuf,

    /// Root directory for artifact bundles
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// WebDriver endpoint, e.g. http://localhost:9515
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Browser instances allowed at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Upper bound on scroll steps per page
    #[arg(long)]
    pub max_scrolls: Option<u32>,

    /// lightweight, balanced or maximum
    #[arg(long)]
    pub stealth: Option<StealthLevel>,

    /// Per-session budget in seconds (0 disables it)
    #[arg(long)]
    pub session_timeout: Option<u64>,

    /// Column of the URL in a .csv target list
    #[arg(long)]
    pub url_column: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct MineArgs {
    /// Domain dictionary, one literal per line
    pub domains: PathBuf,

    /// Function dictionary, one literal per line
    pub functions: PathBuf,

    /// Directory holding one folder per site
    pub root: PathBuf,

    /// Report destination
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Extension of the files scanned in each site folder
    #[arg(long)]
    pub extension: Option<String>,

    /// Site folders scanned at once
    #[arg(long)]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub crawl: CrawlArgs,

    /// Domain dictionary, one literal per line
    pub domains: PathBuf,

    /// Function dictionary, one literal per line
    pub functions: PathBuf,

    /// Report destination
    #[arg(short = 'o', long = "report")]
    pub report: Option<PathBuf>,
}
