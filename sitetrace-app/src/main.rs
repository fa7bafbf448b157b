use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sitetrace_common::observability::{LogConfig, init_logging};
use sitetrace_config::{DEFAULT_CONFIG_FILE, SitetraceConfig, SitetraceConfigLoader, user_config_path};
use sitetrace_runtime::SitetraceRuntime;
use tracing::info;

use cli::{Cli, Command};

mod cli;
mod pipeline;

fn load_config(cli: &Cli) -> Result<SitetraceConfig> {
    let mut loader = SitetraceConfigLoader::new();
    match &cli.config {
        Some(path) => loader = loader.with_file(path),
        None => {
            // working-directory file wins over the per-user one
            if let Some(user) = user_config_path() {
                loader = loader.with_optional_file(user);
            }
            loader = loader.with_optional_file(DEFAULT_CONFIG_FILE);
        }
    }
    loader.load().context("failed to load configuration")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    let log_file = init_logging(LogConfig {
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr || cli.log_stderr,
        format: cli.log_format.map(Into::into).unwrap_or(cfg.logging.format),
        ..LogConfig::default()
    })?;
    info!(target: "app", log_file = %log_file.display(), "sitetrace starting");

    let runtime = SitetraceRuntime::build("sitetrace", None)?;
    runtime.cancel_on_ctrl_c();
    let cancel = runtime.cancellation();

    let result = runtime.block_on(async {
        match &cli.command {
            Command::Crawl(args) => pipeline::crawl(cfg, args, cancel).await.map(|_| ()),
            Command::Mine(args) => pipeline::mine(&cfg, args).await.map(|_| ()),
            Command::Run(args) => pipeline::run(cfg, args, cancel).await,
        }
    });

    runtime.shutdown(Duration::from_secs(5));
    result
}
