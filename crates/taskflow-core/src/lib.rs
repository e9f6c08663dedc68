pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod render;
pub mod seed;
pub mod session;
pub mod sort;
pub mod stats;
pub mod storage;
pub mod task;
pub mod tracker;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::info;

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;
    info!(verbose = cli.verbose, quiet = cli.quiet, "starting taskflow CLI");

    let cfg = config::Config::load(cli.config.as_deref())?;
    datetime::init_project_timezone(cfg.timezone.as_deref());
    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let store = session::DirStore::open(&data_dir)
        .with_context(|| format!("failed to open session store at {}", data_dir.display()))?;
    let mut tracker = tracker::Tracker::open(store, Utc::now());

    let renderer = render::Renderer::new(cfg.color_enabled());
    commands::dispatch(&mut tracker, &cfg, &renderer, cli.command)?;

    info!("done");
    Ok(())
}
