mod assembler;
mod config;
mod crawler;
mod extract;
mod loader;
mod models;
mod output;
mod pipeline;
mod session;
mod utils;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;
use crate::loader::{parse_symbol_args, read_symbol_file};
use crate::models::SymbolOutcome;
use crate::pipeline::{BatchReport, Pipeline};
use crate::session::ChromeLauncher;

#[derive(Parser)]
#[command(
    name = "etf-holdings",
    about = "Download the full holdings table of one or more ETFs",
    version
)]
#[command(group(ArgGroup::new("input").required(true).args(["symbol", "file"])))]
struct Cli {
    /// ETF symbol to download (repeatable)
    #[arg(short, long, action = clap::ArgAction::Append)]
    symbol: Vec<String>,

    /// File with one ETF symbol per line
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Process symbols in alphabetical order
    #[arg(short, long)]
    alpha: bool,

    /// Also write a log of name, last price and holdings count per ETF
    #[arg(short, long)]
    log: bool,

    /// Show the browser window
    #[arg(short, long)]
    display: bool,

    /// Max seconds to wait for a holdings page to load
    #[arg(short, long, value_name = "SECS")]
    time: Option<u64>,

    /// Directory for the generated files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "etf_holdings=info,warn",
        (false, 1) => "etf_holdings=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;
    if let Some(secs) = cli.time {
        config.crawler.max_load_wait_secs = secs;
    }
    if cli.display {
        config.crawler.headless = false;
    }
    if let Some(dir) = cli.output_dir {
        config.output.dir = dir;
    }

    let mut symbols = match &cli.file {
        Some(path) => {
            info!("Reading symbols from {:?}", path);
            read_symbol_file(path)?
        }
        None => parse_symbol_args(&cli.symbol),
    };
    if cli.alpha {
        symbols.sort();
    }
    if symbols.is_empty() {
        warn!("No symbols to process");
        return Ok(());
    }

    let mut report = {
        let _t = utils::Timer::start(format!("Holdings download for {} symbol(s)", symbols.len()));
        let launcher = ChromeLauncher::new(&config.crawler);
        let pipeline = Pipeline::new(&config, Box::new(launcher), cli.log)?;
        pipeline.run(&symbols).await
    };

    let files = write_files(&report, &config.output.dir, cli.log.then_some(config.output.log_file.as_str()));

    if !cli.quiet {
        print_summary(&report, &files);
    }

    match report.aborted.take() {
        Some(e) => Err(anyhow::Error::new(e).context("Batch aborted")),
        None => Ok(()),
    }
}

/// Write every holdings file plus the optional log. A failed write is
/// reported and skipped.
fn write_files(report: &BatchReport, dir: &Path, log_file: Option<&str>) -> Vec<PathBuf> {
    let mut files = Vec::with_capacity(report.results.len() + 1);

    for result in &report.results {
        match output::write_holdings(dir, result) {
            Ok(path) => files.push(path),
            Err(e) => warn!("{:#}", e),
        }
    }

    if let Some(name) = log_file {
        if report.log_entries.is_empty() {
            info!("No ETF downloaded; {} not written", name);
        } else {
            match output::write_log(dir, name, &report.log_entries) {
                Ok(path) => files.push(path),
                Err(e) => warn!("{:#}", e),
            }
        }
    }
    files
}

fn print_summary(report: &BatchReport, files: &[PathBuf]) {
    println!("─────────────────────────────────");
    for SymbolOutcome { symbol, success, rows, reason } in &report.outcomes {
        if *success {
            println!("  {:<8} {:>7} holdings", symbol, utils::fmt_count(*rows));
        } else {
            println!("  {:<8} failed: {}", symbol, reason.as_deref().unwrap_or("unknown error"));
        }
    }
    if let Some(e) = &report.aborted {
        println!("  batch stopped early: {}", e);
    }
    println!("─────────────────────────────────");
    println!(
        "{} file(s) have been generated for {} ETF(s):",
        files.len(),
        report.succeeded()
    );
    for file in files {
        let name = file.file_name().map(Path::new).unwrap_or(file);
        println!("  {}", name.display());
    }
}
