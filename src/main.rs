//! `precip_catalog` command-line entry point.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use precip_catalog::catalog::{Catalog, CatalogFile};
use precip_catalog::config::PipelineConfig;
use precip_catalog::logging::{self, LogSettings};
use precip_catalog::pipeline;

#[derive(Debug, Parser)]
#[command(name = "precip_catalog", version, about = "Build the precipitation catalog and gauge registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load the table, rebuild the catalog, and write the gauge registry.
    Sync(SyncArgs),
    /// List the pathnames stored in a catalog.
    Inspect {
        #[arg(long)]
        catalog: PathBuf,
    },
}

#[derive(Debug, Args)]
struct SyncArgs {
    /// Pipeline configuration file.
    #[arg(long, default_value = "config/pipeline.toml")]
    config: PathBuf,
    /// Input CSV file or directory of CSV blocks.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Catalog file to rebuild.
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Gauge registry output file.
    #[arg(long)]
    registry: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync(args) => run_sync(args),
        Commands::Inspect { catalog } => {
            let _guard = logging::init_logger(&LogSettings::default());
            run_inspect(&catalog)
        }
    }
}

fn run_sync(args: SyncArgs) -> Result<()> {
    let mut config = PipelineConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(p) = args.input {
        config.input.path = p;
    }
    if let Some(p) = args.catalog {
        config.catalog.path = p;
    }
    if let Some(p) = args.registry {
        config.registry.path = p;
    }

    let _guard = logging::init_logger(&config.logging);

    let summary = pipeline::run(&config).context("precipitation catalog run failed")?;

    println!(
        "{} rows, {} subbasins: {} written, {} failed, {} skipped",
        summary.rows_loaded, summary.subbasins, summary.written, summary.failed, summary.skipped
    );
    for failure in &summary.failures {
        println!("  ✗ {} ({}): {}", failure.subbasin_id, failure.pathname, failure.error);
    }
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let catalog = CatalogFile::open(path)
        .with_context(|| format!("opening catalog {}", path.display()))?;

    let pathnames = catalog.pathnames()?;
    for pathname in &pathnames {
        let record = catalog.read_series(pathname)?;
        println!(
            "{}  {} values  {}  {}",
            pathname, record.value_count, record.start_timestamp, record.accumulation_type
        );
    }
    println!("{} records", pathnames.len());
    catalog.close()?;
    Ok(())
}
