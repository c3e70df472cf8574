//! genofetch CLI - checkpointed parallel fetching of genomic sequence data.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genofetch::pipeline::{accession_items, assembly_items, read_source_list};
use genofetch::{
    CheckpointStore, CommandDecompressor, CommandFetcher, Config, FetchProcessor, Fetcher,
    HttpFetcher, PipelineRunner, RunSummary,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "genofetch")]
#[command(version)]
#[command(about = "Checkpointed, resumable parallel fetcher for genomic sequence data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "genofetch.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download genomic assemblies from a list of FTP/HTTP directory paths
    Assemblies {
        /// File listing assembly directory paths, one per line
        #[arg(short, long)]
        list: PathBuf,

        /// Output directory for downloaded files
        #[arg(short, long)]
        outdir: Option<PathBuf>,

        /// Decompress .gz files after download
        #[arg(short, long)]
        decompress: bool,

        /// Checkpoint file for resumable runs
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Reprocess items already recorded as successful
        #[arg(long)]
        force: bool,

        /// Number of parallel workers
        #[arg(short = 't', long)]
        workers: Option<usize>,
    },

    /// Download nucleotide FASTA records for a list of NCBI accessions
    Sequences {
        /// File listing nucleotide accessions, one per line
        #[arg(short, long)]
        list: PathBuf,

        /// Output directory for downloaded sequences
        #[arg(short, long)]
        outdir: Option<PathBuf>,

        /// Checkpoint file for resumable runs
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Reprocess items already recorded as successful
        #[arg(long)]
        force: bool,

        /// Number of parallel workers
        #[arg(short = 't', long)]
        workers: Option<usize>,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# genofetch configuration file

[fetch]
# External download tool for assembly URLs
tool = "wget"
# External decompressor for .gz artifacts
decompress_tool = "pigz"
# NCBI E-utils endpoint for sequence downloads
eutils_base_url = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils"
# Per-attempt timeout in seconds
timeout_secs = 120
# Maximum fetch attempts per item
max_retries = 3
# Exponential backoff base in seconds
backoff_base_secs = 2
# Fixed pause between attempts in seconds
retry_pause_secs = 1

[workers]
# 0 derives the pool width from available parallelism (capped at 8)
size = 0

[output]
dir = "genomes"
decompress = false
force = false

[checkpoint]
path = "logs/checkpoint.json"
"#;
    println!("{example}");
}

fn print_summary(title: &str, summary: &RunSummary) {
    println!("\n=== {title} ===");
    println!("Total:     {}", summary.total);
    println!("Succeeded: {}", summary.succeeded);
    println!("Failed:    {}", summary.failed);
    println!("Skipped:   {}", summary.skipped);
    println!("Runtime:   {:.1}s", summary.runtime_secs);
    if !summary.failures.is_empty() {
        println!("\nFailed items:");
        for failure in &summary.failures {
            println!("  {}: {}", failure.key, failure.error);
        }
    }
}

/// 0 on a clean run, 2 when nothing succeeded at all, 1 for partial failure.
fn exit_with(summary: &RunSummary) -> ! {
    if summary.is_clean() {
        std::process::exit(0);
    }
    if summary.is_total_failure() {
        eprintln!("error: all {} items failed, none processed", summary.total);
        std::process::exit(2);
    }
    eprintln!(
        "warning: {} of {} items failed; rerun to retry them",
        summary.failed, summary.total
    );
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
            Ok(())
        }

        Commands::Validate => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            info!("Configuration is valid");
            info!("  Fetch tool: {}", config.fetch.tool);
            info!("  Decompressor: {}", config.fetch.decompress_tool);
            info!(
                "  Retries: {} (timeout {}s)",
                config.fetch.max_retries, config.fetch.timeout_secs
            );
            info!("  Workers: {}", config.workers.resolve());
            info!("  Checkpoint: {}", config.checkpoint.path.display());
            Ok(())
        }

        Commands::Assemblies {
            list,
            outdir,
            decompress,
            checkpoint,
            force,
            workers,
        } => {
            let config = Config::load_or_default(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            let outdir = outdir.unwrap_or_else(|| config.output.dir.clone());
            let decompress = decompress || config.output.decompress;
            let force = force || config.output.force;

            let sources = read_source_list(&list).context("Failed to read assembly list")?;
            let items = assembly_items(&sources, &outdir);

            let fetcher: Arc<dyn Fetcher> = Arc::new(CommandFetcher::new(config.fetch.tool.clone()));
            let mut processor = FetchProcessor::new(
                fetcher,
                config.fetch.retry_policy(),
                config.fetch.timeout(),
            )
            .with_force(force);
            if decompress {
                processor = processor.with_transform(Arc::new(CommandDecompressor::new(
                    config.fetch.decompress_tool.clone(),
                )));
            }

            let store = Arc::new(
                CheckpointStore::open(checkpoint.unwrap_or_else(|| config.checkpoint.path.clone()))
                    .context("Failed to open checkpoint")?,
            );
            let runner = PipelineRunner::new(
                Arc::new(processor),
                store,
                workers.unwrap_or_else(|| config.workers.resolve()),
            )
            .with_force(force);

            let summary = runner.execute(items).await?;
            print_summary("Assembly Download Complete", &summary);
            exit_with(&summary);
        }

        Commands::Sequences {
            list,
            outdir,
            checkpoint,
            force,
            workers,
        } => {
            let config = Config::load_or_default(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            let outdir = outdir.unwrap_or_else(|| config.output.dir.clone());
            let force = force || config.output.force;

            let accessions = read_source_list(&list).context("Failed to read accession list")?;
            let items = accession_items(&accessions, &outdir);

            let fetcher: Arc<dyn Fetcher> = Arc::new(
                HttpFetcher::new(config.fetch.eutils_base_url.clone())
                    .context("Failed to build HTTP client")?,
            );
            let processor = FetchProcessor::new(
                fetcher,
                config.fetch.retry_policy(),
                config.fetch.timeout(),
            )
            .with_force(force);

            let store = Arc::new(
                CheckpointStore::open(checkpoint.unwrap_or_else(|| config.checkpoint.path.clone()))
                    .context("Failed to open checkpoint")?,
            );
            let runner = PipelineRunner::new(
                Arc::new(processor),
                store,
                workers.unwrap_or_else(|| config.workers.resolve()),
            )
            .with_force(force);

            let summary = runner.execute(items).await?;
            print_summary("Sequence Download Complete", &summary);
            exit_with(&summary);
        }
    }
}
