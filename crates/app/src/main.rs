use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use structify_core::{
    load_stop_words, run_worker, worker_requested, BatchScheduler, ExecutionMode, PipelineConfig,
    ProgressObserver, RunOutcome, Stage, DEFAULT_CACHE_FILE, DEFAULT_MAX_CHUNK_SIZE,
    DEFAULT_OUTPUT_FILE,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "structify", version, about = "Ingest a directory tree into a chunked, tagged document JSON.")]
struct Cli {
    /// Root directory to ingest.
    root: PathBuf,

    /// Output JSON file.
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    output: PathBuf,

    /// Maximum characters per chunk.
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_SIZE)]
    max_chunk_size: usize,

    /// Execution mode: none, thread or process.
    #[arg(long, default_value = "none")]
    mode: ExecutionMode,

    /// Worker count; defaults depend on the mode.
    #[arg(long)]
    workers: Option<usize>,

    /// Extra stop words, one per line, `#` comments ignored.
    #[arg(long)]
    stop_words_file: Option<PathBuf>,

    /// Comma-separated extension allow-list override (e.g. ".txt,.md,.pdf").
    #[arg(long)]
    extensions: Option<String>,

    /// Comma-separated directory names to skip.
    #[arg(long)]
    ignore_dirs: Option<String>,

    /// Collect statistics without writing the output file.
    #[arg(long, default_value_t = false)]
    stats_only: bool,

    /// Disable the binary-content sniff.
    #[arg(long, default_value_t = false)]
    no_binary_detection: bool,

    /// Disable the incremental mtime cache.
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Incremental cache file.
    #[arg(long, default_value = DEFAULT_CACHE_FILE)]
    cache_file: PathBuf,
}

struct LogProgress;

impl ProgressObserver for LogProgress {
    fn update(&self, current: u64, total: u64, stage: Stage) {
        match stage {
            Stage::Discovery => info!(found = current, "discovering files"),
            Stage::Processing => {
                if current % 50 == 0 || current == total {
                    info!(current, total, "processing");
                }
            }
            Stage::Completed => info!(total, "run completed"),
            Stage::Error => tracing::error!(current, total, "run reported an error stage"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Child processes spawned by the process-pool executor re-enter here.
    if worker_requested() {
        return Ok(run_worker(std::io::stdin().lock(), std::io::stdout().lock())?);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = PipelineConfig::new(&cli.root);
    config.output_path = cli.output;
    config.max_chunk_size = cli.max_chunk_size;
    config.mode = cli.mode;
    config.workers = cli.workers;
    config.stats_only = cli.stats_only;
    config.binary_detection = !cli.no_binary_detection;
    config.use_cache = !cli.no_cache;
    config.cache_path = cli.cache_file;
    config.stop_words = load_stop_words(cli.stop_words_file.as_deref())?;

    if let Some(extensions) = cli.extensions {
        config.valid_extensions = split_list(&extensions);
    }
    if let Some(ignore_dirs) = cli.ignore_dirs {
        config.ignored_dirs = split_list(&ignore_dirs);
    }

    info!(
        root = %config.root_dir.display(),
        mode = ?config.mode,
        max_chunk_size = config.max_chunk_size,
        "structify boot"
    );

    let report = BatchScheduler::new(config)
        .with_observer(Arc::new(LogProgress))
        .run()?;

    let stats = &report.stats;
    println!(
        "{} files total: {} processed, {} skipped, {} errors",
        stats.total_files, stats.processed_files, stats.skipped_files, stats.error_files
    );
    println!(
        "{} chunks over {} bytes in {:.2}s",
        stats.total_chunks, stats.total_bytes, stats.duration_seconds
    );

    if report.outcome == RunOutcome::CompletedWithErrors {
        println!("completed with errors; see the log for details");
    }

    Ok(())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
