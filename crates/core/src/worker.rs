use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::PathBuf;

use crate::error::PipelineError;
use crate::models::{PipelineConfig, RunStats, StatsDelta};
use crate::processor::{FileProcessor, ProcessOutcome};

/// Set on child processes spawned by the process-pool executor. The binary
/// checks for it at startup and switches into worker mode.
pub const WORKER_ENV: &str = "STRUCTIFY_WORKER";

pub fn worker_requested() -> bool {
    std::env::var_os(WORKER_ENV).is_some()
}

/// Everything a worker process needs to rebuild a [`FileProcessor`].
/// The injected PDF extractor cannot cross the process boundary, so
/// workers always run the built-in backend chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub root_dir: PathBuf,
    pub max_chunk_size: usize,
    pub binary_detection: bool,
    pub stop_words: BTreeSet<String>,
}

impl WorkerConfig {
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            root_dir: config.root_dir.clone(),
            max_chunk_size: config.max_chunk_size,
            binary_detection: config.binary_detection,
            stop_words: config.stop_words.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub config: WorkerConfig,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub outcomes: Vec<ProcessOutcome>,
    pub stats: StatsDelta,
}

/// Worker-side loop: one request on stdin, one response on stdout, exit.
///
/// The full request is consumed before anything is written, so the parent
/// can write the payload and then block on output without deadlocking.
/// Workers own private stats and never touch parent state.
pub fn run_worker<R: Read, W: Write>(mut input: R, output: W) -> Result<(), PipelineError> {
    let mut raw = String::new();
    input.read_to_string(&mut raw)?;
    let request: WorkerRequest = serde_json::from_str(&raw)?;

    let stats = RunStats::default();
    let processor = FileProcessor::new(
        request.config.root_dir,
        request.config.max_chunk_size,
        request.config.binary_detection,
        request.config.stop_words,
    );

    let outcomes = request
        .paths
        .iter()
        .map(|path| processor.process(path, &stats))
        .collect();

    let response = WorkerResponse {
        outcomes,
        stats: stats.delta(),
    };
    serde_json::to_writer(output, &response)?;
    Ok(())
}
