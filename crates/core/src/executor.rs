use rayon::prelude::*;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::error;

use crate::error::{FileError, PipelineError};
use crate::models::{ExecutionMode, PipelineConfig, RunStats, StatsDelta};
use crate::processor::{FileProcessor, ProcessOutcome};
use crate::worker::{WorkerConfig, WorkerRequest, WorkerResponse, WORKER_ENV};

/// Closed set of concurrency strategies behind one `run_batch` seam.
///
/// Dispatch blocks until the whole batch is done (per-batch barrier); there
/// is no cross-batch pipelining. Completion order within a batch is
/// unspecified; batches execute in submission order.
pub enum Executor {
    Sequential,
    Threads { pool: rayon::ThreadPool },
    Processes { workers: usize, config: WorkerConfig },
}

impl Executor {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        match config.mode {
            ExecutionMode::None => Ok(Self::Sequential),
            ExecutionMode::Thread => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(worker_count(config.mode, config.workers))
                    .build()
                    .map_err(|error| PipelineError::ThreadPool(error.to_string()))?;
                Ok(Self::Threads { pool })
            }
            ExecutionMode::Process => Ok(Self::Processes {
                workers: worker_count(config.mode, config.workers),
                config: WorkerConfig::from_pipeline(config),
            }),
        }
    }

    pub fn run_batch(
        &self,
        batch: &[PathBuf],
        processor: &FileProcessor,
        stats: &RunStats,
    ) -> Vec<ProcessOutcome> {
        match self {
            Self::Sequential => batch
                .iter()
                .map(|path| processor.process(path, stats))
                .collect(),
            Self::Threads { pool } => pool.install(|| {
                batch
                    .par_iter()
                    .map(|path| processor.process(path, stats))
                    .collect()
            }),
            Self::Processes { workers, config } => {
                run_process_batch(batch, *workers, config, stats)
            }
        }
    }
}

pub fn worker_count(mode: ExecutionMode, requested: Option<usize>) -> usize {
    if let Some(count) = requested {
        return count.max(1);
    }

    match mode {
        ExecutionMode::None => 1,
        ExecutionMode::Thread => (2 * cpu_count()).min(32),
        ExecutionMode::Process => cpu_count().saturating_sub(1).max(1),
    }
}

fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

/// Fan a batch out to child processes of the current executable. A worker
/// failure converts its whole slice into error files; the run continues.
fn run_process_batch(
    batch: &[PathBuf],
    workers: usize,
    config: &WorkerConfig,
    stats: &RunStats,
) -> Vec<ProcessOutcome> {
    let slice_size = batch.len().div_ceil(workers).max(1);
    let slices: Vec<&[PathBuf]> = batch.chunks(slice_size).collect();

    let children: Vec<Result<Child, PipelineError>> = slices
        .iter()
        .map(|slice| spawn_worker(slice, config))
        .collect();

    let mut outcomes = Vec::with_capacity(batch.len());
    for (child, slice) in children.into_iter().zip(slices) {
        match child.and_then(collect_worker) {
            Ok(response) => {
                stats.merge_delta(&response.stats);
                outcomes.extend(response.outcomes);
            }
            Err(worker_error) => {
                error!(%worker_error, files = slice.len(), "worker failed, slice counted as errors");
                stats.merge_delta(&StatsDelta {
                    total_files: slice.len() as u64,
                    error_files: slice.len() as u64,
                    ..StatsDelta::default()
                });
                outcomes.extend(slice.iter().map(|path| ProcessOutcome::Failed {
                    path: path.clone(),
                    error: FileError::Other(worker_error.to_string()),
                }));
            }
        }
    }

    outcomes
}

fn spawn_worker(slice: &[PathBuf], config: &WorkerConfig) -> Result<Child, PipelineError> {
    let exe = std::env::current_exe()?;
    let mut child = Command::new(exe)
        .env(WORKER_ENV, "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    let request = WorkerRequest {
        config: config.clone(),
        paths: slice.to_vec(),
    };
    let payload = serde_json::to_vec(&request)?;

    // The worker drains stdin completely before writing, so this cannot
    // deadlock against its stdout.
    child
        .stdin
        .take()
        .ok_or_else(|| PipelineError::Worker("worker stdin unavailable".to_string()))?
        .write_all(&payload)?;

    Ok(child)
}

fn collect_worker(child: Child) -> Result<WorkerResponse, PipelineError> {
    let output = child.wait_with_output()?;

    if !output.status.success() {
        return Err(PipelineError::Worker(format!(
            "worker exited with {}",
            output.status
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|error| PipelineError::Worker(format!("undecodable worker response: {error}")))
}
