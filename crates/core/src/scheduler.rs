use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::aggregate::{write_output, ResultAggregator};
use crate::cache::{modified_timestamp, CacheStore};
use crate::error::PipelineError;
use crate::executor::Executor;
use crate::extractor::PdfExtractor;
use crate::models::{PipelineConfig, RunOutcome, RunReport, RunStats};
use crate::processor::{FileProcessor, ProcessOutcome};
use crate::progress::{NoopProgress, ProgressObserver, Stage};

const CACHE_FLUSH_INTERVAL: usize = 5;
const SMALL_RUN_LIMIT: usize = 1000;
const SMALL_BATCH_SIZE: usize = 100;
const LARGE_BATCH_SIZE: usize = 200;
const DISCOVERY_REPORT_EVERY: usize = 250;

/// Drives a whole run: discover, cache-filter, batch, dispatch, aggregate,
/// checkpoint, finalize.
///
/// The scheduler thread is the sole writer of the cache map in every
/// execution mode; workers only ever return results.
pub struct BatchScheduler {
    config: PipelineConfig,
    observer: Arc<dyn ProgressObserver>,
    extractor: Option<Box<dyn PdfExtractor>>,
}

impl BatchScheduler {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NoopProgress),
            extractor: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Inject a PDF backend ahead of the built-in one. In process mode the
    /// injected backend cannot cross into workers, which fall back to the
    /// built-in chain.
    pub fn with_extractor(mut self, extractor: Box<dyn PdfExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn run(mut self) -> Result<RunReport, PipelineError> {
        self.validate()?;

        let stats = RunStats::default();
        let discovered = self.discover()?;
        let mut cache = self
            .config
            .use_cache
            .then(|| CacheStore::load(&self.config.cache_path));

        if discovered.is_empty() {
            info!(root = %self.config.root_dir.display(), "nothing to ingest");
            self.observer.update(0, 0, Stage::Completed);
            if let Some(cache) = &cache {
                cache.flush();
            }
            return Ok(RunReport {
                outcome: RunOutcome::NoWork,
                stats: stats.snapshot(),
                data: BTreeMap::new(),
            });
        }

        let pending = match &cache {
            Some(cache) => self.filter_cached(discovered, cache, &stats),
            None => discovered,
        };
        let batch_size = if pending.len() <= SMALL_RUN_LIMIT {
            SMALL_BATCH_SIZE
        } else {
            LARGE_BATCH_SIZE
        };

        let executor = Executor::from_config(&self.config)?;
        let mut processor =
            FileProcessor::from_config(&self.config).with_observer(self.observer.clone());
        if let Some(extractor) = self.extractor.take() {
            processor = processor.with_extractor(extractor);
        }

        let mut aggregator = ResultAggregator::default();
        for (index, batch) in pending.chunks(batch_size).enumerate() {
            debug!(batch = index + 1, files = batch.len(), "dispatching batch");
            let outcomes = executor.run_batch(batch, &processor, &stats);

            for outcome in outcomes {
                if let ProcessOutcome::Processed {
                    library,
                    path,
                    mtime,
                    size,
                    records,
                } = outcome
                {
                    if let Some(cache) = cache.as_mut() {
                        cache.record(&path, mtime, size, records.len() as u64);
                    }
                    aggregator.merge(&library, records);
                }
            }

            if (index + 1) % CACHE_FLUSH_INTERVAL == 0 {
                if let Some(cache) = &cache {
                    cache.flush();
                }
            }
        }

        let data = aggregator.into_data();
        let snapshot = stats.snapshot();

        if !self.config.stats_only {
            if let Err(write_error) = write_output(&self.config.output_path, &data, &snapshot) {
                error!(
                    path = %self.config.output_path.display(),
                    %write_error,
                    "failed to write output, in-memory result is still returned"
                );
                self.observer
                    .update(snapshot.processed_files, snapshot.total_files, Stage::Error);
            }
        }

        if let Some(cache) = &cache {
            cache.flush();
        }
        self.observer
            .update(snapshot.total_files, snapshot.total_files, Stage::Completed);

        let outcome = if snapshot.error_files > 0 {
            RunOutcome::CompletedWithErrors
        } else {
            RunOutcome::Completed
        };

        info!(
            processed = snapshot.processed_files,
            skipped = snapshot.skipped_files,
            errors = snapshot.error_files,
            chunks = snapshot.total_chunks,
            "run finished"
        );

        Ok(RunReport {
            outcome,
            stats: stats.snapshot(),
            data,
        })
    }

    fn validate(&mut self) -> Result<(), PipelineError> {
        if self.config.max_chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "max chunk size must be positive".to_string(),
            ));
        }

        if self.config.workers == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "worker count must be positive".to_string(),
            ));
        }

        let root = fs::canonicalize(&self.config.root_dir).map_err(|error| {
            PipelineError::InvalidConfig(format!(
                "root directory {}: {error}",
                self.config.root_dir.display()
            ))
        })?;

        if !root.is_dir() {
            return Err(PipelineError::InvalidConfig(format!(
                "root is not a directory: {}",
                root.display()
            )));
        }

        self.config.root_dir = root;
        Ok(())
    }

    fn discover(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let ignored: HashSet<&str> = self
            .config
            .ignored_dirs
            .iter()
            .map(|name| name.as_str())
            .collect();
        let allowed: HashSet<String> = self
            .config
            .valid_extensions
            .iter()
            .map(|ext| ext.to_ascii_lowercase())
            .collect();

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.config.root_dir)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir()
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| ignored.contains(name)))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(walk_error) => {
                    if walk_error.depth() == 0 {
                        return Err(PipelineError::InvalidConfig(format!(
                            "cannot enumerate root: {walk_error}"
                        )));
                    }
                    warn!(%walk_error, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let matches = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
                .is_some_and(|ext| allowed.contains(&ext));

            if matches {
                files.push(entry.path().to_path_buf());
                if files.len() % DISCOVERY_REPORT_EVERY == 0 {
                    self.observer
                        .update(files.len() as u64, files.len() as u64, Stage::Discovery);
                }
            }
        }

        files.sort_unstable();
        self.observer
            .update(files.len() as u64, files.len() as u64, Stage::Discovery);
        Ok(files)
    }

    /// Drop files whose on-disk mtime is not newer than the cached one,
    /// counting them as skipped. Files we cannot stat stay in the batch so
    /// the processor can account for them properly.
    fn filter_cached(
        &self,
        discovered: Vec<PathBuf>,
        cache: &CacheStore,
        stats: &RunStats,
    ) -> Vec<PathBuf> {
        let mut pending = Vec::with_capacity(discovered.len());
        for path in discovered {
            let cached = path
                .metadata()
                .ok()
                .map(|meta| modified_timestamp(&meta))
                .is_some_and(|mtime| cache.should_skip(&path, mtime));

            if cached {
                stats.add_total(1);
                stats.add_skipped(1);
            } else {
                pending.push(path);
            }
        }
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExecutionMode;
    use crate::progress::{ProgressObserver, Stage};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn config_for(root: &std::path::Path, dir: &std::path::Path) -> PipelineConfig {
        let mut config = PipelineConfig::new(root);
        config.output_path = dir.join("out.json");
        config.cache_path = dir.join("cache.json");
        config
    }

    #[derive(Default)]
    struct StageRecorder {
        stages: Mutex<Vec<Stage>>,
    }

    impl ProgressObserver for StageRecorder {
        fn update(&self, _current: u64, _total: u64, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }
    }

    #[test]
    fn single_text_file_lands_in_root_library() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;
        fs::write(root.join("hello.txt"), "hello world")?;

        let report = BatchScheduler::new(config_for(&root, dir.path())).run()?;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.data.len(), 1);
        let library = &report.data["root"];
        assert_eq!(library.docs_data.len(), 1);
        assert!(!library.docs_data[0].is_chunked);
        assert_eq!(report.stats.processed_files, 1);
        Ok(())
    }

    #[test]
    fn empty_root_reports_no_work() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;

        let report = BatchScheduler::new(config_for(&root, dir.path())).run()?;
        assert_eq!(report.outcome, RunOutcome::NoWork);
        assert_eq!(report.stats.total_files, 0);
        Ok(())
    }

    #[test]
    fn missing_root_is_a_hard_error() {
        let result = BatchScheduler::new(PipelineConfig::new("/nonexistent/tree")).run();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn zero_chunk_size_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut config = config_for(dir.path(), dir.path());
        config.max_chunk_size = 0;

        let result = BatchScheduler::new(config).run();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
        Ok(())
    }

    #[test]
    fn ignored_directories_are_pruned() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir_all(root.join("node_modules"))?;
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join("node_modules").join("dep.js"), "ignored entirely")?;
        fs::write(root.join("src").join("main.js"), "function main() { run(); }")?;

        let report = BatchScheduler::new(config_for(&root, dir.path())).run()?;
        assert_eq!(report.stats.total_files, 1);
        assert!(report.data.contains_key("src"));
        Ok(())
    }

    #[test]
    fn unmatched_extensions_are_not_counted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;
        fs::write(root.join("notes.txt"), "kept in the run")?;
        fs::write(root.join("archive.xyz"), "not an allowed extension")?;

        let report = BatchScheduler::new(config_for(&root, dir.path())).run()?;
        assert_eq!(report.stats.total_files, 1);
        Ok(())
    }

    #[test]
    fn second_run_skips_everything_unchanged() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(root.join(name), format!("contents of {name}"))?;
        }

        let first = BatchScheduler::new(config_for(&root, dir.path())).run()?;
        assert_eq!(first.stats.processed_files, 3);
        assert_eq!(first.stats.skipped_files, 0);

        let second = BatchScheduler::new(config_for(&root, dir.path())).run()?;
        assert_eq!(second.stats.processed_files, 0);
        assert_eq!(second.stats.skipped_files, 3);
        assert_eq!(second.stats.total_files, second.stats.skipped_files);
        Ok(())
    }

    #[test]
    fn disabling_cache_reprocesses_every_time() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;
        fs::write(root.join("a.txt"), "stable contents")?;

        let mut config = config_for(&root, dir.path());
        config.use_cache = false;

        BatchScheduler::new(config.clone()).run()?;
        let second = BatchScheduler::new(config).run()?;
        assert_eq!(second.stats.processed_files, 1);
        assert_eq!(second.stats.skipped_files, 0);
        Ok(())
    }

    #[test]
    fn nul_bytes_count_as_skipped_not_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;
        let mut blob = b"prefix ".to_vec();
        blob.push(0);
        blob.extend_from_slice(b" suffix padding to clear the size floor");
        fs::write(root.join("blob.txt"), &blob)?;

        let report = BatchScheduler::new(config_for(&root, dir.path())).run()?;
        assert_eq!(report.stats.skipped_files, 1);
        assert_eq!(report.stats.error_files, 0);
        assert_eq!(report.outcome, RunOutcome::Completed);
        Ok(())
    }

    #[test]
    fn long_single_paragraph_is_bounded_and_chunked() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;
        fs::write(root.join("bulk.txt"), "abcdefghi ".repeat(1000))?;

        let mut config = config_for(&root, dir.path());
        config.max_chunk_size = 1000;

        let report = BatchScheduler::new(config).run()?;
        let records = &report.data["root"].docs_data;

        assert!(records.len() >= 10);
        assert!(records.iter().all(|record| record.content.chars().count() <= 1000));
        assert!(records.iter().all(|record| record.is_chunked));
        let total: usize = records.iter().map(|record| record.content.chars().count()).sum();
        assert!(total >= 9900 && total <= 10_000, "reassembled {total} chars");
        Ok(())
    }

    #[test]
    fn thread_mode_matches_sequential_counters() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;
        for index in 0..12 {
            fs::write(
                root.join(format!("file{index:02}.txt")),
                format!("file number {index} with shared vocabulary payload"),
            )?;
        }

        let sequential = BatchScheduler::new(config_for(&root, dir.path())).run()?;

        let mut threaded_config = config_for(&root, dir.path());
        threaded_config.cache_path = dir.path().join("cache-threaded.json");
        threaded_config.output_path = dir.path().join("out-threaded.json");
        threaded_config.mode = ExecutionMode::Thread;
        threaded_config.workers = Some(3);
        let threaded = BatchScheduler::new(threaded_config).run()?;

        assert_eq!(sequential.stats.processed_files, threaded.stats.processed_files);
        assert_eq!(sequential.stats.total_chunks, threaded.stats.total_chunks);
        assert_eq!(
            sequential.data["root"].docs_data.len(),
            threaded.data["root"].docs_data.len()
        );
        Ok(())
    }

    #[test]
    fn stats_only_suppresses_output_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;
        fs::write(root.join("a.txt"), "some content")?;

        let mut config = config_for(&root, dir.path());
        config.stats_only = true;
        let output_path = config.output_path.clone();

        let report = BatchScheduler::new(config).run()?;
        assert_eq!(report.stats.processed_files, 1);
        assert!(!output_path.exists());
        Ok(())
    }

    #[test]
    fn observer_sees_discovery_then_completion() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;
        fs::write(root.join("a.txt"), "observable content here")?;

        let recorder = Arc::new(StageRecorder::default());
        let report = BatchScheduler::new(config_for(&root, dir.path()))
            .with_observer(recorder.clone())
            .run()?;
        assert_eq!(report.outcome, RunOutcome::Completed);

        let stages = recorder.stages.lock().unwrap().clone();
        assert_eq!(stages.first(), Some(&Stage::Discovery));
        assert!(stages.contains(&Stage::Processing));
        assert_eq!(stages.last(), Some(&Stage::Completed));
        Ok(())
    }

    #[test]
    fn output_file_contains_data_and_stats() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir_all(root.join("acme"))?;
        fs::write(root.join("acme").join("readme.md"), "usage guide with example text")?;

        let config = config_for(&root, dir.path());
        let output_path = config.output_path.clone();
        BatchScheduler::new(config).run()?;

        let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(output_path)?)?;
        assert!(parsed["data"]["acme"]["docs_data"].is_array());
        assert_eq!(parsed["stats"]["processed_files"], 1);
        Ok(())
    }

    #[test]
    fn empty_files_complete_with_errors() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("tree");
        fs::create_dir(&root)?;
        fs::write(root.join("empty.txt"), "")?;
        fs::write(root.join("full.txt"), "real content")?;

        let report = BatchScheduler::new(config_for(&root, dir.path())).run()?;
        assert_eq!(report.outcome, RunOutcome::CompletedWithErrors);
        assert_eq!(report.stats.error_files, 1);
        assert_eq!(report.stats.processed_files, 1);
        Ok(())
    }
}
