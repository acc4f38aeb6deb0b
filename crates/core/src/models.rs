use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::stopwords::default_stop_words;

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_OUTPUT_FILE: &str = "structify_output.json";
pub const DEFAULT_CACHE_FILE: &str = ".structify_cache.json";

/// One chunk of one file's extracted text, ready for serialization.
///
/// All chunks of a file share `source_path` and `content_hash`; the
/// `section_label` carries a `_Part_N` suffix when the file was split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub section_label: String,
    pub content: String,
    pub source_path: String,
    pub file_size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub tags: Vec<String>,
    pub is_chunked: bool,
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryMetadata {
    pub library: String,
    pub created_at: DateTime<Utc>,
}

/// All records grouped under one top-level directory of the input root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDocument {
    pub docs_data: Vec<FileRecord>,
    pub metadata: LibraryMetadata,
}

impl LibraryDocument {
    pub fn new(library: &str) -> Self {
        Self {
            docs_data: Vec::new(),
            metadata: LibraryMetadata {
                library: library.to_string(),
                created_at: Utc::now(),
            },
        }
    }
}

/// Run counters shared across workers. Thread-mode workers update the
/// atomics directly; process-mode workers return a [`StatsDelta`] that the
/// scheduler merges on its own thread.
#[derive(Debug)]
pub struct RunStats {
    total_files: AtomicU64,
    processed_files: AtomicU64,
    skipped_files: AtomicU64,
    error_files: AtomicU64,
    total_bytes: AtomicU64,
    total_chunks: AtomicU64,
    started_at: Instant,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            total_files: AtomicU64::new(0),
            processed_files: AtomicU64::new(0),
            skipped_files: AtomicU64::new(0),
            error_files: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            total_chunks: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }
}

impl RunStats {
    pub fn add_total(&self, count: u64) {
        self.total_files.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_processed(&self, count: u64) {
        self.processed_files.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_skipped(&self, count: u64) {
        self.skipped_files.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_errors(&self, count: u64) {
        self.error_files.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, count: u64) {
        self.total_bytes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_chunks(&self, count: u64) {
        self.total_chunks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn total_files(&self) -> u64 {
        self.total_files.load(Ordering::Relaxed)
    }

    pub fn processed_files(&self) -> u64 {
        self.processed_files.load(Ordering::Relaxed)
    }

    pub fn merge_delta(&self, delta: &StatsDelta) {
        self.total_files.fetch_add(delta.total_files, Ordering::Relaxed);
        self.processed_files
            .fetch_add(delta.processed_files, Ordering::Relaxed);
        self.skipped_files
            .fetch_add(delta.skipped_files, Ordering::Relaxed);
        self.error_files.fetch_add(delta.error_files, Ordering::Relaxed);
        self.total_bytes.fetch_add(delta.total_bytes, Ordering::Relaxed);
        self.total_chunks.fetch_add(delta.total_chunks, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_files: self.total_files.load(Ordering::Relaxed),
            processed_files: self.processed_files.load(Ordering::Relaxed),
            skipped_files: self.skipped_files.load(Ordering::Relaxed),
            error_files: self.error_files.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            total_chunks: self.total_chunks.load(Ordering::Relaxed),
            duration_seconds: self.started_at.elapsed().as_secs_f64(),
        }
    }

    /// Counters only, without wall-clock time. Process-pool workers report
    /// their share of a batch back to the scheduler through this.
    pub fn delta(&self) -> StatsDelta {
        StatsDelta {
            total_files: self.total_files.load(Ordering::Relaxed),
            processed_files: self.processed_files.load(Ordering::Relaxed),
            skipped_files: self.skipped_files.load(Ordering::Relaxed),
            error_files: self.error_files.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            total_chunks: self.total_chunks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_files: u64,
    pub processed_files: u64,
    pub skipped_files: u64,
    pub error_files: u64,
    pub total_bytes: u64,
    pub total_chunks: u64,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsDelta {
    pub total_files: u64,
    pub processed_files: u64,
    pub skipped_files: u64,
    pub error_files: u64,
    pub total_bytes: u64,
    pub total_chunks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    None,
    Thread,
    Process,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "thread" => Ok(Self::Thread),
            "process" => Ok(Self::Process),
            other => Err(format!(
                "unknown execution mode '{other}' (expected none, thread or process)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Completed,
    CompletedWithErrors,
    NoWork,
}

/// Full configuration of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub root_dir: PathBuf,
    pub output_path: PathBuf,
    pub max_chunk_size: usize,
    pub mode: ExecutionMode,
    pub workers: Option<usize>,
    pub valid_extensions: Vec<String>,
    pub ignored_dirs: Vec<String>,
    pub stop_words: BTreeSet<String>,
    pub stats_only: bool,
    pub binary_detection: bool,
    pub use_cache: bool,
    pub cache_path: PathBuf,
}

impl PipelineConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            mode: ExecutionMode::None,
            workers: None,
            valid_extensions: default_extensions(),
            ignored_dirs: default_ignored_dirs(),
            stop_words: default_stop_words(),
            stats_only: false,
            binary_detection: true,
            use_cache: true,
            cache_path: PathBuf::from(DEFAULT_CACHE_FILE),
        }
    }
}

pub fn default_extensions() -> Vec<String> {
    [
        ".txt", ".md", ".rst", ".py", ".js", ".ts", ".java", ".c", ".h", ".cpp", ".hpp",
        ".cs", ".go", ".rs", ".rb", ".php", ".swift", ".kt", ".html", ".css", ".json",
        ".yaml", ".yml", ".toml", ".xml", ".ini", ".cfg", ".sh", ".sql", ".csv", ".pdf",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

pub fn default_ignored_dirs() -> Vec<String> {
    [
        ".git", ".hg", ".svn", "node_modules", "__pycache__", ".venv", "venv", "env",
        "target", "build", "dist", ".idea", ".vscode", ".tox", ".mypy_cache", ".cache",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

/// Final result of a run: terminal state, counter snapshot and the merged
/// library tree.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub stats: StatsSnapshot,
    pub data: std::collections::BTreeMap<String, LibraryDocument>,
}
