use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use crate::chunking::chunk;
use crate::detect::is_binary;
use crate::error::FileError;
use crate::extractor::{default_backends, PdfExtractor};
use crate::models::{FileRecord, RunStats};
use crate::progress::{NoopProgress, ProgressObserver, Stage};
use crate::reader::read_text;
use crate::tagging::{SectionNamer, TagGenerator};

/// Result of processing one file. Serializable so process-pool workers can
/// ship it back over a pipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProcessOutcome {
    Processed {
        library: String,
        path: PathBuf,
        mtime: f64,
        size: u64,
        records: Vec<FileRecord>,
    },
    Skipped {
        path: PathBuf,
        reason: SkipReason,
    },
    Failed {
        path: PathBuf,
        error: FileError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    Binary,
}

/// Per-file orchestration: binary check, read, hash, chunk, name, tag.
///
/// One instance lives per pipeline run and owns the run-scoped memo caches,
/// so concurrent runs never cross-contaminate. All failures are absorbed
/// into statistics; a batch is never aborted by one bad file.
pub struct FileProcessor {
    root: PathBuf,
    max_chunk_size: usize,
    binary_detection: bool,
    namer: SectionNamer,
    tagger: TagGenerator,
    backends: Vec<Box<dyn PdfExtractor>>,
    observer: Arc<dyn ProgressObserver>,
}

impl FileProcessor {
    pub fn new(
        root: PathBuf,
        max_chunk_size: usize,
        binary_detection: bool,
        stop_words: BTreeSet<String>,
    ) -> Self {
        Self {
            root,
            max_chunk_size,
            binary_detection,
            namer: SectionNamer::default(),
            tagger: TagGenerator::new(stop_words),
            backends: default_backends(),
            observer: Arc::new(NoopProgress),
        }
    }

    pub fn from_config(config: &crate::models::PipelineConfig) -> Self {
        Self::new(
            config.root_dir.clone(),
            config.max_chunk_size,
            config.binary_detection,
            config.stop_words.clone(),
        )
    }

    /// Install an extractor ahead of the built-in lopdf backend.
    pub fn with_extractor(mut self, extractor: Box<dyn PdfExtractor>) -> Self {
        self.backends.insert(0, extractor);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn process(&self, path: &Path, stats: &RunStats) -> ProcessOutcome {
        stats.add_total(1);

        if self.binary_detection && is_binary(path) {
            stats.add_skipped(1);
            debug!(path = %path.display(), "binary file skipped");
            return ProcessOutcome::Skipped {
                path: path.to_path_buf(),
                reason: SkipReason::Binary,
            };
        }

        match self.process_inner(path, stats) {
            Ok(outcome) => {
                stats.add_processed(1);
                self.observer
                    .update(stats.processed_files(), stats.total_files(), Stage::Processing);
                outcome
            }
            Err(error) => {
                stats.add_errors(1);
                warn!(path = %path.display(), %error, "file processing failed");
                ProcessOutcome::Failed {
                    path: path.to_path_buf(),
                    error,
                }
            }
        }
    }

    fn process_inner(&self, path: &Path, stats: &RunStats) -> Result<ProcessOutcome, FileError> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            FileError::Metadata(format!("path not under root: {}", path.display()))
        })?;

        let metadata = path
            .metadata()
            .map_err(|error| FileError::Metadata(error.to_string()))?;
        let size = metadata.len();
        let modified = metadata
            .modified()
            .map_err(|error| FileError::Metadata(error.to_string()))?;
        let mtime = modified
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs_f64())
            .unwrap_or(0.0);
        let last_modified: DateTime<Utc> = modified.into();

        let text = read_text(path, &self.backends);
        if text.is_empty() {
            return Err(FileError::EmptyText(path.display().to_string()));
        }

        let content_hash = format!("{:x}", md5::compute(text.as_bytes()));
        stats.add_bytes(text.len() as u64);

        let section = self.namer.name_for(path);
        let chunks = chunk(&text, self.max_chunk_size);
        stats.add_chunks(chunks.len() as u64);

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let source_path = relative.to_string_lossy().to_string();
        let library = library_for(relative);
        let chunked = chunks.len() > 1;

        let records = chunks
            .iter()
            .enumerate()
            .map(|(index, content)| FileRecord {
                section_label: if chunked {
                    format!("{section}_Part_{}", index + 1)
                } else {
                    section.clone()
                },
                content: content.clone(),
                source_path: source_path.clone(),
                file_size_bytes: size,
                last_modified,
                tags: self.tagger.tags_for(&section, content, &extension),
                is_chunked: chunked,
                content_hash: content_hash.clone(),
            })
            .collect();

        Ok(ProcessOutcome::Processed {
            library,
            path: path.to_path_buf(),
            mtime,
            size,
            records,
        })
    }
}

/// First path segment under the root, or `"root"` for top-level files.
fn library_for(relative: &Path) -> String {
    let mut components = relative.components();
    let first = components.next();
    let rest = components.next();

    match (first, rest) {
        (Some(component), Some(_)) => component.as_os_str().to_string_lossy().to_string(),
        _ => "root".to_string(),
    }
}
