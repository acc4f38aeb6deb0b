pub mod aggregate;
pub mod cache;
pub mod chunking;
pub mod detect;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod models;
pub mod processor;
pub mod progress;
pub mod reader;
pub mod scheduler;
pub mod stopwords;
pub mod tagging;
pub mod worker;

pub use aggregate::{write_output, ResultAggregator};
pub use cache::{modified_timestamp, CacheEntry, CacheStore};
pub use chunking::{chunk, HUGE_TEXT_THRESHOLD};
pub use detect::is_binary;
pub use error::{FileError, PipelineError};
pub use executor::{worker_count, Executor};
pub use extractor::{default_backends, LopdfExtractor, PageText, PdfExtractor};
pub use models::{
    default_extensions, default_ignored_dirs, ExecutionMode, FileRecord, LibraryDocument,
    LibraryMetadata, PipelineConfig, RunOutcome, RunReport, RunStats, StatsDelta, StatsSnapshot,
    DEFAULT_CACHE_FILE, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_OUTPUT_FILE,
};
pub use processor::{FileProcessor, ProcessOutcome, SkipReason};
pub use progress::{NoopProgress, ProgressObserver, Stage};
pub use reader::{read_text, unify_whitespace};
pub use scheduler::BatchScheduler;
pub use stopwords::{default_stop_words, load_stop_words, stop_words_signature};
pub use tagging::{SectionNamer, TagGenerator};
pub use worker::{run_worker, worker_requested, WorkerConfig, WorkerRequest, WorkerResponse, WORKER_ENV};
