use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::PipelineError;
use crate::models::{FileRecord, LibraryDocument, StatsSnapshot};

/// Merges per-batch results into the library → document map. Records land
/// in completion order, which is nondeterministic under parallel execution
/// and accepted as such.
#[derive(Default)]
pub struct ResultAggregator {
    libraries: BTreeMap<String, LibraryDocument>,
}

impl ResultAggregator {
    pub fn merge(&mut self, library: &str, records: Vec<FileRecord>) {
        self.libraries
            .entry(library.to_string())
            .or_insert_with(|| LibraryDocument::new(library))
            .docs_data
            .extend(records);
    }

    pub fn into_data(self) -> BTreeMap<String, LibraryDocument> {
        self.libraries
    }
}

#[derive(Serialize)]
struct OutputDocument<'a> {
    data: &'a BTreeMap<String, LibraryDocument>,
    stats: &'a StatsSnapshot,
}

/// Pretty-printed `{data, stats}` JSON, creating parent directories.
pub fn write_output(
    path: &Path,
    data: &BTreeMap<String, LibraryDocument>,
    stats: &StatsSnapshot,
) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let payload = serde_json::to_string_pretty(&OutputDocument { data, stats })?;
    fs::write(path, payload)?;
    Ok(())
}
