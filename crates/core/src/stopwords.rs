use crate::error::PipelineError;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// English fillers plus language keywords that make worthless tags.
const DEFAULT_STOP_WORDS: &[&str] = &[
    // common English
    "about", "after", "again", "all", "also", "and", "any", "are", "because", "been",
    "before", "being", "between", "both", "but", "can", "could", "did", "does", "doing",
    "down", "during", "each", "few", "for", "from", "further", "had", "has", "have",
    "having", "her", "here", "him", "his", "how", "into", "its", "itself", "just",
    "more", "most", "not", "now", "off", "once", "only", "other", "our", "out", "over",
    "own", "same", "she", "should", "some", "such", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "through", "too",
    "under", "until", "very", "was", "were", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "would", "you", "your",
    // programming keywords
    "args", "bool", "break", "case", "catch", "class", "const", "continue", "def",
    "elif", "else", "except", "false", "finally", "float", "func", "function", "import",
    "int", "item", "key", "kwargs", "lambda", "len", "let", "new", "none", "null",
    "print", "private", "public", "range", "return", "self", "static", "str", "true",
    "try", "type", "value", "var", "void",
];

pub fn default_stop_words() -> BTreeSet<String> {
    DEFAULT_STOP_WORDS.iter().map(|word| word.to_string()).collect()
}

/// Default set plus optional file-supplied additions: one word per line,
/// blanks and `#`-comments ignored, everything lower-cased.
pub fn load_stop_words(extra_file: Option<&Path>) -> Result<BTreeSet<String>, PipelineError> {
    let mut words = default_stop_words();

    if let Some(path) = extra_file {
        let contents = fs::read_to_string(path)?;
        for line in contents.lines() {
            let word = line.trim();
            if word.is_empty() || word.starts_with('#') {
                continue;
            }
            words.insert(word.to_lowercase());
        }
    }

    Ok(words)
}

/// Stable fingerprint of a stop-word set, embedded in tag memo keys so two
/// runs with different sets never share cached tags.
pub fn stop_words_signature(words: &BTreeSet<String>) -> String {
    let mut hasher = Sha256::new();
    for word in words {
        hasher.update(word.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
