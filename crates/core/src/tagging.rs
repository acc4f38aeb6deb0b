use lru::LruCache;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::stopwords::stop_words_signature;

const SECTION_SCAN_BYTES: usize = 10 * 1024;
const SAMPLE_SEGMENT: usize = 10_000;
const SAMPLE_THRESHOLD: usize = 50_000;
const MAX_FREQUENCY_TAGS: usize = 10;
const TAG_CACHE_CAPACITY: usize = 128;

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "java", "c", "h", "cpp", "hpp", "cs", "go", "rs", "rb", "php",
    "swift", "kt",
];

/// Derives a human-readable label for a file, memoized per path for the
/// lifetime of one pipeline run.
///
/// Source files get their first class or function symbol appended as
/// `stem::symbol`; everything else is just the stem.
pub struct SectionNamer {
    memo: Mutex<HashMap<PathBuf, String>>,
    class_re: Regex,
    symbol_re: Regex,
}

impl Default for SectionNamer {
    fn default() -> Self {
        Self {
            memo: Mutex::new(HashMap::new()),
            class_re: Regex::new(r"\bclass\s+([A-Za-z_][A-Za-z0-9_]*)")
                .expect("class pattern is valid"),
            symbol_re: Regex::new(r"\b(?:def|fn)\s+([A-Za-z_][A-Za-z0-9_]*)")
                .expect("symbol pattern is valid"),
        }
    }
}

impl SectionNamer {
    pub fn name_for(&self, path: &Path) -> String {
        if let Some(name) = self
            .memo
            .lock()
            .ok()
            .and_then(|memo| memo.get(path).cloned())
        {
            return name;
        }

        let name = self.derive(path);
        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(path.to_path_buf(), name.clone());
        }
        name
    }

    fn derive(&self, path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "section".to_string());

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if !CODE_EXTENSIONS.contains(&extension.as_str()) {
            return stem;
        }

        let head = match read_head(path, SECTION_SCAN_BYTES) {
            Ok(head) => head,
            Err(error) => {
                debug!(path = %path.display(), %error, "section scan failed, using stem");
                return stem;
            }
        };

        for pattern in [&self.class_re, &self.symbol_re] {
            if let Some(symbol) = pattern
                .captures(&head)
                .and_then(|captures| captures.get(1))
            {
                return format!("{stem}::{}", symbol.as_str());
            }
        }

        stem
    }
}

fn read_head(path: &Path, limit: usize) -> std::io::Result<String> {
    let mut buffer = vec![0u8; limit];
    let mut file = File::open(path)?;
    let mut filled = 0;

    while filled < buffer.len() {
        let read = file.read(&mut buffer[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    buffer.truncate(filled);
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Keyword and frequency based tagger with a bounded, run-scoped memo.
///
/// The memo key hashes chunk content instead of embedding it, so the LRU
/// never retains large strings.
pub struct TagGenerator {
    cache: Mutex<LruCache<TagKey, Vec<String>>>,
    token_re: Regex,
    stop_words: BTreeSet<String>,
    signature: String,
}

type TagKey = (String, String, String, String);

impl TagGenerator {
    pub fn new(stop_words: BTreeSet<String>) -> Self {
        let signature = stop_words_signature(&stop_words);
        let capacity = NonZeroUsize::new(TAG_CACHE_CAPACITY).expect("capacity is nonzero");
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            token_re: Regex::new(r"[A-Za-z0-9_]+").expect("token pattern is valid"),
            stop_words,
            signature,
        }
    }

    /// Sorted tag set for one chunk. Deterministic for identical arguments.
    pub fn tags_for(&self, section_name: &str, content: &str, extension: &str) -> Vec<String> {
        let section_lower = section_name.to_lowercase();
        let key: TagKey = (
            section_lower.clone(),
            format!("{:x}", md5::compute(content.as_bytes())),
            extension.to_string(),
            self.signature.clone(),
        );

        if let Some(tags) = self
            .cache
            .lock()
            .ok()
            .and_then(|mut cache| cache.get(&key).cloned())
        {
            return tags;
        }

        let tags = self.generate(&section_lower, content, extension);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, tags.clone());
        }
        tags
    }

    fn generate(&self, section_lower: &str, content: &str, extension: &str) -> Vec<String> {
        let mut tags = BTreeSet::new();
        tags.insert(section_lower.to_string());
        if !extension.is_empty() {
            tags.insert(extension.to_string());
        }

        let sample = sample_content(content).to_lowercase();
        let sample_words: HashSet<&str> = sample.split_whitespace().collect();

        for keyword in keyword_dictionary(extension) {
            if sample_words.contains(keyword) {
                tags.insert(keyword.to_string());
            }
        }

        for token in self.frequency_tags(&sample, &tags) {
            tags.insert(token);
        }

        tags.into_iter().collect()
    }

    /// Up to ten tokens ranked by descending count, first-seen order breaking
    /// ties; short, rare, numeric, stop-word and already-tagged tokens are
    /// excluded.
    fn frequency_tags(&self, sample: &str, existing: &BTreeSet<String>) -> Vec<String> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();

        for token in self.token_re.find_iter(sample) {
            let token = token.as_str();
            let entry = counts.entry(token).or_insert(0);
            if *entry == 0 {
                first_seen.push(token);
            }
            *entry += 1;
        }

        let mut ranked: Vec<(usize, &str, u64)> = first_seen
            .iter()
            .enumerate()
            .filter_map(|(order, &token)| {
                let count = counts[token];
                let eligible = token.chars().count() > 2
                    && count > 1
                    && !token.chars().all(|c| c.is_ascii_digit())
                    && !self.stop_words.contains(token)
                    && !existing.contains(token);
                eligible.then_some((order, token, count))
            })
            .collect();

        ranked.sort_by(|left, right| right.2.cmp(&left.2).then(left.0.cmp(&right.0)));

        ranked
            .into_iter()
            .take(MAX_FREQUENCY_TAGS)
            .map(|(_, token, _)| token.to_string())
            .collect()
    }
}

/// First, middle and last segments of very large chunks; small chunks are
/// taken whole.
fn sample_content(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= SAMPLE_THRESHOLD {
        return content.to_string();
    }

    let middle_start = chars.len() / 2 - SAMPLE_SEGMENT / 2;
    let segments = [
        &chars[..SAMPLE_SEGMENT],
        &chars[middle_start..middle_start + SAMPLE_SEGMENT],
        &chars[chars.len() - SAMPLE_SEGMENT..],
    ];

    segments
        .iter()
        .map(|segment| segment.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

fn keyword_dictionary(extension: &str) -> &'static [&'static str] {
    match extension {
        "py" => &[
            "class", "def", "import", "async", "yield", "decorator", "exception", "module",
        ],
        "rs" => &[
            "struct", "enum", "trait", "impl", "mod", "unsafe", "macro", "lifetime",
        ],
        "js" | "ts" => &[
            "function", "async", "await", "promise", "export", "callback", "component",
        ],
        "java" | "kt" | "cs" => &[
            "interface", "extends", "implements", "abstract", "override", "package",
        ],
        "md" | "rst" | "txt" => &[
            "guide", "tutorial", "reference", "example", "installation", "usage", "api",
        ],
        "json" | "yaml" | "yml" | "toml" | "ini" | "cfg" => &[
            "config", "schema", "settings", "version", "dependencies",
        ],
        "html" | "css" => &["style", "layout", "template", "responsive", "selector"],
        "sql" => &["select", "insert", "update", "delete", "table", "index", "join"],
        _ => &[
            "data", "document", "text", "note", "summary", "table", "example", "code",
        ],
    }
}
