use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

const SAMPLE_SIZE: usize = 8192;
const MIN_SNIFF_SIZE: u64 = 10;
const PRINTABLE_THRESHOLD: f64 = 0.80;

const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "o", "a", "lib", "class", "pyc", "pyo", "wasm",
    "jpg", "jpeg", "png", "gif", "bmp", "ico", "tiff", "webp", "mp3", "mp4", "avi",
    "mov", "mkv", "wav", "flac", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "woff",
    "woff2", "ttf", "otf", "eot", "db", "sqlite", "sqlite3",
];

const MAGIC_SIGNATURES: &[&[u8]] = &[
    &[0xFF, 0xD8, 0xFF],       // JPEG
    &[0x89, 0x50, 0x4E, 0x47], // PNG
    b"GIF8",
    &[0x50, 0x4B, 0x03, 0x04], // ZIP
    b"%PDF",
];

/// Byte-sniffing classifier: binary vs. text.
///
/// `.pdf` files are never binary (they go through the extractor), a known
/// binary extension short-circuits, tiny files are text, and otherwise the
/// first 8 KiB are sniffed for magic prefixes, NUL bytes and a printable
/// ratio. Any I/O failure fails open as text so the reader gets its chance.
pub fn is_binary(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if extension == "pdf" {
        return false;
    }

    if BINARY_EXTENSIONS.contains(&extension.as_str()) {
        return true;
    }

    let size = match path.metadata() {
        Ok(meta) => meta.len(),
        Err(error) => {
            warn!(path = %path.display(), %error, "binary sniff stat failed, assuming text");
            return false;
        }
    };

    if size < MIN_SNIFF_SIZE {
        return false;
    }

    let sample = match read_sample(path) {
        Ok(sample) => sample,
        Err(error) => {
            warn!(path = %path.display(), %error, "binary sniff read failed, assuming text");
            return false;
        }
    };

    sample_looks_binary(&sample)
}

fn read_sample(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; SAMPLE_SIZE];
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
    Ok(buffer)
}

fn sample_looks_binary(sample: &[u8]) -> bool {
    if MAGIC_SIGNATURES
        .iter()
        .any(|signature| sample.starts_with(signature))
    {
        return true;
    }

    if sample.contains(&0) {
        return true;
    }

    if sample.is_empty() {
        return false;
    }

    let printable = sample.iter().filter(|&&byte| is_texty(byte)).count();
    (printable as f64 / sample.len() as f64) < PRINTABLE_THRESHOLD
}

fn is_texty(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7E | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C | 0x1B) || byte >= 0x80
}
