use crate::extractor::PdfExtractor;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

const SMALL_FILE_LIMIT: u64 = 1024;
const READ_BLOCK: usize = 64 * 1024;

/// Collapse every whitespace run to a single space and trim the ends.
pub fn unify_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Multi-encoding file reader, fails soft: any failure yields an empty
/// string and a log line, never an error.
///
/// PDFs go through the backend chain, each page whitespace-unified and the
/// pages joined with blank lines, so paragraph boundaries survive for the
/// chunker. Plain files are unified as a whole, which flattens blank lines
/// before chunking; that ordering is long-observed behavior and changing it
/// would reshuffle every downstream chunk boundary.
pub fn read_text(path: &Path, pdf_backends: &[Box<dyn PdfExtractor>]) -> String {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        return read_pdf(path, pdf_backends);
    }

    unify_whitespace(&read_plain(path))
}

fn read_pdf(path: &Path, backends: &[Box<dyn PdfExtractor>]) -> String {
    if backends.is_empty() {
        warn!(path = %path.display(), "no pdf backend available, emitting empty text");
        return String::new();
    }

    for backend in backends {
        match backend.extract_pages(path) {
            Ok(pages) => {
                return pages
                    .iter()
                    .map(|page| unify_whitespace(&page.text))
                    .filter(|page| !page.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n");
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "pdf backend failed, trying next");
            }
        }
    }

    warn!(path = %path.display(), "all pdf backends failed, emitting empty text");
    String::new()
}

fn read_plain(path: &Path) -> String {
    let size = match path.metadata() {
        Ok(meta) => meta.len(),
        Err(error) => {
            warn!(path = %path.display(), %error, "stat failed while reading");
            return String::new();
        }
    };

    let bytes = match read_in_blocks(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(path = %path.display(), %error, "read failed");
            return String::new();
        }
    };

    if size < SMALL_FILE_LIMIT {
        return String::from_utf8_lossy(&bytes).into_owned();
    }

    match decode_fallback(&bytes) {
        Some(text) => text,
        None => {
            warn!(path = %path.display(), "no encoding produced a clean decode");
            String::new()
        }
    }
}

fn read_in_blocks(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    let mut block = vec![0u8; READ_BLOCK];

    loop {
        let read = file.read(&mut block)?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&block[..read]);
    }

    Ok(bytes)
}

/// Strict UTF-8, then Latin-1, then Windows-1252; first clean decode wins.
fn decode_fallback(bytes: &[u8]) -> Option<String> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_string());
    }

    if let Some(text) = decode_latin1(bytes) {
        return Some(text);
    }

    decode_windows_1252(bytes)
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|&byte| byte as char).collect())
}

/// 0x80..=0x9F remaps per the Windows-1252 table; the five undefined slots
/// make this the only fallible single-byte decode in the chain.
fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    const HIGH_TABLE: [u32; 32] = [
        0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160,
        0x2039, 0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013,
        0x2014, 0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
    ];

    let mut text = String::with_capacity(bytes.len());
    for &byte in bytes {
        let code = match byte {
            0x80..=0x9F => HIGH_TABLE[(byte - 0x80) as usize],
            other => other as u32,
        };
        text.push(char::from_u32(code).filter(|&c| c != '\0' || byte == 0)?);
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::default_backends;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn whitespace_runs_collapse_to_single_spaces() {
        let input = "A  \t  lot\nof   spacing\n\nhere";
        assert_eq!(unify_whitespace(input), "A lot of spacing here");
    }

    #[test]
    fn small_utf8_file_reads_whole() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("note.txt");
        fs::write(&path, "hello   world")?;

        let text = read_text(&path, &default_backends());
        assert_eq!(text, "hello world");
        Ok(())
    }

    #[test]
    fn blank_lines_are_flattened_for_plain_text() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("paragraphs.txt");
        fs::write(&path, "first paragraph\n\nsecond paragraph")?;

        let text = read_text(&path, &default_backends());
        assert_eq!(text, "first paragraph second paragraph");
        Ok(())
    }

    #[test]
    fn latin1_bytes_fall_back_cleanly() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("latin1.txt");
        // "café" in Latin-1 padded past the small-file limit to hit the
        // fallback chain rather than lossy replacement.
        let mut bytes = vec![b'x'; 1500];
        bytes.extend_from_slice(&[b'c', b'a', b'f', 0xE9]);
        fs::write(&path, &bytes)?;

        let text = read_text(&path, &default_backends());
        assert!(text.ends_with("caf\u{e9}"));
        Ok(())
    }

    #[test]
    fn missing_file_yields_empty_string() {
        let text = read_text(Path::new("/nonexistent/nope.txt"), &default_backends());
        assert!(text.is_empty());
    }

    #[test]
    fn broken_pdf_yields_empty_string() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let text = read_text(&path, &default_backends());
        assert!(text.is_empty());
        Ok(())
    }
}
