use crate::error::FileError;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Pluggable PDF text backend. The reader walks an ordered list of these
/// and takes the first successful extraction.
pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, FileError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, FileError> {
        let document =
            Document::load(path).map_err(|error| FileError::PdfExtraction(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| FileError::PdfExtraction(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(FileError::PdfExtraction(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

/// Built-in backend chain: lopdf only. Callers inject their own extractor
/// ahead of it via [`crate::processor::FileProcessor::with_extractor`].
pub fn default_backends() -> Vec<Box<dyn PdfExtractor>> {
    vec![Box::new(LopdfExtractor)]
}
