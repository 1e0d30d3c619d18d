//! Stock `TextExtractor` implementations. Extraction remains an injectable
//! capability; these cover plain text and (optionally) PDF sources.

use std::path::Path;

use docqa_core::traits::TextExtractor;
use docqa_core::types::PageText;
use docqa_core::{Error, Result};

/// Reads `.txt`/`.md` files as a single page 0.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn supports(&self, path: &Path) -> bool {
        matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("txt" | "md")
        )
    }

    fn extract(&self, path: &Path) -> Result<Vec<PageText>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::extraction(path.to_string_lossy(), e))?;
        Ok(vec![PageText { number: 0, text }])
    }
}

/// Per-page PDF text extraction.
#[cfg(feature = "pdf")]
#[derive(Debug, Default)]
pub struct PdfExtractor;

#[cfg(feature = "pdf")]
impl TextExtractor for PdfExtractor {
    fn supports(&self, path: &Path) -> bool {
        path.extension().and_then(|s| s.to_str()) == Some("pdf")
    }

    fn extract(&self, path: &Path) -> Result<Vec<PageText>> {
        let pages = pdf_extract::extract_text_by_pages(path)
            .map_err(|e| Error::extraction(path.to_string_lossy(), e))?;
        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                number: i as u32,
                text,
            })
            .collect())
    }
}

/// Dispatches to the first extractor that supports a file.
pub struct CompositeExtractor {
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl CompositeExtractor {
    pub fn new(extractors: Vec<Box<dyn TextExtractor>>) -> Self {
        Self { extractors }
    }

    /// Plain text, plus PDF when the `pdf` feature is enabled.
    pub fn stock() -> Self {
        #[allow(unused_mut)]
        let mut extractors: Vec<Box<dyn TextExtractor>> = vec![Box::new(PlainTextExtractor)];
        #[cfg(feature = "pdf")]
        extractors.push(Box::new(PdfExtractor));
        Self { extractors }
    }
}

impl TextExtractor for CompositeExtractor {
    fn supports(&self, path: &Path) -> bool {
        self.extractors.iter().any(|e| e.supports(path))
    }

    fn extract(&self, path: &Path) -> Result<Vec<PageText>> {
        for extractor in &self.extractors {
            if extractor.supports(path) {
                return extractor.extract(path);
            }
        }
        Err(Error::extraction(
            path.to_string_lossy(),
            "no extractor supports this file",
        ))
    }
}
