//! Splits extracted document text into overlapping fixed-size passages.
//!
//! Cuts prefer paragraph boundaries, then line boundaries, then single
//! spaces, then an unconditional hard cut. Consecutive passages from one
//! page overlap by exactly `overlap` characters, so a span crossing a
//! window boundary stays searchable from at least one passage.

use crate::error::{Error, Result};
use crate::types::{Document, Passage};

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Target passage length, in characters.
    pub target_len: usize,
    /// Overlap between consecutive passages, in characters.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_len: 1000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

enum Separator {
    Paragraph,
    Line,
    Space,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        if config.target_len == 0 || config.overlap >= config.target_len {
            return Err(Error::Config(format!(
                "chunker overlap ({}) must be smaller than target length ({})",
                config.overlap, config.target_len
            )));
        }
        Ok(Self { config })
    }

    /// Split every page of `document` into passages. Pure function of the
    /// input text and the configuration.
    pub fn split(&self, document: &Document) -> Vec<Passage> {
        let mut passages = Vec::new();
        for page in &document.pages {
            if page.text.trim().is_empty() {
                continue;
            }
            for (n, (start, text)) in self.split_page(&page.text).into_iter().enumerate() {
                passages.push(Passage {
                    id: format!("{}#p{}-{}", document.id, page.number, n),
                    document_id: document.id.clone(),
                    page_number: page.number,
                    text,
                    start_offset: start,
                });
            }
        }
        passages
    }

    fn split_page(&self, text: &str) -> Vec<(usize, String)> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = Vec::new();
        let mut start = 0usize;
        loop {
            let window_end = usize::min(start + self.config.target_len, chars.len());
            let cut = if window_end == chars.len() {
                window_end
            } else {
                self.cut_point(&chars, start, window_end)
            };
            out.push((start, chars[start..cut].iter().collect()));
            if cut == chars.len() {
                break;
            }
            start = cut - self.config.overlap;
        }
        out
    }

    /// Best cut position in `(floor, window_end]`, trying each separator in
    /// priority order. The floor keeps every cut past `start + overlap` so
    /// the window always advances.
    fn cut_point(&self, chars: &[char], start: usize, window_end: usize) -> usize {
        let floor = start + self.config.overlap + 1;
        for sep in [Separator::Paragraph, Separator::Line, Separator::Space] {
            if let Some(cut) = Self::last_boundary(chars, floor, window_end, &sep) {
                return cut;
            }
        }
        window_end
    }

    /// A boundary at `i` cuts after the separator, which stays with the
    /// left-hand passage.
    fn last_boundary(
        chars: &[char],
        floor: usize,
        window_end: usize,
        sep: &Separator,
    ) -> Option<usize> {
        let mut i = window_end;
        while i > floor {
            let hit = match sep {
                Separator::Paragraph => chars[i - 1] == '\n' && i >= 2 && chars[i - 2] == '\n',
                Separator::Line => chars[i - 1] == '\n',
                Separator::Space => chars[i - 1] == ' ',
            };
            if hit {
                return Some(i);
            }
            i -= 1;
        }
        None
    }
}
