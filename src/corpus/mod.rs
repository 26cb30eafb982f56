//! Reference document corpus.
//!
//! Lists and parses the documents caregivers' questions are answered from.
//! Only the top level of the corpus directory is read, in sorted path order,
//! so chunk order and the content fingerprint are reproducible.

mod loader;

pub use loader::{list_corpus_files, load_document, load_documents};

use std::path::PathBuf;

/// A parsed corpus document, split into pages.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Stable identifier (the file name).
    pub id: String,
    /// Path the document was read from.
    pub path: PathBuf,
    /// Pages with extractable text, in document order. Plain text files have a single page.
    pub pages: Vec<SourcePage>,
}

impl SourceDocument {
    /// Total number of characters across all pages.
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }
}

/// One page of a source document.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    /// 1-based physical page number; blank pages keep their slot.
    pub number: u32,
    pub text: String,
}

impl SourcePage {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}
