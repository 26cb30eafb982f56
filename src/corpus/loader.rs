//! Corpus file discovery and text extraction.

use super::{SourceDocument, SourcePage};
use crate::error::{KanhuError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, info, instrument, warn};

/// List corpus files with one of the given extensions, sorted by path.
pub fn list_corpus_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        KanhuError::CorpusEmpty(format!("cannot read corpus directory {}: {}", dir.display(), e))
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    debug!("Found {} corpus files in {}", files.len(), dir.display());
    Ok(files)
}

/// Load and parse every corpus file, skipping the ones that fail.
///
/// Fails with [`KanhuError::CorpusEmpty`] when nothing parseable remains.
#[instrument(skip(paths), fields(files = paths.len()))]
pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<SourceDocument>> {
    let mut documents = Vec::with_capacity(paths.len());

    for path in paths {
        match load_document(path) {
            Ok(doc) if doc.pages.is_empty() => {
                warn!("No extractable text in {}", path.display());
            }
            Ok(doc) => {
                debug!("Loaded {} ({} pages)", doc.id, doc.pages.len());
                documents.push(doc);
            }
            Err(KanhuError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Corpus file not found: {}", path.display());
            }
            Err(e) => {
                error!("Error processing {}: {}", path.display(), e);
            }
        }
    }

    if documents.is_empty() {
        return Err(KanhuError::CorpusEmpty(format!(
            "none of {} file(s) could be parsed",
            paths.len()
        )));
    }

    info!("Loaded {} corpus documents", documents.len());
    Ok(documents)
}

/// Load a single document. PDFs are split into pages; text files form one page.
pub fn load_document(path: &Path) -> Result<SourceDocument> {
    let bytes = std::fs::read(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let raw_pages = match ext.as_str() {
        "pdf" => pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| KanhuError::InvalidInput(format!("PDF extraction failed: {}", e)))?,
        _ => vec![String::from_utf8(bytes)
            .map_err(|e| KanhuError::InvalidInput(format!("not UTF-8 text: {}", e)))?],
    };

    Ok(SourceDocument {
        id: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        path: path.to_path_buf(),
        pages: numbered_pages(&raw_pages),
    })
}

/// Normalize extracted pages, dropping blank ones but keeping physical page numbers.
fn numbered_pages(raw_pages: &[String]) -> Vec<SourcePage> {
    raw_pages
        .iter()
        .enumerate()
        .filter_map(|(idx, page)| {
            let text = normalize_whitespace(page);
            (!text.is_empty()).then(|| SourcePage::new(idx as u32 + 1, text))
        })
        .collect()
}

/// Collapse runs of horizontal whitespace and excess blank lines left by extraction.
fn normalize_whitespace(text: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();

    let spaces = SPACES.get_or_init(|| Regex::new(r"[ \t\u{3000}]+").expect("valid regex"));
    let blank_lines = BLANK_LINES.get_or_init(|| Regex::new(r"\n\s*\n+").expect("valid regex"));

    let text = text.replace("\r\n", "\n");
    let text = spaces.replace_all(&text, " ");
    blank_lines.replace_all(&text, "\n\n").trim().to_string()
}
