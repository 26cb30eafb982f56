//! Chunking of corpus documents into overlapping retrieval windows.

mod recursive;

pub use recursive::RecursiveCharacterSplitter;

use crate::corpus::SourceDocument;
use serde::{Deserialize, Serialize};

/// A bounded window of document text: the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique chunk ID (`<document>#p<page>#<n>`).
    pub id: String,
    /// Source document ID.
    pub document_id: String,
    /// 1-based page number inside the source document.
    pub page: u32,
    /// Position of this chunk in corpus order.
    pub order: usize,
    /// Text content of this chunk.
    pub text: String,
}

impl DocumentChunk {
    /// Human-readable source reference, e.g. `guide.pdf p.3`.
    pub fn citation(&self) -> String {
        format!("{} p.{}", self.document_id, self.page)
    }
}

/// Split documents into chunks, preserving document and page order.
pub fn chunk_documents(
    splitter: &RecursiveCharacterSplitter,
    documents: &[SourceDocument],
) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();

    for doc in documents {
        for page in &doc.pages {
            let page_no = page.number;
            for (n, text) in splitter.split_text(&page.text).into_iter().enumerate() {
                chunks.push(DocumentChunk {
                    id: format!("{}#p{}#{}", doc.id, page_no, n),
                    document_id: doc.id.clone(),
                    page: page_no,
                    order: chunks.len(),
                    text,
                });
            }
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::SourcePage;
    use std::path::PathBuf;

    #[test]
    fn test_chunks_keep_document_and_page_order() {
        let docs = vec![
            SourceDocument {
                id: "a.pdf".to_string(),
                path: PathBuf::from("a.pdf"),
                pages: vec![SourcePage::new(1, "first page"), SourcePage::new(2, "second page")],
            },
            SourceDocument {
                id: "b.txt".to_string(),
                path: PathBuf::from("b.txt"),
                pages: vec![SourcePage::new(1, "only page")],
            },
        ];

        let chunks = chunk_documents(&RecursiveCharacterSplitter::new(600, 150), &docs);
        let ids: Vec<_> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a.pdf#p1#0", "a.pdf#p2#0", "b.txt#p1#0"]);
        assert_eq!(chunks[2].order, 2);
        assert_eq!(chunks[1].citation(), "a.pdf p.2");
    }

    #[test]
    fn test_citation_uses_physical_page_after_blank_page() {
        let docs = vec![SourceDocument {
            id: "guide.pdf".to_string(),
            path: PathBuf::from("guide.pdf"),
            pages: vec![SourcePage::new(2, "Normal fasting blood sugar is 70 to 99 mg/dL.")],
        }];

        let chunks = chunk_documents(&RecursiveCharacterSplitter::new(600, 150), &docs);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "guide.pdf#p2#0");
        assert_eq!(chunks[0].page, 2);
        assert_eq!(chunks[0].citation(), "guide.pdf p.2");
    }
}
