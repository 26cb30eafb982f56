//! Recursive character splitting.
//!
//! Text is split on the coarsest separator present (paragraphs, lines,
//! sentences, words, then characters) and the pieces are greedily merged back
//! into windows of at most `chunk_size` characters, carrying up to
//! `chunk_overlap` characters of trailing context into the next window.

use std::collections::VecDeque;

const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", "。", " ", ""];

/// Splits text into overlapping, size-bounded windows.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split a text into chunks of at most `chunk_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = "";
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }

            if remaining.is_empty() {
                chunks.extend(hard_split(piece, self.chunk_size));
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    /// Greedily join small pieces into windows, keeping overlap between neighbours.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut merged, &window);

                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        push_trimmed(&mut merged, &window);
        merged
    }
}

fn push_trimmed(out: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Split so each separator stays attached to the start of the piece that follows it.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn hard_split(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|c| c.iter().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {} explains caregiving detail {}.", i, i * 7))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = RecursiveCharacterSplitter::new(600, 150);
        let chunks = splitter.split_text("Normal fasting blood sugar is 70 to 99 mg/dL.");
        assert_eq!(chunks, vec!["Normal fasting blood sugar is 70 to 99 mg/dL."]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let splitter = RecursiveCharacterSplitter::new(600, 150);
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("  \n\n ").is_empty());
    }

    #[test]
    fn test_chunks_are_bounded_and_overlap() {
        let splitter = RecursiveCharacterSplitter::new(200, 50);
        let text = sample_text(40);
        let chunks = splitter.split_text(&text);

        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200, "chunk too long: {}", chunk.len());
        }

        // The tail of each chunk reappears at the head of the next one.
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].contains(last_word),
                "expected overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_paragraphs_preferred_over_words() {
        let splitter = RecursiveCharacterSplitter::new(60, 10);
        let text = "Blood pressure should be measured sitting.\n\nBlood sugar is measured before breakfast.";
        let chunks = splitter.split_text(text);
        assert_eq!(
            chunks,
            vec![
                "Blood pressure should be measured sitting.",
                "Blood sugar is measured before breakfast."
            ]
        );
    }

    #[test]
    fn test_text_without_spaces_falls_back_to_characters() {
        let splitter = RecursiveCharacterSplitter::new(10, 3);
        let text = "血壓應在休息五分鐘後坐著測量並記錄兩次讀數取平均值";
        let chunks = splitter.split_text(text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
        let rebuilt: String = chunks.iter().map(|c| c.chars().next().unwrap()).collect();
        assert!(rebuilt.starts_with('血'));
    }
}
