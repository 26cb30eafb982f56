//! Google Translate text-to-speech.
//!
//! The endpoint accepts at most 100 characters per request, so the answer is
//! split on punctuation and the returned MP3 segments are concatenated. MP3
//! frames are self-delimiting, so the concatenation plays as one file.

use super::Synthesizer;
use crate::error::{KanhuError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, instrument};

const ENDPOINT: &str = "https://translate.google.com/translate_tts";
const MAX_PIECE_CHARS: usize = 100;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

pub struct GoogleTranslateSynthesizer {
    client: reqwest::Client,
    language: String,
}

impl GoogleTranslateSynthesizer {
    pub fn new(language: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl Synthesizer for GoogleTranslateSynthesizer {
    #[instrument(skip(self, text), fields(lang = %self.language, chars = text.chars().count()))]
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let pieces = split_for_tts(text, MAX_PIECE_CHARS);
        if pieces.is_empty() {
            return Err(KanhuError::InvalidInput("nothing to synthesize".to_string()));
        }

        let total = pieces.len().to_string();
        let mut audio = Vec::new();

        for (idx, piece) in pieces.iter().enumerate() {
            let textlen = piece.chars().count().to_string();
            let idx = idx.to_string();
            let response = self
                .client
                .get(ENDPOINT)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.language.as_str()),
                    ("q", piece.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await
                .map_err(|e| KanhuError::ModelInference(format!("TTS request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(KanhuError::ModelInference(format!(
                    "TTS returned {} for segment {}",
                    response.status(),
                    idx
                )));
            }

            let bytes = response.bytes().await?;
            audio.extend_from_slice(&bytes);
        }

        debug!("Synthesized {} segments, {} bytes", pieces.len(), audio.len());
        Ok(audio)
    }

    fn name(&self) -> String {
        format!("google-tts:{}", self.language)
    }
}

fn sentence_end() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[。！？；，、：\n!?;,:.]+").expect("valid regex"))
}

/// Split text into pieces of at most `max_chars` characters, preferring
/// punctuation boundaries and keeping the punctuation with its clause.
pub(crate) fn split_for_tts(text: &str, max_chars: usize) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut last = 0;
    for m in sentence_end().find_iter(text) {
        clauses.push(&text[last..m.end()]);
        last = m.end();
    }
    clauses.push(&text[last..]);

    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();

    for clause in clauses.into_iter().map(str::trim).filter(|c| !c.is_empty()) {
        if current.chars().count() + clause.chars().count() <= max_chars {
            current.push_str(clause);
            continue;
        }
        if !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        if clause.chars().count() <= max_chars {
            current.push_str(clause);
        } else {
            let chars: Vec<char> = clause.chars().collect();
            for window in chars.chunks(max_chars) {
                pieces.push(window.iter().collect());
            }
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_piece() {
        assert_eq!(split_for_tts("空腹血糖正常值為70到99。", 100), vec!["空腹血糖正常值為70到99。"]);
        assert!(split_for_tts("  \n ", 100).is_empty());
    }

    #[test]
    fn test_pieces_respect_limit_and_keep_text() {
        let text = "每天固定時間量血壓。量之前先休息五分鐘，不要說話。".repeat(8);
        let pieces = split_for_tts(&text, 30);

        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|p| p.chars().count() <= 30));
        assert!(pieces.iter().all(|p| p.ends_with('。') || p.ends_with('，')));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_unpunctuated_run_is_hard_split() {
        let text = "a".repeat(250);
        let pieces = split_for_tts(&text, 100);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[2].len(), 50);
    }
}
