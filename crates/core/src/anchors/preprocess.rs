//! Anchor preprocessor (spec §4.3, C4): filtered normalized views of the
//! book and ASR token streams, with index maps back to the originals.

use crate::book::model::BookWord;
use crate::text::{is_stopword, normalize_canonical, StopwordMode};

/// Filtered, normalized view over the book's word stream.
pub struct BookView {
    /// Normalized text of each surviving token, in filtered order.
    pub tokens: Vec<String>,
    /// `tokens[i]` came from `book.words[filtered_to_original[i]]`.
    pub filtered_to_original_word: Vec<usize>,
    /// Sentence id each filtered token belongs to, in filtered order.
    pub sentence_index: Vec<usize>,
}

/// Filtered, normalized view over an ASR token stream.
pub struct AsrView {
    pub tokens: Vec<String>,
    /// `tokens[i]` came from `asr.tokens[filtered_to_original_token[i]]`.
    pub filtered_to_original_token: Vec<usize>,
}

fn keep(normalized: &str, mode: StopwordMode) -> bool {
    !normalized.is_empty() && !is_stopword(normalized, mode)
}

pub fn build_book_view(words: &[BookWord], mode: StopwordMode) -> BookView {
    let mut tokens = Vec::new();
    let mut filtered_to_original_word = Vec::new();
    let mut sentence_index = Vec::new();

    for (i, w) in words.iter().enumerate() {
        let norm = normalize_canonical(&w.text, false);
        if keep(&norm, mode) {
            tokens.push(norm);
            filtered_to_original_word.push(i);
            sentence_index.push(w.sentence_index);
        }
    }

    BookView { tokens, filtered_to_original_word, sentence_index }
}

pub fn build_asr_view(raw_words: &[String], mode: StopwordMode) -> AsrView {
    let mut tokens = Vec::new();
    let mut filtered_to_original_token = Vec::new();

    for (i, raw) in raw_words.iter().enumerate() {
        let norm = normalize_canonical(raw, false);
        if keep(&norm, mode) {
            tokens.push(norm);
            filtered_to_original_token.push(i);
        }
    }

    AsrView { tokens, filtered_to_original_token }
}
