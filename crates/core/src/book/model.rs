//! Book data model (spec §3): `BookWord`, `SentenceRange`, `ParagraphRange`,
//! `SectionRange`, `BookIndex`, plus the parser-facing `Paragraph` input type.

use serde::{Deserialize, Serialize};

/// A parsed paragraph handed in by the (external) book parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    pub style: Option<String>,
    pub kind: ParagraphKind,
    /// Heading level, meaningful only when `kind == Heading`.
    pub level: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParagraphKind {
    Body,
    Heading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Chapter,
    Prologue,
    Epilogue,
    Prelude,
    Foreword,
    Introduction,
    Afterword,
    Acknowledgments,
    Appendix,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookWord {
    pub text: String,
    pub word_index: usize,
    pub sentence_index: usize,
    pub paragraph_index: usize,
    /// -1 if the word falls outside any detected section.
    pub section_index: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentenceRange {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParagraphRange {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ParagraphKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionRange {
    pub id: String,
    pub title: String,
    pub level: u8,
    pub kind: SectionKind,
    pub start_word: usize,
    pub end_word: usize,
    pub start_paragraph: usize,
    pub end_paragraph: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BookTotals {
    pub words: usize,
    pub sentences: usize,
    pub paragraphs: usize,
    pub estimated_duration_sec: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookIndex {
    pub source_file: String,
    /// Uppercase hex SHA-256 of the source file bytes; the cache key for
    /// every downstream artifact (spec §3, §8 "Hash invalidation").
    pub source_file_hash: String,
    pub indexed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub words: Vec<BookWord>,
    pub sentences: Vec<SentenceRange>,
    pub paragraphs: Vec<ParagraphRange>,
    pub sections: Vec<SectionRange>,
    pub totals: BookTotals,
}

impl BookIndex {
    pub fn word_text(&self, idx: usize) -> Option<&str> {
        self.words.get(idx).map(|w| w.text.as_str())
    }

    pub fn sentence_text(&self, sentence: &SentenceRange) -> String {
        self.words[sentence.start..=sentence.end]
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
