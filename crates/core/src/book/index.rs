//! Book indexer (spec §4.2, C3): turn parsed paragraphs into a canonical
//! `BookIndex`.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::book::hash::file_hash;
use crate::book::model::{
    BookIndex, BookTotals, BookWord, Paragraph, ParagraphKind, ParagraphRange, SectionKind,
    SectionRange,
};
use crate::error::Result;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(chapter|prologue|epilogue|prelude|foreword|introduction|afterword|appendix|part|book)\b")
            .expect("static regex is valid")
    })
}

fn section_kind_for(word: &str) -> SectionKind {
    match word.to_lowercase().as_str() {
        "prologue" => SectionKind::Prologue,
        "epilogue" => SectionKind::Epilogue,
        "prelude" => SectionKind::Prelude,
        "foreword" => SectionKind::Foreword,
        "introduction" => SectionKind::Introduction,
        "afterword" => SectionKind::Afterword,
        "appendix" => SectionKind::Appendix,
        _ => SectionKind::Chapter,
    }
}

fn ends_sentence(token: &str) -> bool {
    let trimmed = token.trim_end_matches(|c: char| matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}'));
    trimmed.ends_with(['.', '!', '?']) || trimmed.ends_with('\u{2026}')
}

struct OpenSection {
    title: String,
    level: u8,
    kind: SectionKind,
    start_word: usize,
    start_paragraph: usize,
}

/// Build a `BookIndex` from a parsed paragraph sequence and the manuscript's
/// source file path (hashed for the cache key).
pub fn build_book_index(
    paragraphs: &[Paragraph],
    source_path: &Path,
    avg_wpm: f64,
    indexed_at: &str,
    title: Option<String>,
    author: Option<String>,
) -> Result<BookIndex> {
    let source_file_hash = file_hash(source_path)?;

    let mut words: Vec<BookWord> = Vec::new();
    let mut sentences: Vec<crate::book::model::SentenceRange> = Vec::new();
    let mut para_ranges: Vec<ParagraphRange> = Vec::new();
    let mut sections: Vec<SectionRange> = Vec::new();

    let mut sentence_index = 0usize;
    let mut sentence_start = 0usize;
    let mut open_section: Option<OpenSection> = None;

    for (paragraph_index, para) in paragraphs.iter().enumerate() {
        let para_start_word = words.len();

        if para.kind == ParagraphKind::Heading
            && para.level.unwrap_or(0) >= 1
            && heading_re().is_match(para.text.trim())
        {
            if let Some(open) = open_section.take() {
                sections.push(SectionRange {
                    id: format!("section-{}", sections.len()),
                    title: open.title,
                    level: open.level,
                    kind: open.kind,
                    start_word: open.start_word,
                    end_word: para_start_word.saturating_sub(1),
                    start_paragraph: open.start_paragraph,
                    end_paragraph: paragraph_index.saturating_sub(1),
                });
            }
            let first_word = heading_re()
                .find(para.text.trim())
                .map(|m| m.as_str())
                .unwrap_or("");
            open_section = Some(OpenSection {
                title: para.text.trim().to_string(),
                level: para.level.unwrap_or(1),
                kind: section_kind_for(first_word),
                start_word: para_start_word,
                start_paragraph: paragraph_index,
            });
        }

        let section_index_for_para: i64 = if open_section.is_some() {
            sections.len() as i64
        } else {
            -1
        };

        let mut paragraph_had_word = false;
        for raw in para.text.split_whitespace() {
            paragraph_had_word = true;
            let word_index = words.len();
            words.push(BookWord {
                text: raw.to_string(),
                word_index,
                sentence_index,
                paragraph_index,
                section_index: section_index_for_para,
            });

            if ends_sentence(raw) {
                sentences.push(crate::book::model::SentenceRange {
                    index: sentence_index,
                    start: sentence_start,
                    end: word_index,
                });
                sentence_index += 1;
                sentence_start = word_index + 1;
            }
        }

        let para_end_word = words.len().saturating_sub(1);
        if paragraph_had_word {
            // Close a sentence left open at paragraph end (spec: "ensures full coverage").
            if sentence_start <= para_end_word {
                sentences.push(crate::book::model::SentenceRange {
                    index: sentence_index,
                    start: sentence_start,
                    end: para_end_word,
                });
                sentence_index += 1;
                sentence_start = para_end_word + 1;
            }
            para_ranges.push(ParagraphRange {
                index: paragraph_index,
                start: para_start_word,
                end: para_end_word,
                kind: Some(para.kind),
                style: para.style.clone(),
            });
        } else {
            // Empty paragraph: still needs a slot, but cannot own a word range.
            // Represent as a zero-width range anchored at the next word index.
            para_ranges.push(ParagraphRange {
                index: paragraph_index,
                start: para_start_word,
                end: para_start_word.saturating_sub(1).max(para_start_word),
                kind: Some(para.kind),
                style: para.style.clone(),
            });
        }
    }

    if let Some(open) = open_section.take() {
        sections.push(SectionRange {
            id: format!("section-{}", sections.len()),
            title: open.title,
            level: open.level,
            kind: open.kind,
            start_word: open.start_word,
            end_word: words.len().saturating_sub(1),
            start_paragraph: open.start_paragraph,
            end_paragraph: paragraphs.len().saturating_sub(1),
        });
    }

    let total_words = words.len();
    let totals = BookTotals {
        words: total_words,
        sentences: sentences.len(),
        paragraphs: para_ranges.iter().filter(|p| p.end >= p.start || total_words == 0).count(),
        estimated_duration_sec: if avg_wpm > 0.0 {
            total_words as f64 / avg_wpm * 60.0
        } else {
            0.0
        },
    };

    Ok(BookIndex {
        source_file: source_path.display().to_string(),
        source_file_hash,
        indexed_at: indexed_at.to_string(),
        title,
        author,
        words,
        sentences,
        paragraphs: para_ranges,
        sections,
        totals,
    })
}

/// Verify the invariants spec §8 calls out for `BookIndex` coverage.
pub fn verify_book_index(index: &BookIndex) -> std::result::Result<(), String> {
    for (i, w) in index.words.iter().enumerate() {
        if w.word_index != i {
            return Err(format!("word {i} has wordIndex {}", w.word_index));
        }
    }
    if index.totals.words != index.words.len() {
        return Err("totals.words mismatch".into());
    }
    if index.totals.sentences != index.sentences.len() {
        return Err("totals.sentences mismatch".into());
    }

    if !index.words.is_empty() {
        let first = index.sentences.first().ok_or("no sentences but words exist")?;
        if first.start != 0 {
            return Err("first sentence does not start at 0".into());
        }
        let last = index.sentences.last().ok_or("no sentences")?;
        if last.end != index.words.len() - 1 {
            return Err("last sentence does not end at totalWords-1".into());
        }
        for w in &index.sentences[1..] {
            let prev = index.sentences[w.index - 1];
            if w.start != prev.end + 1 {
                return Err(format!("sentence {} is not contiguous with {}", w.index, prev.index));
            }
        }
        for (i, w) in index.words.iter().enumerate() {
            let s = &index.sentences[w.sentence_index];
            if !(s.start <= i && i <= s.end) {
                return Err(format!("word {i} sentenceIndex does not contain it"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(text: &str) -> Paragraph {
        Paragraph { text: text.to_string(), style: None, kind: ParagraphKind::Body, level: None }
    }

    fn heading(text: &str, level: u8) -> Paragraph {
        Paragraph { text: text.to_string(), style: None, kind: ParagraphKind::Heading, level: Some(level) }
    }

    fn write_source(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn basic_two_paragraph_book() {
        let (_dir, path) = write_source("book");
        let paras = vec![heading("Chapter One", 1), body("Hello world.")];
        let idx = build_book_index(&paras, &path, 200.0, "2026-01-01T00:00:00Z", None, None).unwrap();

        assert_eq!(idx.totals.words, 4); // "Chapter" "One" "Hello" "world."
        assert_eq!(idx.sentences.len(), 2); // "Chapter One" has no terminal, closed at paragraph end; "Hello world." is one
        assert!(verify_book_index(&idx).is_ok());
    }

    #[test]
    fn heading_opens_a_section() {
        let (_dir, path) = write_source("book");
        let paras = vec![heading("Chapter One", 1), body("Hello world."), heading("Chapter Two", 1), body("Goodbye now.")];
        let idx = build_book_index(&paras, &path, 200.0, "t", None, None).unwrap();
        assert_eq!(idx.sections.len(), 2);
        assert_eq!(idx.sections[0].title, "Chapter One");
        assert_eq!(idx.sections[0].kind, SectionKind::Chapter);
        assert!(idx.sections[0].end_word < idx.sections[1].start_word);
    }

    #[test]
    fn non_heading_paragraph_is_not_a_section() {
        let (_dir, path) = write_source("book");
        let paras = vec![body("Just a regular line.")];
        let idx = build_book_index(&paras, &path, 200.0, "t", None, None).unwrap();
        assert!(idx.sections.is_empty());
        assert!(idx.words.iter().all(|w| w.section_index == -1));
    }

    #[test]
    fn prologue_heading_detected() {
        let (_dir, path) = write_source("book");
        let paras = vec![heading("Prologue", 1), body("It was a dark night.")];
        let idx = build_book_index(&paras, &path, 200.0, "t", None, None).unwrap();
        assert_eq!(idx.sections[0].kind, SectionKind::Prologue);
    }

    #[test]
    fn sentence_closes_on_trailing_quote() {
        let (_dir, path) = write_source("book");
        let paras = vec![body("She said \"hello.\" Then left.")];
        let idx = build_book_index(&paras, &path, 200.0, "t", None, None).unwrap();
        // "hello.\"" ends a sentence after stripping the trailing quote.
        assert!(idx.sentences.len() >= 2);
    }

    #[test]
    fn invariants_hold_for_multi_sentence_paragraph() {
        let (_dir, path) = write_source("book");
        let paras = vec![body("One. Two. Three.")];
        let idx = build_book_index(&paras, &path, 200.0, "t", None, None).unwrap();
        assert_eq!(idx.sentences.len(), 3);
        assert!(verify_book_index(&idx).is_ok());
    }

    #[test]
    fn estimated_duration_uses_avg_wpm() {
        let (_dir, path) = write_source("book");
        let paras = vec![body("one two three four five")];
        let idx = build_book_index(&paras, &path, 300.0, "t", None, None).unwrap();
        assert!((idx.totals.estimated_duration_sec - (5.0 / 300.0 * 60.0)).abs() < 1e-9);
    }

    #[test]
    fn hash_changes_when_source_changes() {
        let (_dir, path) = write_source("version one");
        let paras = vec![body("hello")];
        let idx1 = build_book_index(&paras, &path, 200.0, "t", None, None).unwrap();
        std::fs::write(&path, "version two").unwrap();
        let idx2 = build_book_index(&paras, &path, 200.0, "t", None, None).unwrap();
        assert_ne!(idx1.source_file_hash, idx2.source_file_hash);
    }
}
