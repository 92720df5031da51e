//! Hydrator (spec §4.8, C9): join book text + ASR tokens onto alignment
//! ops, and compute a per-sentence display diff.

use serde::{Deserialize, Serialize};

use crate::align::{AlignOp, WordAlign};
use crate::book::model::BookIndex;
use crate::rollup::{ParagraphAlign, SentenceAlign, Timing};
use crate::transcript::TranscriptIndex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HydratedWord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_idx: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asr_idx: Option<usize>,
    pub op: AlignOp,
    pub reason: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_word: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asr_word: Option<String>,
    pub timing: Timing,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiffOpKind {
    Equal,
    Insert,
    Delete,
    Substitute,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiffRun {
    pub op: DiffOpKind,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DiffStats {
    pub reference_tokens: usize,
    pub hypothesis_tokens: usize,
    pub matches: usize,
    pub insertions: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenDiff {
    pub ops: Vec<DiffRun>,
    pub stats: DiffStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HydratedSentence {
    pub align: SentenceAlign,
    pub book_text: String,
    pub script_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<TokenDiff>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydratedTranscript {
    pub audio_path: String,
    pub script_path: String,
    pub book_index_path: String,
    pub created_at_utc: String,
    pub normalization_version: String,
    pub words: Vec<HydratedWord>,
    pub sentences: Vec<HydratedSentence>,
    pub paragraphs: Vec<ParagraphAlign>,
}

fn kind_of(op: AlignOp) -> DiffOpKind {
    match op {
        AlignOp::Match => DiffOpKind::Equal,
        AlignOp::Sub => DiffOpKind::Substitute,
        AlignOp::Ins => DiffOpKind::Insert,
        AlignOp::Del => DiffOpKind::Delete,
    }
}

fn token_label(op: &WordAlign, book: &BookIndex, asr_words: &[String], asr_to_original: &dyn Fn(usize) -> usize) -> String {
    let book_word = op.book_idx.and_then(|i| book.word_text(i)).map(str::to_string);
    let asr_word = op.asr_idx.map(|i| asr_words[asr_to_original(i)].clone());
    match op.op {
        AlignOp::Sub => format!("{}→{}", book_word.unwrap_or_default(), asr_word.unwrap_or_default()),
        AlignOp::Ins => asr_word.unwrap_or_default(),
        AlignOp::Match | AlignOp::Del => book_word.unwrap_or_default(),
    }
}

fn compute_diff(ops: &[WordAlign], book: &BookIndex, asr_words: &[String], asr_to_original: &dyn Fn(usize) -> usize) -> TokenDiff {
    let mut runs: Vec<DiffRun> = Vec::new();
    let mut stats = DiffStats::default();

    for op in ops {
        let kind = kind_of(op.op);
        let label = token_label(op, book, asr_words, asr_to_original);
        match kind {
            DiffOpKind::Equal => {
                stats.matches += 1;
                stats.reference_tokens += 1;
                stats.hypothesis_tokens += 1;
            }
            DiffOpKind::Substitute => {
                stats.reference_tokens += 1;
                stats.hypothesis_tokens += 1;
            }
            DiffOpKind::Insert => stats.hypothesis_tokens += 1,
            DiffOpKind::Delete => {
                stats.deletions += 1;
                stats.reference_tokens += 1;
            }
        }
        match runs.last_mut() {
            Some(last) if last.op == kind => last.tokens.push(label),
            _ => runs.push(DiffRun { op: kind, tokens: vec![label] }),
        }
    }
    // `insertions` is the count of inserted tokens, separate from the
    // reference/hypothesis totals already folded in above.
    stats.insertions = ops.iter().filter(|o| o.op == AlignOp::Ins).count();

    TokenDiff { ops: runs, stats }
}

/// Build a `HydratedTranscript` from a `TranscriptIndex` (spec §4.8).
///
/// `asr_words` is the raw (un-normalized) ASR token text array; `asr_to_original`
/// maps a `WordAlign::asr_idx` (filtered coordinates) back into that array.
pub fn hydrate(
    book: &BookIndex,
    index: &TranscriptIndex,
    asr_words: &[String],
    asr_to_original: impl Fn(usize) -> usize,
) -> HydratedTranscript {
    let words: Vec<HydratedWord> = index
        .words
        .iter()
        .map(|op| HydratedWord {
            book_idx: op.book_idx,
            asr_idx: op.asr_idx,
            op: op.op,
            reason: op.reason.clone(),
            score: op.score,
            book_word: op.book_idx.and_then(|i| book.word_text(i)).map(str::to_string),
            asr_word: op.asr_idx.map(|i| asr_words[asr_to_original(i)].clone()),
            timing: Timing::default(),
        })
        .collect();

    let sentences: Vec<HydratedSentence> = index
        .sentences
        .iter()
        .map(|align| {
            let book_text = book.words[align.book_range.start..=align.book_range.end]
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let script_text = match align.script_range {
                Some(r) if r.end < asr_words.len() => {
                    asr_words[r.start..=r.end].join(" ")
                }
                _ => String::new(),
            };
            let sentence_ops: Vec<WordAlign> = index
                .words
                .iter()
                .filter(|op| op.book_idx.map(|i| i >= align.book_range.start && i <= align.book_range.end).unwrap_or(false))
                .cloned()
                .collect();
            let diff = if sentence_ops.is_empty() {
                None
            } else {
                Some(compute_diff(&sentence_ops, book, asr_words, &asr_to_original))
            };
            HydratedSentence { align: align.clone(), book_text, script_text, diff }
        })
        .collect();

    HydratedTranscript {
        audio_path: index.audio_path.clone(),
        script_path: index.script_path.clone(),
        book_index_path: index.book_index_path.clone(),
        created_at_utc: index.created_at_utc.clone(),
        normalization_version: index.normalization_version.clone(),
        words,
        sentences,
        paragraphs: index.paragraphs.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::model::{BookTotals, BookWord, ParagraphKind, ParagraphRange, SentenceRange};
    use crate::rollup::{Range, SentenceMetrics, Status};

    fn book() -> BookIndex {
        BookIndex {
            source_file: "b.txt".into(),
            source_file_hash: "X".into(),
            indexed_at: "t".into(),
            title: None,
            author: None,
            words: vec![
                BookWord { text: "hello".into(), word_index: 0, sentence_index: 0, paragraph_index: 0, section_index: -1 },
                BookWord { text: "world".into(), word_index: 1, sentence_index: 0, paragraph_index: 0, section_index: -1 },
            ],
            sentences: vec![SentenceRange { index: 0, start: 0, end: 1 }],
            paragraphs: vec![ParagraphRange { index: 0, start: 0, end: 1, kind: Some(ParagraphKind::Body), style: None }],
            sections: vec![],
            totals: BookTotals { words: 2, sentences: 1, paragraphs: 1, estimated_duration_sec: 0.6 },
        }
    }

    #[test]
    fn hydrate_attaches_book_and_asr_words() {
        let b = book();
        let asr_words = vec!["hello".to_string(), "world".to_string()];
        let index = TranscriptIndex {
            audio_path: "a.wav".into(),
            script_path: "a.asr.json".into(),
            book_index_path: "book-index.json".into(),
            created_at_utc: "t".into(),
            normalization_version: "v1".into(),
            words: vec![
                WordAlign { book_idx: Some(0), asr_idx: Some(0), op: AlignOp::Match, reason: "dp".into(), score: 0.0 },
                WordAlign { book_idx: Some(1), asr_idx: Some(1), op: AlignOp::Match, reason: "dp".into(), score: 0.0 },
            ],
            sentences: vec![SentenceAlign {
                id: "sentence-0".into(),
                book_range: Range { start: 0, end: 1 },
                script_range: Some(Range { start: 0, end: 1 }),
                timing: Timing::default(),
                metrics: SentenceMetrics { wer: 0.0, cer: 0.0, span_wer: 0.0, missing_runs: 0, extra_runs: 0 },
                status: Status::Ok,
            }],
            paragraphs: vec![],
        };
        let hydrated = hydrate(&b, &index, &asr_words, |i| i);
        assert_eq!(hydrated.words[0].book_word.as_deref(), Some("hello"));
        assert_eq!(hydrated.words[0].asr_word.as_deref(), Some("hello"));
        assert_eq!(hydrated.sentences[0].book_text, "hello world");
        assert_eq!(hydrated.sentences[0].script_text, "hello world");
        let diff = hydrated.sentences[0].diff.as_ref().unwrap();
        assert_eq!(diff.stats.matches, 2);
    }
}
