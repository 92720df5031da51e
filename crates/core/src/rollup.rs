//! Rollup engine (spec §4.7, C8): aggregate word-level alignment ops into
//! sentence/paragraph metrics, synthesizing script ranges for sentences with
//! no direct ASR evidence.

use serde::{Deserialize, Serialize};

use crate::align::{AlignOp, WordAlign};
use crate::book::model::BookIndex;
use crate::text::{distance::levenshtein, normalize_canonical};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Timing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
}

impl Timing {
    pub fn span(start_sec: f64, end_sec: f64) -> Self {
        Self { start_sec: Some(start_sec), end_sec: Some(end_sec), duration_sec: Some(end_sec - start_sec) }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SentenceMetrics {
    pub wer: f64,
    pub cer: f64,
    pub span_wer: f64,
    pub missing_runs: usize,
    pub extra_runs: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Attention,
    Unreliable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentenceAlign {
    pub id: String,
    pub book_range: Range,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_range: Option<Range>,
    pub timing: Timing,
    pub metrics: SentenceMetrics,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParagraphAlign {
    pub id: String,
    pub sentence_ids: Vec<String>,
    pub wer: f64,
    pub cer: f64,
    pub coverage: f64,
    pub status: Status,
}

fn status_for_wer(wer: f64, deletions: Option<usize>) -> Status {
    if wer <= 0.10 && deletions.map(|d| d < 3).unwrap_or(true) {
        Status::Ok
    } else if wer <= 0.25 {
        Status::Attention
    } else {
        Status::Unreliable
    }
}

struct GuardSpan {
    op_lo: usize,
    op_hi: usize,
}

fn find_core_span(ops: &[WordAlign], book_to_original: &dyn Fn(usize) -> usize, start: usize, end: usize) -> Option<(usize, usize)> {
    let mut first = None;
    let mut last = None;
    for (k, op) in ops.iter().enumerate() {
        if let Some(bp) = op.book_idx {
            let orig = book_to_original(bp);
            if orig >= start && orig <= end {
                if first.is_none() {
                    first = Some(k);
                }
                last = Some(k);
            }
        }
    }
    match (first, last) {
        (Some(f), Some(l)) => Some((f, l)),
        _ => None,
    }
}

fn expand_guard(ops: &[WordAlign], core: (usize, usize)) -> GuardSpan {
    let (mut lo, mut hi) = core;
    while lo > 0 && ops[lo - 1].book_idx.is_none() {
        lo -= 1;
    }
    while hi + 1 < ops.len() && ops[hi + 1].book_idx.is_none() {
        hi += 1;
    }
    GuardSpan { op_lo: lo, op_hi: hi }
}

/// Roll every book sentence up into a `SentenceAlign` (spec §4.7).
///
/// `book_to_original` maps a filtered book-token position (`WordAlign::book_idx`)
/// back to the original, unfiltered book word index. `asr_to_original` does the
/// same for `WordAlign::asr_idx` against the raw ASR token array. `asr_words`
/// holds the raw (un-normalized) ASR token text, indexed by original position.
pub fn rollup_sentences(
    book: &BookIndex,
    ops: &[WordAlign],
    book_to_original: impl Fn(usize) -> usize,
    asr_to_original: impl Fn(usize) -> usize,
    asr_words: &[String],
) -> Vec<SentenceAlign> {
    let mut out = Vec::with_capacity(book.sentences.len());

    for sentence in &book.sentences {
        let len = sentence.end - sentence.start + 1;
        let core = find_core_span(ops, &book_to_original, sentence.start, sentence.end);

        let Some(core) = core else {
            // No direct coverage; synthesized later by `synthesize_gaps`.
            out.push(SentenceAlign {
                id: format!("sentence-{}", sentence.index),
                book_range: Range { start: sentence.start, end: sentence.end },
                script_range: None,
                timing: Timing::default(),
                metrics: SentenceMetrics { wer: 1.0, cer: 1.0, span_wer: 1.0, missing_runs: len, extra_runs: 0 },
                status: Status::Unreliable,
            });
            continue;
        };

        let guard = expand_guard(ops, core);
        let guard_ops = &ops[guard.op_lo..=guard.op_hi];

        let mut cost_sum = 0.0f64;
        let mut deletions = 0usize;
        let mut insertions = 0usize;
        let mut asr_lo: Option<usize> = None;
        let mut asr_hi: Option<usize> = None;

        for op in guard_ops {
            match op.op {
                AlignOp::Sub | AlignOp::Del => cost_sum += op.score,
                AlignOp::Ins => {
                    insertions += 1;
                    cost_sum += op.score;
                }
                AlignOp::Match => {}
            }
            if op.op == AlignOp::Del {
                deletions += 1;
            }
            if let Some(ap) = op.asr_idx {
                let orig = asr_to_original(ap);
                asr_lo = Some(asr_lo.map_or(orig, |x: usize| x.min(orig)));
                asr_hi = Some(asr_hi.map_or(orig, |x: usize| x.max(orig)));
            }
        }

        let wer = (cost_sum / (len.max(1) as f64)).min(1.0);

        let book_text: String = book.words[sentence.start..=sentence.end]
            .iter()
            .map(|w| normalize_canonical(&w.text, false))
            .collect::<Vec<_>>()
            .join(" ");
        let asr_text: String = match (asr_lo, asr_hi) {
            (Some(lo), Some(hi)) if lo <= hi && hi < asr_words.len() => asr_words[lo..=hi]
                .iter()
                .map(|w| normalize_canonical(w, false))
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        };

        let mut cer = if book_text.is_empty() && asr_text.is_empty() {
            0.0
        } else {
            let d = levenshtein(&book_text, &asr_text) as f64;
            d / book_text.len().max(asr_text.len()).max(1) as f64
        };
        let mut wer = wer;
        if book_text == asr_text {
            wer = 0.0;
            cer = 0.0;
        }

        let status = status_for_wer(wer, Some(deletions));

        out.push(SentenceAlign {
            id: format!("sentence-{}", sentence.index),
            book_range: Range { start: sentence.start, end: sentence.end },
            script_range: asr_lo.zip(asr_hi).map(|(lo, hi)| Range { start: lo, end: hi }),
            timing: Timing::default(),
            metrics: SentenceMetrics { wer, cer, span_wer: wer, missing_runs: deletions, extra_runs: insertions },
            status,
        });
    }

    synthesize_gaps(&mut out, asr_words.len());
    out
}

/// Fill in script ranges for sentences left without one, interpolating
/// between the nearest concrete neighbors (spec §4.7 "Synthesizing script
/// ranges for gapped sentences").
fn synthesize_gaps(sentences: &mut [SentenceAlign], asr_token_count: usize) {
    let n = sentences.len();
    let mut i = 0;
    while i < n {
        if sentences[i].script_range.is_some() {
            i += 1;
            continue;
        }
        let gap_start = i;
        let mut gap_end = i;
        while gap_end + 1 < n && sentences[gap_end + 1].script_range.is_none() {
            gap_end += 1;
        }

        let prev_end = if gap_start > 0 {
            sentences[gap_start - 1].script_range.map(|r| r.end).unwrap_or(0)
        } else {
            0
        };
        let next_start = if gap_end + 1 < n {
            sentences[gap_end + 1]
                .script_range
                .map(|r| r.start)
                .unwrap_or(asr_token_count.saturating_sub(1))
        } else {
            asr_token_count.saturating_sub(1)
        };

        let block_len = gap_end - gap_start + 1;
        let available = next_start.saturating_sub(prev_end).saturating_sub(1);
        let per_slot = (available / block_len.max(1)).max(1);

        let mut cursor = prev_end + 1;
        for idx in gap_start..=gap_end {
            let this_start = cursor.min(next_start.saturating_sub(1)).max(prev_end + 1);
            let this_end = (this_start + per_slot.saturating_sub(1))
                .min(next_start.saturating_sub(1))
                .max(this_start)
                .min(asr_token_count.saturating_sub(1));
            sentences[idx].script_range = Some(Range { start: this_start, end: this_end });
            sentences[idx].status = Status::Unreliable;
            sentences[idx].timing = Timing::default();
            cursor = this_end + 1;
        }

        i = gap_end + 1;
    }
}

/// Aggregate sentence metrics into paragraph-level rollups (spec §4.7).
pub fn rollup_paragraphs(book: &BookIndex, sentences: &[SentenceAlign]) -> Vec<ParagraphAlign> {
    book.paragraphs
        .iter()
        .map(|para| {
            let members: Vec<&SentenceAlign> = sentences
                .iter()
                .filter(|s| s.book_range.start >= para.start && s.book_range.end <= para.end)
                .collect();
            let count = members.len().max(1) as f64;
            let wer = members.iter().map(|s| s.metrics.wer).sum::<f64>() / count;
            let cer = members.iter().map(|s| s.metrics.cer).sum::<f64>() / count;
            let coverage = members
                .iter()
                .map(|s| 1.0 - s.metrics.missing_runs as f64 / (s.book_range.end - s.book_range.start + 1).max(1) as f64)
                .sum::<f64>()
                / count;

            let status = if wer <= 0.10 {
                Status::Ok
            } else if wer <= 0.25 {
                Status::Attention
            } else {
                Status::Unreliable
            };

            ParagraphAlign {
                id: format!("paragraph-{}", para.index),
                sentence_ids: members.iter().map(|s| s.id.clone()).collect(),
                wer,
                cer,
                coverage,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::model::{BookTotals, BookWord, ParagraphKind, ParagraphRange, SentenceRange};

    fn mini_book() -> BookIndex {
        let words = vec!["hello", "world", "goodbye", "now"];
        let book_words: Vec<BookWord> = words
            .iter()
            .enumerate()
            .map(|(i, w)| BookWord { text: w.to_string(), word_index: i, sentence_index: i / 2, paragraph_index: 0, section_index: -1 })
            .collect();
        BookIndex {
            source_file: "b.txt".into(),
            source_file_hash: "X".into(),
            indexed_at: "t".into(),
            title: None,
            author: None,
            words: book_words,
            sentences: vec![SentenceRange { index: 0, start: 0, end: 1 }, SentenceRange { index: 1, start: 2, end: 3 }],
            paragraphs: vec![ParagraphRange { index: 0, start: 0, end: 3, kind: Some(ParagraphKind::Body), style: None }],
            sections: vec![],
            totals: BookTotals { words: 4, sentences: 2, paragraphs: 1, estimated_duration_sec: 1.2 },
        }
    }

    #[test]
    fn perfect_match_yields_ok_status_and_zero_wer() {
        let book = mini_book();
        let asr_words: Vec<String> = vec!["hello", "world", "goodbye", "now"].into_iter().map(String::from).collect();
        let ops = vec![
            WordAlign { book_idx: Some(0), asr_idx: Some(0), op: AlignOp::Match, reason: "dp".into(), score: 0.0 },
            WordAlign { book_idx: Some(1), asr_idx: Some(1), op: AlignOp::Match, reason: "dp".into(), score: 0.0 },
            WordAlign { book_idx: Some(2), asr_idx: Some(2), op: AlignOp::Match, reason: "dp".into(), score: 0.0 },
            WordAlign { book_idx: Some(3), asr_idx: Some(3), op: AlignOp::Match, reason: "dp".into(), score: 0.0 },
        ];
        let sentences = rollup_sentences(&book, &ops, |x| x, |x| x, &asr_words);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].status, Status::Ok);
        assert_eq!(sentences[0].metrics.wer, 0.0);
    }

    #[test]
    fn gapped_sentence_synthesizes_monotonic_script_range() {
        let book = mini_book();
        let asr_words: Vec<String> = vec!["hello", "world", "x", "x", "x", "x", "goodbye", "now"].into_iter().map(String::from).collect();
        // sentence 0 covers book 0..1, sentence 1 (book 2..3) has no ops at all.
        let ops = vec![
            WordAlign { book_idx: Some(0), asr_idx: Some(0), op: AlignOp::Match, reason: "dp".into(), score: 0.0 },
            WordAlign { book_idx: Some(1), asr_idx: Some(1), op: AlignOp::Match, reason: "dp".into(), score: 0.0 },
        ];
        let sentences = rollup_sentences(&book, &ops, |x| x, |x| x, &asr_words);
        assert_eq!(sentences[1].status, Status::Unreliable);
        let prev_end = sentences[0].script_range.unwrap().end;
        let this = sentences[1].script_range.unwrap();
        assert!(prev_end < this.start);
        assert!(this.start <= this.end);
    }

    #[test]
    fn paragraph_rollup_averages_sentence_wer() {
        let book = mini_book();
        let sentences = vec![
            SentenceAlign { id: "sentence-0".into(), book_range: Range { start: 0, end: 1 }, script_range: Some(Range { start: 0, end: 1 }), timing: Timing::default(), metrics: SentenceMetrics { wer: 0.0, cer: 0.0, span_wer: 0.0, missing_runs: 0, extra_runs: 0 }, status: Status::Ok },
            SentenceAlign { id: "sentence-1".into(), book_range: Range { start: 2, end: 3 }, script_range: Some(Range { start: 2, end: 3 }), timing: Timing::default(), metrics: SentenceMetrics { wer: 0.2, cer: 0.1, span_wer: 0.2, missing_runs: 0, extra_runs: 0 }, status: Status::Attention },
        ];
        let paragraphs = rollup_paragraphs(&book, &sentences);
        assert_eq!(paragraphs.len(), 1);
        assert!((paragraphs[0].wer - 0.1).abs() < 1e-9);
        assert_eq!(paragraphs[0].status, Status::Attention);
    }
}
