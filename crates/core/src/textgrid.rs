//! TextGrid parser & merger (spec §4.9, C10): Praat word-tier intervals,
//! merged onto the hydrated transcript's words/sentences.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::hydrate::HydratedTranscript;
use crate::rollup::Timing;
use crate::text::normalize_canonical;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextGridInterval {
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TextGridDocument {
    pub intervals: Vec<TextGridInterval>,
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"name\s*=\s*"([^"]*)""#).unwrap())
}
fn item_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"item\s*\[\d+\]\s*:").unwrap())
}
fn interval_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"intervals\s*\[\d+\]\s*:").unwrap())
}
fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(xmin|xmax)\s*=\s*([-+0-9.eE]+)").unwrap())
}
fn text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"text\s*=\s*"(.*)""#).unwrap())
}

#[derive(Default)]
struct PendingInterval {
    xmin: Option<f64>,
    xmax: Option<f64>,
}

/// Parse a Praat TextGrid, keeping only intervals from the `"words"` tier
/// (case-insensitive). Numbers are parsed with `str::parse`, which is
/// locale-invariant (always `.` as the decimal separator).
pub fn parse_text_grid(source: &str) -> TextGridDocument {
    let mut intervals = Vec::new();
    let mut in_words_tier = false;
    let mut pending: Option<PendingInterval> = None;

    for line in source.lines() {
        if item_header_re().is_match(line) {
            in_words_tier = false;
            pending = None;
            continue;
        }
        if let Some(caps) = name_re().captures(line) {
            in_words_tier = caps[1].eq_ignore_ascii_case("words");
            continue;
        }
        if !in_words_tier {
            continue;
        }
        if interval_header_re().is_match(line) {
            pending = Some(PendingInterval::default());
            continue;
        }
        let Some(p) = pending.as_mut() else { continue };
        if let Some(caps) = field_re().captures(line) {
            let value: f64 = caps[2].parse().unwrap_or(0.0);
            match &caps[1] {
                "xmin" => p.xmin = Some(value),
                "xmax" => p.xmax = Some(value),
                _ => {}
            }
            continue;
        }
        if let Some(caps) = text_re().captures(line) {
            let text = caps[1].replace("\"\"", "\"");
            if let (Some(xmin), Some(xmax)) = (p.xmin, p.xmax) {
                intervals.push(TextGridInterval { start_sec: xmin, end_sec: xmax, text });
            }
            pending = None;
        }
    }

    TextGridDocument { intervals }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeLog {
    pub matched: usize,
    pub dropped_intervals: usize,
    pub reverted_sentences: usize,
}

/// Merge a parsed TextGrid onto a hydrated transcript (spec §4.9).
/// Greedy, in-order matching with a drop counter; sentences whose word
/// timings come out non-monotonic revert to empty timing for that sentence
/// only.
pub fn merge_text_grid(doc: &TextGridDocument, hydrated: &mut HydratedTranscript) -> MergeLog {
    let mut log = MergeLog::default();
    let mut cursor = 0usize;

    for interval in &doc.intervals {
        if interval.text.trim().is_empty() {
            continue;
        }
        let target = normalize_canonical(&interval.text, false);
        let mut found = None;
        for i in cursor..hydrated.words.len() {
            let w = &hydrated.words[i];
            let matches = w
                .book_word
                .as_deref()
                .map(|t| normalize_canonical(t, false) == target)
                .unwrap_or(false)
                || w.asr_word
                    .as_deref()
                    .map(|t| normalize_canonical(t, false) == target)
                    .unwrap_or(false);
            if matches {
                found = Some(i);
                break;
            }
        }
        match found {
            Some(i) => {
                hydrated.words[i].timing = Timing::span(interval.start_sec, interval.end_sec);
                cursor = i + 1;
                log.matched += 1;
            }
            None => log.dropped_intervals += 1,
        }
    }

    for sentence in &mut hydrated.sentences {
        let range = sentence.align.book_range;
        let timed: Vec<(f64, f64)> = hydrated
            .words
            .iter()
            .filter(|w| w.book_idx.map(|i| i >= range.start && i <= range.end).unwrap_or(false))
            .filter_map(|w| match (w.timing.start_sec, w.timing.end_sec) {
                (Some(s), Some(e)) => Some((s, e)),
                _ => None,
            })
            .collect();

        if timed.is_empty() {
            continue;
        }

        let monotonic = timed.windows(2).all(|w| w[0].0 <= w[1].0);
        if !monotonic {
            sentence.align.timing = Timing::default();
            log.reverted_sentences += 1;
            continue;
        }

        let start = timed.iter().map(|(s, _)| *s).fold(f64::INFINITY, f64::min);
        let end = timed.iter().map(|(_, e)| *e).fold(f64::NEG_INFINITY, f64::max);
        sentence.align.timing = Timing::span(start, end);
    }

    log
}
