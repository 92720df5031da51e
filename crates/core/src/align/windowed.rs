//! Windowed weighted edit-distance aligner (spec §4.6, C7): runs a weighted
//! Needleman-Wunsch DP per pane between consecutive anchors and emits
//! word-level alignment ops.

use serde::{Deserialize, Serialize};

use crate::anchors::{Anchor, AlignmentPane};
use crate::config::AlignConfig;
use crate::text::phonemes::{rule_based_phonemes, sequence_similarity};
use crate::text::{is_filler, lev_le1, tokens_equivalent, EquivMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignOp {
    Match,
    Sub,
    Ins,
    Del,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordAlign {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_idx: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asr_idx: Option<usize>,
    pub op: AlignOp,
    pub reason: String,
    pub score: f64,
}

/// Build disjoint panes bookending consecutive anchors with the book window
/// edges and adjacent ASR positions (spec §4.6).
pub fn build_panes(anchors: &[Anchor], book_window: (usize, usize), asr_len: usize) -> Vec<AlignmentPane> {
    let (b_lo_all, b_hi_all) = book_window;
    let a_hi_all = asr_len.saturating_sub(1);

    let mut panes = Vec::new();
    let mut prev_b = b_lo_all;
    let mut prev_a = 0usize;

    for anchor in anchors {
        let b_hi = if anchor.bp > prev_b { anchor.bp - 1 } else { prev_b.saturating_sub(1) };
        let a_hi = if anchor.ap > prev_a { anchor.ap - 1 } else { prev_a.saturating_sub(1) };
        panes.push(AlignmentPane { b_lo: prev_b, b_hi, a_lo: prev_a, a_hi });
        prev_b = anchor.bp + 1;
        prev_a = anchor.ap + 1;
    }

    panes.push(AlignmentPane { b_lo: prev_b, b_hi: b_hi_all, a_lo: prev_a, a_hi: a_hi_all });

    panes
}

fn sub_cost(b: &str, a: &str, equiv: Option<&EquivMap>, cfg: &AlignConfig) -> f64 {
    if tokens_equivalent(b, a, equiv) {
        return 0.0;
    }
    let bp = rule_based_phonemes(b);
    let ap = rule_based_phonemes(a);
    let phoneme_sim = sequence_similarity(&bp, &ap);
    if phoneme_sim >= 1.0 {
        return 0.0;
    }
    if lev_le1(b, a) || phoneme_sim >= cfg.phoneme_soft_threshold {
        return 0.3;
    }
    1.0
}

fn ins_cost(a: &str) -> f64 {
    if is_filler(a) {
        0.3
    } else {
        1.0
    }
}

fn del_cost(_b: &str) -> f64 {
    1.0
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Step {
    Diag,
    Up,
    Left,
    Start,
}

/// Align one pane. `b`/`a` are the full filtered token streams; the pane
/// bounds select the local slice (inclusive, may be empty when `hi < lo`).
pub fn align_pane(
    b: &[String],
    a: &[String],
    pane: &AlignmentPane,
    equiv: Option<&EquivMap>,
    cfg: &AlignConfig,
) -> Vec<WordAlign> {
    let b_slice: &[String] = if pane.b_hi >= pane.b_lo && pane.b_lo < b.len() {
        &b[pane.b_lo..=pane.b_hi.min(b.len().saturating_sub(1))]
    } else {
        &[]
    };
    let a_slice: &[String] = if pane.a_hi >= pane.a_lo && pane.a_lo < a.len() {
        &a[pane.a_lo..=pane.a_hi.min(a.len().saturating_sub(1))]
    } else {
        &[]
    };

    let rows = b_slice.len() + 1;
    let cols = a_slice.len() + 1;
    let mut dp = vec![vec![0.0f64; cols]; rows];
    let mut step = vec![vec![Step::Start; cols]; rows];

    for i in 1..rows {
        dp[i][0] = dp[i - 1][0] + del_cost(&b_slice[i - 1]);
        step[i][0] = Step::Up;
    }
    for j in 1..cols {
        dp[0][j] = dp[0][j - 1] + ins_cost(&a_slice[j - 1]);
        step[0][j] = Step::Left;
    }

    for i in 1..rows {
        for j in 1..cols {
            let diag = dp[i - 1][j - 1] + sub_cost(&b_slice[i - 1], &a_slice[j - 1], equiv, cfg);
            let up = dp[i - 1][j] + del_cost(&b_slice[i - 1]);
            let left = dp[i][j - 1] + ins_cost(&a_slice[j - 1]);

            let mut best = diag;
            let mut choice = Step::Diag;
            if up < best {
                best = up;
                choice = Step::Up;
            }
            if left < best {
                best = left;
                choice = Step::Left;
            }
            dp[i][j] = best;
            step[i][j] = choice;
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (rows - 1, cols - 1);
    while i > 0 || j > 0 {
        match step[i][j] {
            Step::Diag => {
                let bi = pane.b_lo + i - 1;
                let aj = pane.a_lo + j - 1;
                let cost = sub_cost(&b_slice[i - 1], &a_slice[j - 1], equiv, cfg);
                ops.push(WordAlign {
                    book_idx: Some(bi),
                    asr_idx: Some(aj),
                    op: if cost == 0.0 { AlignOp::Match } else { AlignOp::Sub },
                    reason: "dp".to_string(),
                    score: cost,
                });
                i -= 1;
                j -= 1;
            }
            Step::Up => {
                let bi = pane.b_lo + i - 1;
                ops.push(WordAlign {
                    book_idx: Some(bi),
                    asr_idx: None,
                    op: AlignOp::Del,
                    reason: "dp".to_string(),
                    score: del_cost(&b_slice[i - 1]),
                });
                i -= 1;
            }
            Step::Left => {
                let aj = pane.a_lo + j - 1;
                ops.push(WordAlign {
                    book_idx: None,
                    asr_idx: Some(aj),
                    op: AlignOp::Ins,
                    reason: "dp".to_string(),
                    score: ins_cost(&a_slice[j - 1]),
                });
                j -= 1;
            }
            Step::Start => break,
        }
    }
    ops.reverse();
    ops
}

/// Run every pane plus the anchor landmarks themselves, in monotonic order.
pub fn align_windows(
    b: &[String],
    a: &[String],
    anchors: &[Anchor],
    panes: &[AlignmentPane],
    equiv: Option<&EquivMap>,
    cfg: &AlignConfig,
) -> Vec<WordAlign> {
    // `build_panes` produces exactly one pane per anchor (the gap before it)
    // plus one trailing pane, so `panes[i]` always precedes `anchors[i]`.
    let mut ops = Vec::new();
    for (i, anchor) in anchors.iter().enumerate() {
        if let Some(pane) = panes.get(i) {
            ops.extend(align_pane(b, a, pane, equiv, cfg));
        }
        ops.push(WordAlign {
            book_idx: Some(anchor.bp),
            asr_idx: Some(anchor.ap),
            op: AlignOp::Match,
            reason: "anchor".to_string(),
            score: 0.0,
        });
    }
    if let Some(last) = panes.last() {
        if panes.len() > anchors.len() {
            ops.extend(align_pane(b, a, last, equiv, cfg));
        }
    }
    ops
}

/// True if a run of consecutive non-Match ops exceeds the configured
/// thresholds (spec §4.6: flagged via metrics downstream, not rejected here).
pub fn flag_long_run(ops: &[WordAlign], cfg: &AlignConfig) -> Vec<bool> {
    let mut flags = vec![false; ops.len()];
    let mut run_start = 0usize;
    let mut i = 0usize;
    while i <= ops.len() {
        let at_end = i == ops.len();
        let is_match = !at_end && ops[i].op == AlignOp::Match;
        if at_end || is_match {
            let len = i - run_start;
            if len > 0 {
                let sum: f64 = ops[run_start..i].iter().map(|o| o.score).sum();
                let avg = sum / len as f64;
                if len > cfg.max_run || avg > cfg.max_avg {
                    for f in &mut flags[run_start..i] {
                        *f = true;
                    }
                }
            }
            run_start = i + 1;
        }
        i += 1;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn perfect_match_pane_has_zero_cost() {
        let b = toks(&["hello", "world"]);
        let a = toks(&["hello", "world"]);
        let pane = AlignmentPane { b_lo: 0, b_hi: 1, a_lo: 0, a_hi: 1 };
        let cfg = AlignConfig::default();
        let ops = align_pane(&b, &a, &pane, None, &cfg);
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|o| o.op == AlignOp::Match));
    }

    #[test]
    fn substitution_is_detected() {
        let b = toks(&["quick"]);
        let a = toks(&["fast"]);
        let pane = AlignmentPane { b_lo: 0, b_hi: 0, a_lo: 0, a_hi: 0 };
        let cfg = AlignConfig::default();
        let ops = align_pane(&b, &a, &pane, None, &cfg);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, AlignOp::Sub);
        assert_eq!(ops[0].score, 1.0);
    }

    #[test]
    fn deletion_when_book_has_extra_word() {
        let b = toks(&["the", "fox"]);
        let a = toks(&["fox"]);
        let pane = AlignmentPane { b_lo: 0, b_hi: 1, a_lo: 0, a_hi: 0 };
        let cfg = AlignConfig::default();
        let ops = align_pane(&b, &a, &pane, None, &cfg);
        assert!(ops.iter().any(|o| o.op == AlignOp::Del));
    }

    #[test]
    fn insertion_when_asr_has_extra_word() {
        let b = toks(&["fox"]);
        let a = toks(&["um", "fox"]);
        let pane = AlignmentPane { b_lo: 0, b_hi: 0, a_lo: 0, a_hi: 1 };
        let cfg = AlignConfig::default();
        let ops = align_pane(&b, &a, &pane, None, &cfg);
        assert!(ops.iter().any(|o| o.op == AlignOp::Ins));
    }

    #[test]
    fn ops_are_emitted_in_book_asr_order() {
        let b = toks(&["one", "two", "three"]);
        let a = toks(&["one", "free", "three"]);
        let pane = AlignmentPane { b_lo: 0, b_hi: 2, a_lo: 0, a_hi: 2 };
        let cfg = AlignConfig::default();
        let ops = align_pane(&b, &a, &pane, None, &cfg);
        let indices: Vec<usize> = ops.iter().filter_map(|o| o.book_idx.or(o.asr_idx)).collect();
        for w in indices.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn flag_long_run_marks_runs_over_max_run() {
        let ops: Vec<WordAlign> = (0..10)
            .map(|i| WordAlign { book_idx: Some(i), asr_idx: Some(i), op: AlignOp::Sub, reason: "dp".into(), score: 1.0 })
            .collect();
        let cfg = AlignConfig::default();
        let flags = flag_long_run(&ops, &cfg);
        assert!(flags.iter().all(|&f| f));
    }
}
