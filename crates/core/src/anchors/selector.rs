//! Anchor selector (spec §4.5, C6): unique n-gram matches between filtered
//! book and ASR token streams, monotonic greedy acceptance under a minimum
//! separation.

use std::collections::HashMap;

use crate::anchors::model::Anchor;
use crate::config::AnchorPolicyConfig;

struct Candidate {
    bp: usize,
    ap: usize,
}

fn ngram_key(tokens: &[String], start: usize, n: usize) -> Option<String> {
    if start + n > tokens.len() {
        return None;
    }
    Some(tokens[start..start + n].join("\u{1}"))
}

/// Build `ngram -> positions` over `tokens[window_start..window_end]`
/// (inclusive `window_end`, spec's `B[bStart..bEnd]`).
fn build_ngram_index(
    tokens: &[String],
    n: usize,
    window_start: usize,
    window_end: usize,
) -> HashMap<String, Vec<usize>> {
    let mut map: HashMap<String, Vec<usize>> = HashMap::new();
    let hi = window_end.min(tokens.len().saturating_sub(1));
    if tokens.is_empty() || window_start > hi {
        return map;
    }
    for start in window_start..=hi {
        if let Some(key) = ngram_key(tokens, start, n) {
            map.entry(key).or_default().push(start);
        }
    }
    map
}

fn crosses_sentence_boundary(sentence_index: &[usize], bp: usize, n: usize) -> bool {
    if bp + n > sentence_index.len() {
        return false;
    }
    let first = sentence_index[bp];
    sentence_index[bp..bp + n].iter().any(|&s| s != first)
}

/// Select anchors per spec §4.5, returning them in monotonic `(bp, ap)` order
/// together with the (possibly tightened) book window they were chosen
/// within.
pub fn select_anchors(
    book_tokens: &[String],
    book_sentence_index: &[usize],
    asr_tokens: &[String],
    filtered_to_original_word: &[usize],
    policy: &AnchorPolicyConfig,
    book_window: (usize, usize),
) -> (Vec<Anchor>, (usize, usize)) {
    let (b_start, b_end) = book_window;
    let n = policy.n_gram.max(1);

    let book_index = build_ngram_index(book_tokens, n, b_start, b_end);

    // A position is a valid candidate only if its n-gram is unique in B too.
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut seen_asr_ngrams: HashMap<String, usize> = HashMap::new();
    if asr_tokens.len() >= n {
        for ap in 0..=asr_tokens.len() - n {
            let Some(key) = ngram_key(asr_tokens, ap, n) else { continue };
            *seen_asr_ngrams.entry(key).or_insert(0) += 1;
        }
        for ap in 0..=asr_tokens.len() - n {
            let Some(key) = ngram_key(asr_tokens, ap, n) else { continue };
            if seen_asr_ngrams.get(&key).copied().unwrap_or(0) != 1 {
                continue;
            }
            if let Some(positions) = book_index.get(&key) {
                if positions.len() == 1 {
                    candidates.push(Candidate { bp: positions[0], ap });
                }
            }
        }
    }

    candidates.sort_by_key(|c| c.ap);

    let mut accepted: Vec<Anchor> = Vec::new();
    let mut last_bp: Option<usize> = None;
    let mut last_ap: Option<usize> = None;

    for c in candidates {
        if !policy.allow_boundary_cross && crosses_sentence_boundary(book_sentence_index, c.bp, n) {
            continue;
        }
        if let (Some(lb), Some(la)) = (last_bp, last_ap) {
            if c.bp <= lb {
                continue;
            }
            if c.ap.saturating_sub(la) < policy.min_separation {
                continue;
            }
            if c.bp.saturating_sub(lb) < policy.min_separation {
                continue;
            }
        }
        last_bp = Some(c.bp);
        last_ap = Some(c.ap);
        accepted.push(Anchor {
            bp: c.bp,
            bp_word_index: filtered_to_original_word.get(c.bp).copied().unwrap_or(c.bp),
            ap: c.ap,
        });
    }

    let tightened_window = tighten_window(&accepted, policy.n_gram, book_window);
    (accepted, tightened_window)
}

/// Tighten the book window around the anchor span (spec §4.5 step 5): never
/// widens the original window.
fn tighten_window(anchors: &[Anchor], n_gram: usize, original: (usize, usize)) -> (usize, usize) {
    if anchors.is_empty() {
        return original;
    }
    let first = anchors.first().unwrap().bp;
    let last = anchors.last().unwrap().bp;
    let span = last.saturating_sub(first);
    let pad = 64usize.max(8192.min((n_gram * 2).max(span / 5)));
    let lo = first.saturating_sub(pad).max(original.0);
    let hi = (last + pad).min(original.1);
    (lo, hi)
}
