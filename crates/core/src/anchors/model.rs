//! Anchor data model (spec §3): `Anchor`, `AnchorDocument`, the policy
//! snapshot recorded alongside them.

use serde::{Deserialize, Serialize};

use crate::book::model::SectionRange;
use crate::text::StopwordMode;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Anchor {
    /// Position in the filtered book token stream.
    pub bp: usize,
    /// Position in the original, unfiltered book word stream.
    pub bp_word_index: usize,
    /// Position in the filtered ASR token stream.
    pub ap: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlignmentPane {
    pub b_lo: usize,
    pub b_hi: usize,
    pub a_lo: usize,
    pub a_hi: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPolicySnapshot {
    pub n_gram: usize,
    pub target_per_tokens: usize,
    pub min_separation: usize,
    pub disallow_boundary_cross: bool,
    pub stopwords: StopwordModeLabel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StopwordModeLabel {
    None,
    Domain,
}

impl From<StopwordMode> for StopwordModeLabel {
    fn from(mode: StopwordMode) -> Self {
        match mode {
            StopwordMode::None => StopwordModeLabel::None,
            StopwordMode::Domain => StopwordModeLabel::Domain,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorDocument {
    pub section: Option<SectionRange>,
    pub policy: AnchorPolicySnapshot,
    pub book_token_count_raw: usize,
    pub book_token_count_filtered: usize,
    pub asr_token_count_raw: usize,
    pub asr_token_count_filtered: usize,
    /// Book window in filtered coordinates, possibly tightened around the
    /// anchor span (spec §4.5 step 5).
    pub book_start: usize,
    pub book_end: usize,
    pub anchors: Vec<Anchor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub windows: Vec<AlignmentPane>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_document_round_trips_through_json() {
        let doc = AnchorDocument {
            section: None,
            policy: AnchorPolicySnapshot {
                n_gram: 3,
                target_per_tokens: 50,
                min_separation: 100,
                disallow_boundary_cross: true,
                stopwords: StopwordModeLabel::Domain,
            },
            book_token_count_raw: 10,
            book_token_count_filtered: 8,
            asr_token_count_raw: 10,
            asr_token_count_filtered: 8,
            book_start: 0,
            book_end: 7,
            anchors: vec![Anchor { bp: 0, bp_word_index: 0, ap: 0 }],
            windows: vec![],
        };
        let json = serde_json::to_string(&doc).unwrap();
        let back: AnchorDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.anchors.len(), 1);
        assert_eq!(back.policy.stopwords, StopwordModeLabel::Domain);
    }
}
