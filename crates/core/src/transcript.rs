//! Transcript index (spec §3, produced by stage 4 from C7+C8 output):
//! the per-chapter aggregate of word/sentence/paragraph alignment.

use serde::{Deserialize, Serialize};

use crate::align::WordAlign;
use crate::rollup::{ParagraphAlign, SentenceAlign};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptIndex {
    pub audio_path: String,
    pub script_path: String,
    pub book_index_path: String,
    pub created_at_utc: String,
    pub normalization_version: String,
    pub words: Vec<WordAlign>,
    pub sentences: Vec<SentenceAlign>,
    pub paragraphs: Vec<ParagraphAlign>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::AlignOp;
    use crate::rollup::{Range, SentenceMetrics, Status, Timing};

    #[test]
    fn round_trips_through_json() {
        let idx = TranscriptIndex {
            audio_path: "a.wav".into(),
            script_path: "a.asr.json".into(),
            book_index_path: "book-index.json".into(),
            created_at_utc: "2026-01-01T00:00:00Z".into(),
            normalization_version: "v1".into(),
            words: vec![WordAlign { book_idx: Some(0), asr_idx: Some(0), op: AlignOp::Match, reason: "dp".into(), score: 0.0 }],
            sentences: vec![SentenceAlign {
                id: "sentence-0".into(),
                book_range: Range { start: 0, end: 0 },
                script_range: Some(Range { start: 0, end: 0 }),
                timing: Timing::default(),
                metrics: SentenceMetrics { wer: 0.0, cer: 0.0, span_wer: 0.0, missing_runs: 0, extra_runs: 0 },
                status: Status::Ok,
            }],
            paragraphs: vec![],
        };
        let json = serde_json::to_string_pretty(&idx).unwrap();
        let back: TranscriptIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back.words.len(), 1);
    }
}
