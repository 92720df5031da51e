//! ASR transcript types and the transcription collaborator contract
//! (spec §4.3, C4 input side).
//!
//! The actual speech recognizer is an external process/service; this module
//! only defines the wire shape and the trait the pipeline drives it through,
//! grounded on the teacher's external-tool invocation style in
//! `cache.rs`/`names.rs` generalized to an async collaborator (see
//! `pipeline::external`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One recognized token with timing, as emitted by the ASR engine (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AsrToken {
    /// Start time in seconds.
    #[serde(rename = "t")]
    pub start_time: f64,
    /// Duration in seconds.
    #[serde(rename = "d")]
    pub duration: f64,
    #[serde(rename = "w")]
    pub word: String,
}

impl AsrToken {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// A coarser ASR segment, when the engine reports them; not required for
/// alignment but carried through for diagnostics (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AsrSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrResponse {
    pub model_version: String,
    pub tokens: Vec<AsrToken>,
    #[serde(default)]
    pub segments: Vec<AsrSegment>,
    /// False when the engine could only return segment-level text, no
    /// per-word timings (forces the aligner into a degraded mode, spec §9).
    pub has_word_timings: bool,
}

impl AsrResponse {
    pub fn word_count(&self) -> usize {
        self.tokens.len()
    }

    /// Plain-text transcript, one word per token, for corpus/aligner input.
    pub fn to_corpus_text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// External speech-recognition collaborator. Implementations call out to a
/// model/service; the pipeline only depends on this trait.
#[async_trait]
pub trait AsrClient: Send + Sync {
    async fn transcribe(&self, audio_path: &std::path::Path) -> Result<AsrResponse>;
}

/// Drives a word-timestamped speech recognizer as a subprocess (spec §6,
/// "ASR engine — HTTP service or native model"): this is the CLI-subprocess
/// shape, the same fallback the teacher keeps alongside its native
/// whisper-rs backend when that feature isn't compiled in.
pub struct CliAsrClient {
    pub command: std::path::PathBuf,
    pub model: String,
    pub language: String,
}

impl CliAsrClient {
    pub fn new(command: impl Into<std::path::PathBuf>, model: impl Into<String>, language: impl Into<String>) -> Self {
        Self { command: command.into(), model: model.into(), language: language.into() }
    }
}

#[async_trait]
impl AsrClient for CliAsrClient {
    async fn transcribe(&self, audio_path: &std::path::Path) -> Result<AsrResponse> {
        use crate::error::AmsError;

        let output_dir = std::env::temp_dir().join("ams-asr");
        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| AmsError::io(&output_dir, e))?;

        let output = tokio::process::Command::new(&self.command)
            .arg(audio_path)
            .args(["--model", &self.model])
            .args(["--language", &self.language])
            .args(["--word_timestamps", "True"])
            .args(["--output_format", "json"])
            .args(["--output_dir", output_dir.to_string_lossy().as_ref()])
            .output()
            .await
            .map_err(|e| AmsError::ExternalTransient { stage: "asr".to_string(), reason: e.to_string() })?;

        if !output.status.success() {
            let reason = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(AmsError::ExternalTransient { stage: "asr".to_string(), reason });
        }

        let stem = audio_path.file_stem().and_then(|s| s.to_str()).unwrap_or("audio");
        let json_path = output_dir.join(format!("{stem}.json"));
        let json_text = tokio::fs::read_to_string(&json_path).await.map_err(|e| AmsError::io(&json_path, e))?;
        parse_cli_json(&json_text).map_err(|reason| AmsError::SchemaMismatch { path: json_path, reason })
    }
}

fn parse_cli_json(json_text: &str) -> std::result::Result<AsrResponse, String> {
    let value: serde_json::Value = serde_json::from_str(json_text).map_err(|e| e.to_string())?;
    let mut tokens = Vec::new();
    if let Some(segments) = value["segments"].as_array() {
        for segment in segments {
            let Some(words) = segment["words"].as_array() else { continue };
            for w in words {
                let word = w["word"].as_str().unwrap_or("").trim().to_string();
                let start = w["start"].as_f64().unwrap_or(0.0);
                let end = w["end"].as_f64().unwrap_or(start);
                if !word.is_empty() {
                    tokens.push(AsrToken { start_time: start, duration: (end - start).max(0.0), word });
                }
            }
        }
    }
    let has_word_timings = !tokens.is_empty();
    Ok(AsrResponse { model_version: "cli".to_string(), tokens, segments: Vec::new(), has_word_timings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_time_adds_duration() {
        let t = AsrToken { start_time: 1.5, duration: 0.25, word: "hi".into() };
        assert!((t.end_time() - 1.75).abs() < 1e-9);
    }

    #[test]
    fn corpus_text_joins_tokens_with_spaces() {
        let resp = AsrResponse {
            model_version: "v1".into(),
            tokens: vec![
                AsrToken { start_time: 0.0, duration: 0.2, word: "hello".into() },
                AsrToken { start_time: 0.2, duration: 0.2, word: "world".into() },
            ],
            segments: vec![],
            has_word_timings: true,
        };
        assert_eq!(resp.to_corpus_text(), "hello world");
        assert_eq!(resp.word_count(), 2);
    }

    #[test]
    fn serializes_with_short_field_names() {
        let t = AsrToken { start_time: 0.0, duration: 1.0, word: "x".into() };
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"t\":"));
        assert!(json.contains("\"d\":"));
        assert!(json.contains("\"w\":"));
    }

    #[test]
    fn parses_cli_json_segments_into_tokens() {
        let json = r#"{"segments":[{"words":[
            {"word":"hello","start":0.0,"end":0.3},
            {"word":"world","start":0.3,"end":0.7}
        ]}]}"#;
        let resp = parse_cli_json(json).unwrap();
        assert_eq!(resp.word_count(), 2);
        assert!(resp.has_word_timings);
        assert_eq!(resp.tokens[1].word, "world");
        assert!((resp.tokens[1].duration - 0.4).abs() < 1e-9);
    }
}
