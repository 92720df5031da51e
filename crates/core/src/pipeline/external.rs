//! External collaborator contracts (spec §6): the forced aligner is an
//! out-of-process program invoked with a corpus directory; `AsrClient`
//! (spec §4 asr.rs) is the other external collaborator the pipeline drives.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{AmsError, Result};

/// Outcome of one forced-alignment invocation.
pub enum AlignerOutcome {
    Success,
    /// Non-zero exit, retryable (e.g. process timeout).
    Transient(String),
    /// Non-zero exit after retries, or a clearly non-recoverable failure.
    Fatal(String),
}

/// Given a corpus directory containing `{chapterId}.wav` + `{chapterId}.lab`,
/// writes `{chapterId}.TextGrid` into the same directory and reports how it
/// exited (spec §6 "External aligner contract").
#[async_trait]
pub trait ForcedAligner: Send + Sync {
    async fn align(&self, corpus_dir: &Path, chapter_id: &str) -> Result<AlignerOutcome>;
}

pub fn outcome_to_result(outcome: AlignerOutcome, stage: &str) -> Result<()> {
    match outcome {
        AlignerOutcome::Success => Ok(()),
        AlignerOutcome::Transient(reason) => Err(AmsError::ExternalTransient { stage: stage.to_string(), reason }),
        AlignerOutcome::Fatal(reason) => Err(AmsError::ExternalFatal { stage: stage.to_string(), reason }),
    }
}

/// Drives Montreal Forced Aligner as a subprocess (spec §6): expects
/// `{chapterId}.wav` + `{chapterId}.lab` already staged in `corpus_dir`,
/// writes `{chapterId}.TextGrid` into the same directory.
pub struct CliForcedAligner {
    pub command: std::path::PathBuf,
    pub acoustic_model: String,
    pub dictionary: String,
}

impl CliForcedAligner {
    pub fn new(command: impl Into<std::path::PathBuf>, acoustic_model: impl Into<String>, dictionary: impl Into<String>) -> Self {
        Self { command: command.into(), acoustic_model: acoustic_model.into(), dictionary: dictionary.into() }
    }
}

#[async_trait]
impl ForcedAligner for CliForcedAligner {
    async fn align(&self, corpus_dir: &Path, chapter_id: &str) -> Result<AlignerOutcome> {
        let output = tokio::process::Command::new(&self.command)
            .arg("align")
            .arg(corpus_dir)
            .arg(&self.dictionary)
            .arg(&self.acoustic_model)
            .arg(corpus_dir)
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(e) => return Ok(AlignerOutcome::Transient(e.to_string())),
        };

        if output.status.success() {
            let grid = corpus_dir.join(format!("{chapter_id}.TextGrid"));
            if grid.exists() {
                Ok(AlignerOutcome::Success)
            } else {
                Ok(AlignerOutcome::Fatal(format!("mfa exited 0 but {} is missing", grid.display())))
            }
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            match output.status.code() {
                // mfa's documented timeout / resource-exhaustion exit code; retry.
                Some(75) => Ok(AlignerOutcome::Transient(stderr)),
                _ => Ok(AlignerOutcome::Fatal(stderr)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_outcome_maps_to_retryable_error() {
        let err = outcome_to_result(AlignerOutcome::Transient("timeout".into()), "mfa").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn fatal_outcome_maps_to_non_retryable_error() {
        let err = outcome_to_result(AlignerOutcome::Fatal("bad exit".into()), "mfa").unwrap_err();
        assert!(!err.is_retryable());
    }
}
