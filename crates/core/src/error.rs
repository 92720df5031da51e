//! Typed stage failures (spec §4.14) and retry classification.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by a pipeline stage or by the core alignment algorithms.
///
/// `is_retryable` drives the orchestrator's retry loop (§4.11, §7): only
/// `ExternalTransient` is retried with bounded backoff. Everything else is
/// fatal for the chapter; the orchestrator moves on to the next one.
#[derive(Debug, Error)]
pub enum AmsError {
    #[error("required artifact missing: {path}")]
    InputMissing { path: PathBuf },

    #[error("artifact at {path} violates an invariant: {reason}")]
    SchemaMismatch { path: PathBuf, reason: String },

    #[error("book index hash mismatch: expected {expected}, found {found}")]
    HashMismatch { expected: String, found: String },

    #[error("external service transient failure during {stage}: {reason}")]
    ExternalTransient { stage: String, reason: String },

    #[error("external program failed fatally during {stage}: {reason}")]
    ExternalFatal { stage: String, reason: String },

    #[error("cancelled")]
    Cancelled,

    #[error("internal invariant violation: {0}")]
    Internal(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AmsError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AmsError::ExternalTransient { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AmsError::InputMissing { .. } => "InputMissing",
            AmsError::SchemaMismatch { .. } => "SchemaMismatch",
            AmsError::HashMismatch { .. } => "HashMismatch",
            AmsError::ExternalTransient { .. } => "ExternalTransient",
            AmsError::ExternalFatal { .. } => "ExternalFatal",
            AmsError::Cancelled => "Cancelled",
            AmsError::Internal(_) => "Internal",
            AmsError::Io { .. } => "Internal",
            AmsError::Json { .. } => "SchemaMismatch",
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AmsError::Io { path: path.into(), source }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        AmsError::Json { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, AmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_external_transient_is_retryable() {
        assert!(AmsError::ExternalTransient { stage: "asr".into(), reason: "timeout".into() }
            .is_retryable());
        assert!(!AmsError::ExternalFatal { stage: "mfa".into(), reason: "bad exit".into() }
            .is_retryable());
        assert!(!AmsError::Cancelled.is_retryable());
        assert!(!AmsError::Internal("bug".into()).is_retryable());
    }

    #[test]
    fn kind_labels_match_taxonomy() {
        assert_eq!(AmsError::InputMissing { path: "x".into() }.kind(), "InputMissing");
        assert_eq!(
            AmsError::HashMismatch { expected: "a".into(), found: "b".into() }.kind(),
            "HashMismatch"
        );
    }
}
