//! Recognized options (spec §4.13), defaulted the way the pack's configuration
//! crates default every field, loaded from an optional TOML file via `toml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AmsError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnchorPolicyConfig {
    pub n_gram: usize,
    pub target_per_tokens: usize,
    pub min_separation: usize,
    pub allow_boundary_cross: bool,
    pub use_domain_stopwords: bool,
    pub detect_section: bool,
    pub asr_prefix_tokens: usize,
    pub emit_windows: bool,
    pub try_resolve_section_from_labels: bool,
    pub section_override: Option<String>,
}

impl Default for AnchorPolicyConfig {
    fn default() -> Self {
        Self {
            n_gram: 3,
            target_per_tokens: 50,
            min_separation: 100,
            allow_boundary_cross: false,
            use_domain_stopwords: true,
            detect_section: true,
            asr_prefix_tokens: 8,
            emit_windows: true,
            try_resolve_section_from_labels: true,
            section_override: None,
        }
    }
}

/// One explicit domain-equivalence pair (spec §4.1 "equiv map"), e.g. a
/// narrator-specific reading that normalization alone can't derive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EquivPair {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlignConfig {
    pub phoneme_soft_threshold: f64,
    pub max_run: usize,
    pub max_avg: f64,
    pub equiv_pairs: Vec<EquivPair>,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self { phoneme_soft_threshold: 0.8, max_run: 8, max_avg: 0.6, equiv_pairs: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BookIndexConfig {
    pub avg_wpm: f64,
}

impl Default for BookIndexConfig {
    fn default() -> Self {
        Self { avg_wpm: 200.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_backoff_ms: 250 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub start_stage: u8,
    pub end_stage: u8,
    pub force: bool,
    pub asr_concurrency: usize,
    pub mfa_concurrency: usize,
    pub mfa_workspace_pool: usize,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_stage: 1,
            end_stage: 7,
            force: false,
            asr_concurrency: 2,
            mfa_concurrency: 2,
            mfa_workspace_pool: 2,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AmsConfig {
    pub anchors: AnchorPolicyConfig,
    pub align: AlignConfig,
    pub book_index: BookIndexConfig,
    pub pipeline: PipelineConfig,
}

impl AmsConfig {
    /// Load from a TOML file, falling back to defaults for any absent table
    /// or field. Missing file is not an error (matches the teacher's
    /// PausePolicy-style "fall back to a house default when absent").
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| AmsError::io(path, e))?;
        toml::from_str(&text).map_err(|e| AmsError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = AmsConfig::default();
        assert_eq!(cfg.anchors.n_gram, 3);
        assert_eq!(cfg.anchors.target_per_tokens, 50);
        assert_eq!(cfg.anchors.min_separation, 100);
        assert!(!cfg.anchors.allow_boundary_cross);
        assert_eq!(cfg.align.phoneme_soft_threshold, 0.8);
        assert_eq!(cfg.align.max_run, 8);
        assert_eq!(cfg.align.max_avg, 0.6);
        assert_eq!(cfg.book_index.avg_wpm, 200.0);
        assert!(!cfg.pipeline.force);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = AmsConfig::load(Path::new("/nonexistent/ams.toml")).unwrap();
        assert_eq!(cfg, AmsConfig::default());
    }

    #[test]
    fn partial_toml_defaults_the_rest() {
        let dir = std::env::temp_dir().join(format!("ams_config_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ams.toml");
        std::fs::write(&path, "[anchors]\nn_gram = 4\n").unwrap();

        let cfg = AmsConfig::load(&path).unwrap();
        assert_eq!(cfg.anchors.n_gram, 4);
        assert_eq!(cfg.anchors.min_separation, 100);
        assert_eq!(cfg.align.max_run, 8);

        std::fs::remove_dir_all(&dir).ok();
    }
}
