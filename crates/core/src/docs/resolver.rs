//! Artifact resolver (spec §4.10, §6, C11): owns the on-disk path
//! conventions and hands out `DocumentSlot`s for each chapter artifact.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::docs::slot::DocumentSlot;
use crate::error::{AmsError, Result};

/// Write `value` as pretty JSON to `path` via a sibling `.tmp` + atomic
/// rename, so readers never observe a half-written artifact (spec §6, §7).
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AmsError::io(parent, e))?;
    }
    let tmp = path.with_extension(format!("{}.tmp", path.extension().and_then(|e| e.to_str()).unwrap_or("json")));
    let json = serde_json::to_string_pretty(value).map_err(|e| AmsError::json(path, e))?;
    std::fs::write(&tmp, json).map_err(|e| AmsError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| AmsError::io(path, e))?;
    Ok(())
}

pub fn atomic_write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AmsError::io(parent, e))?;
    }
    let tmp = path.with_extension("txt.tmp");
    std::fs::write(&tmp, text).map_err(|e| AmsError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| AmsError::io(path, e))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| AmsError::io(path, e))?;
    let value = serde_json::from_str(&text).map_err(|e| AmsError::json(path, e))?;
    Ok(Some(value))
}

/// Owns `{bookRoot}` and resolves every per-book/per-chapter artifact path
/// named in the file layout (spec §6).
#[derive(Clone)]
pub struct ArtifactResolver {
    book_root: PathBuf,
}

impl ArtifactResolver {
    pub fn new(book_root: impl Into<PathBuf>) -> Self {
        Self { book_root: book_root.into() }
    }

    pub fn book_index_path(&self) -> PathBuf {
        self.book_root.join("book-index.json")
    }

    pub fn chapter_dir(&self, chapter_id: &str) -> PathBuf {
        self.book_root.join(chapter_id)
    }

    pub fn asr_json_path(&self, chapter_id: &str) -> PathBuf {
        self.chapter_dir(chapter_id).join(format!("{chapter_id}.asr.json"))
    }

    pub fn asr_corpus_path(&self, chapter_id: &str) -> PathBuf {
        self.chapter_dir(chapter_id).join(format!("{chapter_id}.asr.corpus.txt"))
    }

    pub fn anchors_path(&self, chapter_id: &str) -> PathBuf {
        self.chapter_dir(chapter_id).join(format!("{chapter_id}.align.anchors.json"))
    }

    pub fn transcript_index_path(&self, chapter_id: &str) -> PathBuf {
        self.chapter_dir(chapter_id).join(format!("{chapter_id}.align.tx.json"))
    }

    pub fn hydrated_transcript_path(&self, chapter_id: &str) -> PathBuf {
        self.chapter_dir(chapter_id).join(format!("{chapter_id}.align.hydrate.json"))
    }

    pub fn text_grid_path(&self, chapter_id: &str) -> PathBuf {
        self.chapter_dir(chapter_id).join("alignment").join("mfa").join(format!("{chapter_id}.TextGrid"))
    }

    pub fn pause_adjustments_path(&self, chapter_id: &str) -> PathBuf {
        self.chapter_dir(chapter_id).join(format!("{chapter_id}.pause-adjustments.json"))
    }

    pub fn pause_policy_path(&self, chapter_id: &str) -> PathBuf {
        self.chapter_dir(chapter_id).join(format!("{chapter_id}.pause-policy.json"))
    }

    /// Generic JSON slot: lazy-loads from `path`, atomically writes on save.
    pub fn json_slot<T>(&self, path: PathBuf) -> DocumentSlot<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + 'static,
    {
        let load_path = path.clone();
        let save_path = path;
        DocumentSlot::new(Box::new(move || read_json(&load_path)), Box::new(move |v: &T| atomic_write_json(&save_path, v)))
    }

    /// `PausePolicy` falls back to a house default when absent (spec §4.10).
    pub fn json_slot_with_default<T>(&self, path: PathBuf, default: T) -> DocumentSlot<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + 'static,
    {
        let load_path = path.clone();
        let save_path = path;
        DocumentSlot::new(
            Box::new(move || Ok(Some(read_json(&load_path)?.unwrap_or_else(|| default.clone())))),
            Box::new(move |v: &T| atomic_write_json(&save_path, v)),
        )
    }

    /// The ASR corpus text artifact is plain text, not JSON.
    pub fn text_slot(&self, path: PathBuf) -> DocumentSlot<String> {
        let load_path = path.clone();
        let save_path = path;
        DocumentSlot::new(
            Box::new(move || {
                if !load_path.exists() {
                    return Ok(None);
                }
                std::fs::read_to_string(&load_path).map(Some).map_err(|e| AmsError::io(&load_path, e))
            }),
            Box::new(move |v: &String| atomic_write_text(&save_path, v)),
        )
    }

    /// TextGrid is read-only from the core's perspective — the external
    /// aligner writes it (spec §4.10).
    pub fn text_grid_slot(&self, path: PathBuf) -> DocumentSlot<String> {
        let load_path = path.clone();
        DocumentSlot::new(
            Box::new(move || {
                if !load_path.exists() {
                    return Ok(None);
                }
                std::fs::read_to_string(&load_path).map(Some).map_err(|e| AmsError::io(&load_path, e))
            }),
            Box::new(|_: &String| Err(AmsError::Internal("TextGrid slot is read-only".into()))),
        )
    }
}
