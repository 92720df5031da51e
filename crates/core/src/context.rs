//! Book and chapter contexts (spec §4.12, C13): per-book state (the book
//! index slot, the chapter descriptor list), per-chapter state (document
//! slots, the resolved-section cache, decoded audio with eviction).
//!
//! Grounded on the teacher's `audio/io.rs` for WAV decoding, generalized
//! from a one-shot load into a managed, evictable cache since chapters are
//! opened and closed repeatedly over a book run.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};

use crate::anchors::{AnchorDocument, ChapterLabel};
use crate::book::model::{BookIndex, SectionRange};
use crate::docs::{ArtifactResolver, DocumentSlot};
use crate::error::{AmsError, Result};
use crate::hydrate::HydratedTranscript;
use crate::transcript::TranscriptIndex;

/// Decoded mono audio, normalized to `[-1, 1]` the way the teacher's
/// `read_wav` does (first channel only, int or float source).
pub struct AudioBuffer {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

pub fn read_wav_mono(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path).map_err(|e| AmsError::Internal(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_val = (1i64 << (bits - 1)) as f64;
            reader
                .into_samples::<i32>()
                .enumerate()
                .filter_map(|(i, s)| if i % channels == 0 { Some(s.map(|v| v as f64 / max_val)) } else { None })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AmsError::Internal(format!("{}: {e}", path.display())))?
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .enumerate()
            .filter_map(|(i, s)| if i % channels == 0 { Some(s.map(|v| v as f64)) } else { None })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AmsError::Internal(format!("{}: {e}", path.display())))?,
    };

    Ok(AudioBuffer { samples, sample_rate: spec.sample_rate })
}

pub fn wav_duration_sec(path: &Path) -> Result<f64> {
    let reader = WavReader::open(path).map_err(|e| AmsError::Internal(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as f64;
    Ok(reader.len() as f64 / channels / spec.sample_rate as f64)
}

/// Loads decoded audio on demand and evicts least-recently-used buffers
/// once `max_resident` is exceeded — audio buffers are the largest thing
/// held in memory during a run, so only a handful of chapters stay decoded
/// at once (spec §4.12).
pub struct AudioBufferManager {
    max_resident: usize,
    order: VecDeque<String>,
    buffers: std::collections::HashMap<String, AudioBuffer>,
}

impl AudioBufferManager {
    pub fn new(max_resident: usize) -> Self {
        Self { max_resident: max_resident.max(1), order: VecDeque::new(), buffers: std::collections::HashMap::new() }
    }

    /// Decodes `path` under `chapter_id` if not already resident, touching
    /// its recency, and evicts the least-recently-used entry if that pushes
    /// the manager over `max_resident`.
    pub fn get_or_load(&mut self, chapter_id: &str, path: &Path) -> Result<&AudioBuffer> {
        if !self.buffers.contains_key(chapter_id) {
            let buffer = read_wav_mono(path)?;
            self.buffers.insert(chapter_id.to_string(), buffer);
            self.order.push_back(chapter_id.to_string());
            while self.buffers.len() > self.max_resident {
                if let Some(oldest) = self.order.pop_front() {
                    if oldest != chapter_id {
                        self.buffers.remove(&oldest);
                    } else {
                        // Never evict the entry we just loaded.
                        self.order.push_front(oldest);
                        break;
                    }
                }
            }
        } else {
            self.order.retain(|id| id != chapter_id);
            self.order.push_back(chapter_id.to_string());
        }
        Ok(self.buffers.get(chapter_id).expect("just inserted or already resident"))
    }

    pub fn evict(&mut self, chapter_id: &str) {
        self.buffers.remove(chapter_id);
        self.order.retain(|id| id != chapter_id);
    }

    pub fn resident_count(&self) -> usize {
        self.buffers.len()
    }
}

/// A book's chapters in reading order; `id` matches the directory name under
/// the artifact resolver's book root.
#[derive(Debug, Clone)]
pub struct ChapterDescriptor {
    pub id: String,
    pub audio_path: PathBuf,
    pub labels: Vec<ChapterLabel>,
}

#[derive(Debug, Clone, Default)]
pub struct ChapterManager {
    descriptors: Vec<ChapterDescriptor>,
}

impl ChapterManager {
    pub fn new(descriptors: Vec<ChapterDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn find(&self, chapter_id: &str) -> Option<&ChapterDescriptor> {
        self.descriptors.iter().find(|d| d.id == chapter_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChapterDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Per-book state: the shared `BookIndex` slot and the chapter list.
/// Opening a chapter (`open_chapter`) is O(1); the chapter's own documents
/// stay unloaded until first accessed through its slots.
pub struct BookContext {
    resolver: ArtifactResolver,
    book_index: DocumentSlot<BookIndex>,
    chapters: ChapterManager,
}

impl BookContext {
    pub fn new(book_root: impl Into<PathBuf>, chapters: ChapterManager) -> Self {
        let resolver = ArtifactResolver::new(book_root);
        let book_index = resolver.json_slot(resolver.book_index_path());
        Self { resolver, book_index, chapters }
    }

    pub fn resolver(&self) -> &ArtifactResolver {
        &self.resolver
    }

    pub fn chapters(&self) -> &ChapterManager {
        &self.chapters
    }

    pub fn book_index(&mut self) -> Result<Option<&BookIndex>> {
        self.book_index.get_value()
    }

    pub fn set_book_index(&mut self, index: BookIndex) -> Result<()> {
        self.book_index.set_value(index)
    }

    pub fn save(&mut self) -> Result<()> {
        self.book_index.save()
    }

    /// O(1): looks up the descriptor and constructs lazily-loading slots;
    /// nothing is read from disk until the caller touches a slot.
    pub fn open_chapter(&self, chapter_id: &str, audio_resident_limit: usize) -> Result<ChapterContext> {
        let descriptor = self
            .chapters
            .find(chapter_id)
            .ok_or_else(|| AmsError::InputMissing { path: PathBuf::from(chapter_id) })?
            .clone();
        Ok(ChapterContext::new(self.resolver.clone(), descriptor, audio_resident_limit))
    }
}

/// Per-chapter state: lazily-loaded document slots, the section-resolution
/// cache, and the audio buffer manager.
pub struct ChapterContext {
    pub descriptor: ChapterDescriptor,
    resolver: ArtifactResolver,
    anchors: DocumentSlot<AnchorDocument>,
    transcript_index: DocumentSlot<TranscriptIndex>,
    hydrated: DocumentSlot<HydratedTranscript>,
    resolved_section: Option<SectionRange>,
    audio: AudioBufferManager,
}

impl ChapterContext {
    fn new(resolver: ArtifactResolver, descriptor: ChapterDescriptor, audio_resident_limit: usize) -> Self {
        let anchors = resolver.json_slot(resolver.anchors_path(&descriptor.id));
        let transcript_index = resolver.json_slot(resolver.transcript_index_path(&descriptor.id));
        let hydrated = resolver.json_slot(resolver.hydrated_transcript_path(&descriptor.id));
        Self {
            descriptor,
            resolver,
            anchors,
            transcript_index,
            hydrated,
            resolved_section: None,
            audio: AudioBufferManager::new(audio_resident_limit),
        }
    }

    pub fn anchors(&mut self) -> Result<Option<&AnchorDocument>> {
        self.anchors.get_value()
    }

    pub fn transcript_index(&mut self) -> Result<Option<&TranscriptIndex>> {
        self.transcript_index.get_value()
    }

    pub fn hydrated(&mut self) -> Result<Option<&HydratedTranscript>> {
        self.hydrated.get_value()
    }

    pub fn set_anchors(&mut self, doc: AnchorDocument) -> Result<()> {
        self.anchors.set_value(doc)
    }

    pub fn set_transcript_index(&mut self, index: TranscriptIndex) -> Result<()> {
        self.transcript_index.set_value(index)
    }

    pub fn set_hydrated(&mut self, transcript: HydratedTranscript) -> Result<()> {
        self.hydrated.set_value(transcript)
    }

    /// Cached by `resolve_section`'s caller; cleared whenever this context
    /// is reopened (spec §4.4 "result cached on the chapter").
    pub fn resolved_section(&self) -> Option<&SectionRange> {
        self.resolved_section.as_ref()
    }

    pub fn cache_resolved_section(&mut self, section: Option<SectionRange>) {
        self.resolved_section = section;
    }

    pub fn audio(&mut self) -> Result<&AudioBuffer> {
        let path = self.descriptor.audio_path.clone();
        self.audio.get_or_load(&self.descriptor.id, &path)
    }

    /// Flushes every dirty slot (spec §4.12 "saving a chapter flushes all
    /// dirty slots").
    pub fn save(&mut self) -> Result<()> {
        self.anchors.save()?;
        self.transcript_index.save()?;
        self.hydrated.save()?;
        Ok(())
    }

    pub fn resolver(&self) -> &ArtifactResolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_wav(path: &Path, samples_i16: &[i16], sample_rate: u32) {
        let spec = hound::WavSpec { channels: 1, sample_rate, bits_per_sample: 16, sample_format: SampleFormat::Int };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for s in samples_i16 {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn reads_mono_wav_and_computes_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ch01.wav");
        write_test_wav(&path, &[0, 16384, -16384, 0], 4);
        let buf = read_wav_mono(&path).unwrap();
        assert_eq!(buf.samples.len(), 4);
        assert!((buf.duration_sec() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn audio_manager_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        let c = dir.path().join("c.wav");
        for p in [&a, &b, &c] {
            write_test_wav(p, &[0, 0], 2);
        }
        let mut mgr = AudioBufferManager::new(2);
        mgr.get_or_load("a", &a).unwrap();
        mgr.get_or_load("b", &b).unwrap();
        assert_eq!(mgr.resident_count(), 2);
        mgr.get_or_load("c", &c).unwrap();
        assert_eq!(mgr.resident_count(), 2);
        assert!(!mgr.buffers.contains_key("a"));
        assert!(mgr.buffers.contains_key("c"));
    }

    #[test]
    fn chapter_manager_finds_by_id() {
        let chapters = ChapterManager::new(vec![ChapterDescriptor {
            id: "ch01".into(),
            audio_path: PathBuf::from("ch01.wav"),
            labels: vec![],
        }]);
        assert!(chapters.find("ch01").is_some());
        assert!(chapters.find("ch02").is_none());
    }

    #[test]
    fn open_chapter_is_lazy_and_section_cache_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let chapters = ChapterManager::new(vec![ChapterDescriptor {
            id: "ch01".into(),
            audio_path: dir.path().join("ch01.wav"),
            labels: vec![],
        }]);
        let book = BookContext::new(dir.path(), chapters);
        let chapter = book.open_chapter("ch01", 1).unwrap();
        assert!(chapter.resolved_section().is_none());
    }
}
