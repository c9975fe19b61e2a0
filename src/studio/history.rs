//! In-memory creation history.

use crate::error::Result;
use crate::image::{AspectRatio, GeneratedImage};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// One generated image together with what produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Unique id, also used for the download filename.
    pub id: Uuid,
    /// The generated image.
    pub image: GeneratedImage,
    /// Prompt as submitted.
    pub prompt: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Model that produced the image.
    pub model: String,
    /// Aspect ratio requested.
    pub aspect_ratio: AspectRatio,
}

impl HistoryEntry {
    /// Wraps a fresh image with a new id and the current time.
    pub fn new(image: GeneratedImage, prompt: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let model = image.model.clone();
        Self {
            id: Uuid::new_v4(),
            image,
            prompt: prompt.into(),
            timestamp_ms,
            model,
            aspect_ratio,
        }
    }

    /// The image as a data URL.
    pub fn url(&self) -> String {
        self.image.to_data_url()
    }

    /// `lumina-<id>.<ext>`
    pub fn default_filename(&self) -> String {
        format!("lumina-{}.{}", self.id, self.image.format.extension())
    }

    /// Short model label: the first three dash-separated words.
    ///
    /// `gemini-3-pro-image-preview` becomes `gemini 3 pro`.
    pub fn model_badge(&self) -> String {
        self.model.split('-').take(3).collect::<Vec<_>>().join(" ")
    }

    /// Writes the image into `dir` under its default filename.
    pub fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.default_filename());
        self.image.save(&path)?;
        Ok(path)
    }
}

/// Newest-first list of everything generated this session.
///
/// Nothing is ever evicted; the list lives until the session ends or the
/// user clears it.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry as the newest.
    pub fn push_front(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been generated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, newest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    /// Every entry except the newest one.
    pub fn previous(&self) -> &[HistoryEntry] {
        self.entries.get(1..).unwrap_or_default()
    }

    /// Looks up an entry by id.
    pub fn get(&self, id: Uuid) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Looks up an entry by position (0 is newest).
    pub fn get_index(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
