pub mod midi;

use crate::model::Note;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MIDI parse error: {0}")]
    Midi(#[from] midly::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Note filtering applied before analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Notes quieter than this are dropped.
    pub min_velocity: i32,
    /// Notes shorter than this (seconds) are dropped.
    pub min_duration: f64,
    /// Drop notes on the General MIDI percussion channel.
    pub skip_percussion: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            min_velocity: 20,
            min_duration: 0.05,
            skip_percussion: true,
        }
    }
}

/// Load a note list from a `.mid`/`.midi` file or a JSON array of notes.
///
/// The result is filtered by `config` and sorted by onset.
pub fn load_notes(path: &Path, config: &SourceConfig) -> Result<Vec<Note>, SourceError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let notes = match ext.as_str() {
        "mid" | "midi" => {
            let bytes = std::fs::read(path)?;
            midi::notes_from_midi(&bytes, config)?
        }
        "json" => {
            let contents = std::fs::read_to_string(path)?;
            let raw: Vec<Note> = serde_json::from_str(&contents)?;
            filter_and_sort(raw, config)
        }
        other => return Err(SourceError::UnsupportedFormat(other.to_string())),
    };

    log::debug!("Loaded {} notes from {}", notes.len(), path.display());
    Ok(notes)
}

/// Drop quiet and very short notes, then sort by onset (stable).
pub fn filter_and_sort(notes: Vec<Note>, config: &SourceConfig) -> Vec<Note> {
    let mut kept: Vec<Note> = notes
        .into_iter()
        .filter(|n| n.velocity >= config.min_velocity && n.duration >= config.min_duration)
        .collect();
    kept.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    kept
}
