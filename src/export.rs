use crate::model::MusicStructure;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// On-disk format of an analysis result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    #[value(alias = "yml")]
    Yaml,
}

impl ExportFormat {
    /// Pick the format from a file extension; anything but `.yaml`/`.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Render a structure in the given format.
pub fn render(structure: &MusicStructure, format: ExportFormat) -> Result<String, ExportError> {
    Ok(match format {
        ExportFormat::Json => serde_json::to_string_pretty(structure)?,
        ExportFormat::Yaml => serde_yaml::to_string(structure)?,
    })
}

/// Write a structure to `path`, creating parent directories as needed.
pub fn export_music_structure(
    path: &Path,
    structure: &MusicStructure,
    format: ExportFormat,
) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, render(structure, format)?)?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Event, EventKind, FeatureName, Section};
    use std::collections::{BTreeMap, BTreeSet};

    fn sample() -> MusicStructure {
        let mut adjacency = BTreeMap::new();
        adjacency.insert(0, BTreeSet::from([2]));
        adjacency.insert(1, BTreeSet::new());
        adjacency.insert(2, BTreeSet::from([0]));
        MusicStructure {
            skeleton_sections: vec![
                Section::new(0.0, 4.0),
                Section::new(4.0, 8.5),
                Section::new(8.5, 12.0),
            ],
            ssm_sections: vec![Section::new(0.0, 6.0)],
            repetition_adjacency: adjacency,
            salient_events: vec![Event {
                time: 2.5,
                kind: EventKind::Peak(FeatureName::MeanPitch),
                strength: 3.25,
            }],
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("a/b.yaml")), ExportFormat::Yaml);
        assert_eq!(ExportFormat::from_path(Path::new("b.YML")), ExportFormat::Yaml);
        assert_eq!(ExportFormat::from_path(Path::new("b.json")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("b")), ExportFormat::Json);
    }

    #[test]
    fn test_json_export_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/take.structure.json");
        let structure = sample();
        export_music_structure(&path, &structure, ExportFormat::Json).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["skeleton_sections"][1]["start"], 4.0);
        assert_eq!(value["repetition_adjacency"]["0"][0], 2);
        assert_eq!(value["salient_events"][0]["type"], "peak_mean_pitch");

        let back: MusicStructure = serde_json::from_str(&text).unwrap();
        assert_eq!(back, structure);
    }

    #[test]
    fn test_yaml_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.structure.yaml");
        export_music_structure(&path, &sample(), ExportFormat::Yaml).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("skeleton_sections:"));
        assert!(text.contains("peak_mean_pitch"));
        let back: MusicStructure = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, sample());
    }
}
