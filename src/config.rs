use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::analyzer::AnalysisConfig;
use crate::source::SourceConfig;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Note loading and filtering.
    pub source: SourceConfig,
    /// Parameters for each analysis stage (`[analysis.skeleton]` etc).
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    /// Load config from `~/.config/songform/config.toml`.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path.
    /// Logs a warning and falls back to defaults if the file can't be read or parsed.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureName;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            workers = 3

            [source]
            min_velocity = 1

            [analysis.novelty]
            kernel_size = 4

            [analysis.events]
            feature_names = ["polyphony", "velocity_energy"]
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.source.min_velocity, 1);
        assert_eq!(config.source.min_duration, 0.05);
        assert_eq!(config.analysis.novelty.kernel_size, 4);
        assert_eq!(config.analysis.novelty.peak_prominence, 0.25);
        assert_eq!(
            config.analysis.events.feature_names,
            vec![FeatureName::Polyphony, FeatureName::VelocityEnergy]
        );
        assert_eq!(config.analysis.skeleton.peak_ratio, 0.8);
        assert!(!config.analysis.theme.enabled);
    }

    #[test]
    fn test_resolve_workers() {
        let explicit = AppConfig {
            workers: 5,
            ..AppConfig::default()
        };
        assert_eq!(explicit.resolve_workers(), 5);
        assert!(AppConfig::default().resolve_workers() >= 1);
    }

    #[test]
    fn test_load_from_falls_back_on_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "workers = \"many\"").unwrap();
        let config = AppConfig::load_from(&path);
        assert_eq!(config.workers, 0);

        let missing = AppConfig::load_from(&dir.path().join("absent.toml"));
        assert_eq!(missing.analysis.repetition.repeat_threshold, 0.85);
    }

    #[test]
    fn test_defaults_serialize_to_toml() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.analysis.aggregation.window_size, 1.5);
    }
}
