pub mod events;
pub mod features;
pub mod peaks;
pub mod repetition;
pub mod skeleton;
pub mod ssm;
pub mod themes;
pub mod windows;

use crate::config::AppConfig;
use crate::model::{FeatureFrame, MusicStructure, Note};
use crate::source::{self, SourceError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use events::EventConfig;
use features::FeatureCurveConfig;
use repetition::RepetitionConfig;
use skeleton::SkeletonConfig;
use ssm::NoveltyConfig;
use themes::ThemeConfig;
use windows::AggregationConfig;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failure of the whole per-file pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}

/// Parameters for every stage of the structure analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub features: FeatureCurveConfig,
    pub aggregation: AggregationConfig,
    pub skeleton: SkeletonConfig,
    pub novelty: NoveltyConfig,
    pub repetition: RepetitionConfig,
    pub events: EventConfig,
    pub theme: ThemeConfig,
}

/// Run the full structure analysis on a sorted note list.
///
/// Stages run in order and any failure aborts the rest, so a structure is
/// either complete or absent:
/// frames → windows → skeleton sections and novelty sections →
/// repetition relations between skeleton sections → salient events.
pub fn analyze_notes(notes: &[Note], config: &AnalysisConfig) -> Result<MusicStructure> {
    config.features.validate()?;
    config.aggregation.validate()?;
    config.skeleton.validate()?;
    config.repetition.validate()?;
    config.events.validate()?;
    config.theme.validate()?;

    let frames = features::build_feature_curve(notes, &config.features)?;

    let (times, vectors) = project_frames(&frames, config);
    let windows = windows::aggregate_windows(
        &times,
        &vectors,
        config.aggregation.window_size,
        config.aggregation.hop_size,
    )?;
    if windows.is_empty() {
        return Err(AnalysisError::InsufficientData(format!(
            "{} notes produced no observation windows",
            notes.len()
        )));
    }
    config.novelty.validate(windows.len())?;

    // Skeleton path
    let changes = skeleton::compute_state_changes(&windows, config.skeleton.smooth_sigma)?;
    let mut skeleton_sections =
        skeleton::extract_skeleton_sections(&windows, &changes, &config.skeleton)?;
    if config.theme.enabled {
        skeleton_sections = themes::refine_sections(notes, &skeleton_sections, &config.theme);
    }

    // Self-similarity path
    let window_features: Vec<Vec<f64>> = windows.iter().map(|w| w.features.clone()).collect();
    let window_starts: Vec<f64> = windows.iter().map(|w| w.start).collect();
    let ssm_matrix = ssm::compute_ssm(&window_features)?;
    let novelty = ssm::compute_novelty_curve(&ssm_matrix, config.novelty.kernel_size)?;
    let ssm_sections = ssm::novelty_segmentation(
        &window_starts,
        &novelty,
        config.novelty.peak_prominence,
        config.novelty.min_section_length,
    )?;

    let records = repetition::extract_section_features(&skeleton_sections, notes);
    let sim_matrix =
        repetition::compute_section_similarity(&records, &config.repetition.standardization())?;
    let repetition_adjacency = repetition::analyze_repetition(
        &records,
        &sim_matrix,
        config.repetition.repeat_threshold,
    )?;

    let salient_events = events::detect_salient_events(
        &frames,
        &skeleton_sections,
        &config.events.feature_names,
        config.events.peak_prominence,
    );

    log::info!(
        "Structure: {} skeleton sections, {} novelty sections, {} characterized, {} events",
        skeleton_sections.len(),
        ssm_sections.len(),
        records.len(),
        salient_events.len()
    );

    Ok(MusicStructure {
        skeleton_sections,
        ssm_sections,
        repetition_adjacency,
        salient_events,
    })
}

/// Load a note file and analyze it.
pub fn analyze_file(path: &Path, config: &AppConfig) -> std::result::Result<MusicStructure, PipelineError> {
    log::debug!(
        "Analyzing: {}",
        path.file_name().and_then(|f| f.to_str()).unwrap_or("?")
    );
    let notes = source::load_notes(path, &config.source)?;
    Ok(analyze_notes(&notes, &config.analysis)?)
}

/// Frame timestamps and frame vectors restricted to the aggregation features.
fn project_frames(frames: &[FeatureFrame], config: &AnalysisConfig) -> (Vec<f64>, Vec<Vec<f64>>) {
    frames
        .iter()
        .map(|f| (f.time, f.vector(&config.aggregation.features)))
        .unzip()
}
