//! Repetition / variation relations between sections.
//!
//! Each section is summarized by a small descriptor vector. Descriptors are
//! z-scored per column before cosine similarity, so in the default
//! population mode every similarity depends on the full set of sections:
//! adding or removing one section shifts all the others. A fixed reference
//! mode makes similarities independent of the population.

use super::features::polyphony_at;
use super::{AnalysisError, Result};
use crate::model::{AdjacencyMap, Note, Section, SectionFeatureRecord};
use crate::similarity::{Matrix, column_stats, cosine_matrix, standardize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sections with fewer member notes than this are not characterized.
pub const MIN_SECTION_NOTES: usize = 3;

/// Length of a section descriptor vector.
pub const DESCRIPTOR_DIM: usize = 5;

/// Added to column stds during standardization.
const STD_EPSILON: f64 = 1e-6;
/// Added to row norms before cosine similarity.
const NORM_EPSILON: f64 = 1e-6;

/// Column statistics to standardize descriptors against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStats {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

/// How descriptor columns are standardized before similarity.
#[derive(Debug, Clone, PartialEq)]
pub enum Standardization {
    /// Mean and std over the sections being compared.
    Population,
    /// Externally supplied statistics; similarities stay pairwise-local.
    Reference(ReferenceStats),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepetitionConfig {
    /// Minimum cosine similarity for two sections to be related.
    pub repeat_threshold: f64,
    /// Fixed statistics; population statistics are used when absent.
    pub reference: Option<ReferenceStats>,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            repeat_threshold: 0.85,
            reference: None,
        }
    }
}

impl RepetitionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.repeat_threshold.is_finite() {
            return Err(AnalysisError::InvalidParameter(format!(
                "repeat_threshold must be finite, got {}",
                self.repeat_threshold
            )));
        }
        if let Some(stats) = &self.reference {
            if stats.means.len() != DESCRIPTOR_DIM || stats.stds.len() != DESCRIPTOR_DIM {
                return Err(AnalysisError::InvalidParameter(format!(
                    "reference statistics must have {DESCRIPTOR_DIM} columns, got {} means and {} stds",
                    stats.means.len(),
                    stats.stds.len()
                )));
            }
            if stats.means.iter().chain(&stats.stds).any(|v| !v.is_finite()) {
                return Err(AnalysisError::InvalidParameter(
                    "reference statistics must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn standardization(&self) -> Standardization {
        match &self.reference {
            Some(stats) => Standardization::Reference(stats.clone()),
            None => Standardization::Population,
        }
    }
}

/// Summarize each section with at least [`MIN_SECTION_NOTES`] notes.
///
/// Membership is by onset in `[start, end)`. The descriptor is
/// `[mean pitch, pitch std, notes per second, mean |pitch step|, mean
/// polyphony at each member onset]`. Indices in later stages refer to the
/// returned (filtered) list.
pub fn extract_section_features(sections: &[Section], notes: &[Note]) -> Vec<SectionFeatureRecord> {
    let records: Vec<SectionFeatureRecord> = sections
        .iter()
        .filter_map(|section| {
            let members: Vec<Note> = notes
                .iter()
                .filter(|n| section.contains(n.start_time))
                .copied()
                .collect();
            if members.len() < MIN_SECTION_NOTES {
                log::trace!(
                    "Skipping section {:.2}-{:.2}s with {} notes",
                    section.start,
                    section.end,
                    members.len()
                );
                return None;
            }
            Some(SectionFeatureRecord {
                start: section.start,
                end: section.end,
                features: describe(&members, section.duration()),
            })
        })
        .collect();

    log::debug!(
        "{} of {} sections have enough notes for repetition analysis",
        records.len(),
        sections.len()
    );
    records
}

fn describe(members: &[Note], duration: f64) -> Vec<f64> {
    let n = members.len() as f64;
    let pitches: Vec<f64> = members.iter().map(|m| m.pitch as f64).collect();

    let mean = pitches.iter().sum::<f64>() / n;
    let std = (pitches.iter().map(|p| (p - mean) * (p - mean)).sum::<f64>() / n).sqrt();

    let steps: Vec<f64> = pitches.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let mean_step = if steps.is_empty() {
        0.0
    } else {
        steps.iter().sum::<f64>() / steps.len() as f64
    };

    let onset_polyphony = members
        .iter()
        .map(|m| polyphony_at(members, m.start_time) as f64)
        .sum::<f64>()
        / n;

    vec![mean, std, n / duration, mean_step, onset_polyphony]
}

/// The normalization pass: z-score every descriptor column.
pub fn standardize_descriptors(
    records: &[SectionFeatureRecord],
    mode: &Standardization,
) -> Result<Matrix> {
    let rows: Vec<Vec<f64>> = records.iter().map(|r| r.features.clone()).collect();
    let dim = rows.first().map_or(DESCRIPTOR_DIM, Vec::len);

    match mode {
        Standardization::Population => {
            let (means, stds) = column_stats(&rows, dim);
            Ok(standardize(&rows, &means, &stds, STD_EPSILON))
        }
        Standardization::Reference(stats) => {
            if stats.means.len() != dim || stats.stds.len() != dim {
                return Err(AnalysisError::InvalidParameter(format!(
                    "reference statistics must have {dim} columns, got {} means and {} stds",
                    stats.means.len(),
                    stats.stds.len()
                )));
            }
            Ok(standardize(&rows, &stats.means, &stats.stds, STD_EPSILON))
        }
    }
}

/// Cosine similarity between standardized section descriptors.
pub fn compute_section_similarity(
    records: &[SectionFeatureRecord],
    mode: &Standardization,
) -> Result<Matrix> {
    let standardized = standardize_descriptors(records, mode)?;
    Ok(cosine_matrix(&standardized, NORM_EPSILON))
}

/// Relate every pair of sections whose similarity reaches `repeat_threshold`.
///
/// Every record index gets an entry, empty if it relates to nothing. The
/// relation is symmetric.
pub fn analyze_repetition(
    records: &[SectionFeatureRecord],
    sim_matrix: &Matrix,
    repeat_threshold: f64,
) -> Result<AdjacencyMap> {
    let n = records.len();
    if sim_matrix.len() != n || sim_matrix.iter().any(|row| row.len() != n) {
        return Err(AnalysisError::InvalidParameter(format!(
            "similarity matrix does not match {n} sections"
        )));
    }

    let mut adjacency: AdjacencyMap = (0..n).map(|i| (i, BTreeSet::new())).collect();
    let mut pairs = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            if sim_matrix[i][j] >= repeat_threshold {
                adjacency.entry(i).or_default().insert(j);
                adjacency.entry(j).or_default().insert(i);
                pairs += 1;
            }
        }
    }

    log::debug!("{} repetition pairs among {} sections", pairs, n);
    Ok(adjacency)
}
