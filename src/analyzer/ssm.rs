//! Self-similarity matrix and checkerboard-novelty segmentation.

use super::peaks::find_peaks;
use super::skeleton::{closes_section, validate_min_length};
use super::{AnalysisError, Result};
use crate::model::Section;
use crate::similarity::{Matrix, cosine_matrix};
use serde::{Deserialize, Serialize};

/// Guards the row normalization against all-zero feature vectors.
const SSM_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoveltyConfig {
    /// Half-width `k` of the `2k × 2k` checkerboard kernel, in windows.
    pub kernel_size: usize,
    /// Minimum prominence of a novelty peak to become a boundary.
    pub peak_prominence: f64,
    /// Shortest section (seconds) a boundary may close.
    pub min_section_length: f64,
}

impl Default for NoveltyConfig {
    fn default() -> Self {
        Self {
            kernel_size: 8,
            peak_prominence: 0.25,
            min_section_length: 4.0,
        }
    }
}

impl NoveltyConfig {
    /// Check the parameters against the number of windows to be analyzed.
    pub fn validate(&self, n_windows: usize) -> Result<()> {
        validate_kernel(self.kernel_size, n_windows)?;
        validate_min_length(self.min_section_length)?;
        if !self.peak_prominence.is_finite() {
            return Err(AnalysisError::InvalidParameter(format!(
                "peak_prominence must be finite, got {}",
                self.peak_prominence
            )));
        }
        Ok(())
    }
}

fn validate_kernel(kernel_size: usize, n: usize) -> Result<()> {
    if kernel_size == 0 {
        return Err(AnalysisError::InvalidParameter(
            "kernel_size must be positive".to_string(),
        ));
    }
    if 2 * kernel_size >= n {
        return Err(AnalysisError::InvalidParameter(format!(
            "kernel_size {kernel_size} needs more than {} windows, got {n}",
            2 * kernel_size
        )));
    }
    Ok(())
}

/// Cosine self-similarity of every pair of feature vectors.
///
/// The result is symmetric with a unit diagonal for any non-zero vector.
pub fn compute_ssm(features: &[Vec<f64>]) -> Result<Matrix> {
    if features.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "cannot build a similarity matrix from zero windows".to_string(),
        ));
    }
    Ok(cosine_matrix(features, SSM_EPSILON))
}

/// `2k × 2k` kernel: `+1` on the two diagonal `k × k` blocks, `-1` elsewhere.
pub fn checkerboard_kernel(size: usize) -> Matrix {
    (0..2 * size)
        .map(|r| {
            (0..2 * size)
                .map(|c| if (r < size) == (c < size) { 1.0 } else { -1.0 })
                .collect()
        })
        .collect()
}

/// Slide the checkerboard kernel along the SSM diagonal.
///
/// Bins closer than `kernel_size` to either end stay zero. The curve is
/// divided by its maximum when that maximum is positive.
pub fn compute_novelty_curve(ssm: &Matrix, kernel_size: usize) -> Result<Vec<f64>> {
    let n = ssm.len();
    validate_kernel(kernel_size, n)?;

    let k = kernel_size;
    let kernel = checkerboard_kernel(k);
    let mut novelty = vec![0.0_f64; n];

    for (i, value) in novelty.iter_mut().enumerate().take(n - k).skip(k) {
        let mut sum = 0.0;
        for (a, kernel_row) in kernel.iter().enumerate() {
            let ssm_row = &ssm[i - k + a];
            for (b, &weight) in kernel_row.iter().enumerate() {
                sum += ssm_row[i - k + b] * weight;
            }
        }
        *value = sum;
    }

    let max = novelty.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        for v in &mut novelty {
            *v /= max;
        }
    }

    Ok(novelty)
}

/// Turn prominent novelty peaks into sections.
///
/// Each peak's time is a candidate boundary; it is accepted only if at least
/// `min_section_length` seconds have passed since the previously accepted
/// boundary (initially `times[0]`). A final section runs from the last
/// accepted boundary to `times[last]` under the same test.
pub fn novelty_segmentation(
    times: &[f64],
    novelty: &[f64],
    peak_prominence: f64,
    min_section_length: f64,
) -> Result<Vec<Section>> {
    validate_min_length(min_section_length)?;
    let (Some(&first), Some(&last)) = (times.first(), times.last()) else {
        return Err(AnalysisError::InsufficientData(
            "cannot segment an empty novelty curve".to_string(),
        ));
    };
    if times.len() != novelty.len() {
        return Err(AnalysisError::InvalidParameter(format!(
            "{} timestamps for {} novelty values",
            times.len(),
            novelty.len()
        )));
    }

    let peaks = find_peaks(novelty, peak_prominence);
    log::debug!("Novelty curve has {} prominent peaks", peaks.len());

    let mut sections = Vec::new();
    let mut prev = first;
    for peak in &peaks {
        let boundary = times[peak.index];
        if closes_section(prev, boundary, min_section_length) {
            sections.push(Section::new(prev, boundary));
            prev = boundary;
        }
    }

    if closes_section(prev, last, min_section_length) {
        sections.push(Section::new(prev, last));
    }

    log::debug!("Extracted {} novelty sections", sections.len());
    Ok(sections)
}
