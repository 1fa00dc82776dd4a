//! Coarse "skeleton" sections from peaks in the inter-window change curve.

use super::{AnalysisError, Result};
use crate::model::{Section, Window};
use crate::similarity::euclidean_distance;
use serde::{Deserialize, Serialize};

/// Gaussian kernel radius in standard deviations.
const GAUSSIAN_TRUNCATE: f64 = 4.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonConfig {
    /// Standard deviation (in windows) of the change-curve smoothing kernel.
    pub smooth_sigma: f64,
    /// Shortest section (seconds) a boundary may close.
    pub min_section_length: f64,
    /// Adaptive threshold as a fraction of the curve maximum.
    pub peak_ratio: f64,
    /// Absolute threshold; overrides `peak_ratio` when set.
    pub change_threshold: Option<f64>,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            smooth_sigma: 2.0,
            min_section_length: 3.0,
            peak_ratio: 0.8,
            change_threshold: None,
        }
    }
}

impl SkeletonConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.smooth_sigma.is_finite() && self.smooth_sigma >= 0.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "smooth_sigma must be non-negative, got {}",
                self.smooth_sigma
            )));
        }
        validate_min_length(self.min_section_length)?;
        if !self.peak_ratio.is_finite() {
            return Err(AnalysisError::InvalidParameter(format!(
                "peak_ratio must be finite, got {}",
                self.peak_ratio
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_min_length(min_section_length: f64) -> Result<()> {
    if !(min_section_length.is_finite() && min_section_length >= 0.0) {
        return Err(AnalysisError::InvalidParameter(format!(
            "min_section_length must be non-negative, got {min_section_length}"
        )));
    }
    Ok(())
}

/// Distance between each window and its predecessor, smoothed with a
/// Gaussian of `smooth_sigma` windows. The first value is always derived from 0.
pub fn compute_state_changes(windows: &[Window], smooth_sigma: f64) -> Result<Vec<f64>> {
    let mut diffs = Vec::with_capacity(windows.len());
    if !windows.is_empty() {
        diffs.push(0.0);
    }
    for pair in windows.windows(2) {
        diffs.push(euclidean_distance(&pair[1].features, &pair[0].features));
    }
    gaussian_smooth(&diffs, smooth_sigma)
}

/// 1-D Gaussian filter with half-sample symmetric reflection at the edges.
///
/// The kernel spans `floor(4σ + 0.5)` samples on either side and is normalized
/// to unit sum. `σ = 0` returns the input unchanged.
pub fn gaussian_smooth(values: &[f64], sigma: f64) -> Result<Vec<f64>> {
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(AnalysisError::InvalidParameter(format!(
            "smoothing sigma must be non-negative, got {sigma}"
        )));
    }
    if sigma == 0.0 || values.is_empty() {
        return Ok(values.to_vec());
    }

    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as i64;
    let mut weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x * x) as f64 / (sigma * sigma)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }

    let n = values.len() as i64;
    let smoothed = (0..n)
        .map(|i| {
            weights
                .iter()
                .zip(-radius..=radius)
                .map(|(w, offset)| w * values[reflect(i + offset, n)])
                .sum()
        })
        .collect();
    Ok(smoothed)
}

/// Map any index onto `0..n` by mirroring about the half-sample edges
/// (`d c b a | a b c d | d c b a`), repeating for far-out indices.
fn reflect(i: i64, n: i64) -> usize {
    let period = 2 * n;
    let m = i.rem_euclid(period);
    (if m < n { m } else { period - 1 - m }) as usize
}

/// Boundary threshold for a change curve: the absolute override if given,
/// otherwise `peak_ratio` times the curve maximum.
///
/// This is the only place the segmentation looks at the whole curve at once.
pub fn change_threshold(changes: &[f64], peak_ratio: f64, absolute: Option<f64>) -> Result<f64> {
    if let Some(threshold) = absolute {
        return Ok(threshold);
    }
    let max = changes
        .iter()
        .copied()
        .reduce(f64::max)
        .ok_or_else(|| AnalysisError::InsufficientData("change curve is empty".to_string()))?;
    Ok(peak_ratio * max)
}

/// Cut the windows into contiguous sections at strong change peaks.
///
/// A candidate boundary sits at an interior index whose change value exceeds
/// the threshold and both neighbours. It is accepted only if the section it
/// closes is at least `min_section_length` long; a rejected peak leaves the
/// running section start untouched. The trailing section, running to the last
/// window's end, is kept under the same length test and otherwise dropped.
pub fn extract_skeleton_sections(
    windows: &[Window],
    changes: &[f64],
    config: &SkeletonConfig,
) -> Result<Vec<Section>> {
    config.validate()?;
    let (Some(first), Some(last)) = (windows.first(), windows.last()) else {
        return Err(AnalysisError::InsufficientData(
            "cannot segment zero windows".to_string(),
        ));
    };
    if changes.len() != windows.len() {
        return Err(AnalysisError::InvalidParameter(format!(
            "{} change values for {} windows",
            changes.len(),
            windows.len()
        )));
    }

    let threshold = change_threshold(changes, config.peak_ratio, config.change_threshold)?;
    log::debug!("Skeleton threshold {:.4} over {} windows", threshold, windows.len());

    let mut sections = Vec::new();
    let mut current_start = first.start;

    for i in 1..changes.len().saturating_sub(1) {
        let is_peak = changes[i] > threshold
            && changes[i] > changes[i - 1]
            && changes[i] > changes[i + 1];
        if !is_peak {
            continue;
        }

        let candidate_end = windows[i].start;
        if closes_section(current_start, candidate_end, config.min_section_length) {
            sections.push(Section::new(current_start, candidate_end));
            current_start = candidate_end;
        } else {
            log::trace!("Skeleton peak at {:.2}s vetoed by min length", candidate_end);
        }
    }

    if closes_section(current_start, last.end, config.min_section_length) {
        sections.push(Section::new(current_start, last.end));
    }

    log::debug!("Extracted {} skeleton sections", sections.len());
    Ok(sections)
}

/// True if `[start, end)` is a non-empty span of at least `min_length` seconds.
pub(crate) fn closes_section(start: f64, end: f64, min_length: f64) -> bool {
    end > start && end - start >= min_length
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_windows(values: &[f64], hop: f64, width: f64) -> Vec<Window> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Window {
                start: i as f64 * hop,
                end: i as f64 * hop + width,
                features: vec![v],
            })
            .collect()
    }

    fn assert_ordered(sections: &[Section]) {
        for s in sections {
            assert!(s.end > s.start);
        }
        for pair in sections.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn test_flat_curve_has_no_boundaries() {
        let windows = scalar_windows(&[3.0; 5], 1.0, 1.0);
        let changes = compute_state_changes(&windows, 2.0).unwrap();
        assert_eq!(changes.len(), 5);
        assert!(changes.iter().all(|&c| c == 0.0));

        let config = SkeletonConfig {
            min_section_length: 2.0,
            ..SkeletonConfig::default()
        };
        let sections = extract_skeleton_sections(&windows, &changes, &config).unwrap();
        // One section spanning everything, no spurious cuts
        assert_eq!(sections, vec![Section::new(0.0, 5.0)]);
    }

    #[test]
    fn test_single_clear_transition() {
        let values = [0.0, 0.0, 0.0, 0.0, 0.0, 10.0, 10.0, 10.0, 10.0, 10.0];
        let windows = scalar_windows(&values, 1.0, 1.0);
        let changes = compute_state_changes(&windows, 2.0).unwrap();
        let config = SkeletonConfig {
            min_section_length: 2.0,
            peak_ratio: 0.6,
            ..SkeletonConfig::default()
        };
        let sections = extract_skeleton_sections(&windows, &changes, &config).unwrap();
        assert_eq!(sections, vec![Section::new(0.0, 5.0), Section::new(5.0, 10.0)]);
    }

    #[test]
    fn test_min_length_vetoes_close_second_peak() {
        // Two peaks 0.1s apart (indices 100 and 102 at 0.05s hop)
        let windows = scalar_windows(&[0.0; 200], 0.05, 1.5);
        let mut changes = vec![0.0; 200];
        changes[100] = 1.0;
        changes[102] = 1.0;
        let config = SkeletonConfig {
            min_section_length: 4.0,
            peak_ratio: 0.6,
            ..SkeletonConfig::default()
        };
        let sections = extract_skeleton_sections(&windows, &changes, &config).unwrap();
        assert_eq!(sections.len(), 2);
        assert!((sections[0].end - 5.0).abs() < 1e-9);
        assert_eq!(sections[0].end, sections[1].start);
        assert!((sections[1].end - (199.0 * 0.05 + 1.5)).abs() < 1e-9);
        assert_ordered(&sections);
    }

    #[test]
    fn test_rejected_peak_does_not_reset_start() {
        // Peak at t=1 is too early; peak at t=5 closes a section from t=0
        let windows = scalar_windows(&[0.0; 10], 1.0, 1.0);
        let changes = vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let config = SkeletonConfig {
            min_section_length: 3.0,
            peak_ratio: 0.5,
            ..SkeletonConfig::default()
        };
        let sections = extract_skeleton_sections(&windows, &changes, &config).unwrap();
        assert_eq!(sections, vec![Section::new(0.0, 5.0), Section::new(5.0, 10.0)]);
    }

    #[test]
    fn test_short_tail_is_dropped() {
        // Known boundary condition: the span after the last cut is shorter than
        // min_section_length, so it is left un-sectioned
        let windows = scalar_windows(&[0.0; 10], 1.0, 1.0);
        let mut changes = vec![0.0; 10];
        changes[7] = 1.0;
        let config = SkeletonConfig {
            min_section_length: 4.0,
            peak_ratio: 0.5,
            ..SkeletonConfig::default()
        };
        let sections = extract_skeleton_sections(&windows, &changes, &config).unwrap();
        assert_eq!(sections, vec![Section::new(0.0, 7.0)]);
    }

    #[test]
    fn test_absolute_threshold_overrides_ratio() {
        let windows = scalar_windows(&[0.0; 10], 1.0, 1.0);
        let changes = vec![0.0, 0.0, 0.0, 0.0, 0.4, 0.0, 0.0, 0.0, 0.0, 0.0];
        let config = SkeletonConfig {
            min_section_length: 1.0,
            peak_ratio: 0.6,
            change_threshold: Some(0.5),
            ..SkeletonConfig::default()
        };
        let sections = extract_skeleton_sections(&windows, &changes, &config).unwrap();
        assert_eq!(sections, vec![Section::new(0.0, 10.0)]);
    }

    #[test]
    fn test_zero_windows_is_insufficient_data() {
        let result = extract_skeleton_sections(&[], &[], &SkeletonConfig::default());
        assert!(matches!(result, Err(AnalysisError::InsufficientData(_))));
        assert!(matches!(
            change_threshold(&[], 0.8, None),
            Err(AnalysisError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_gaussian_preserves_mass_and_symmetry() {
        let mut impulse = vec![0.0; 41];
        impulse[20] = 1.0;
        let smoothed = gaussian_smooth(&impulse, 2.0).unwrap();
        let total: f64 = smoothed.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        for k in 1..=8 {
            assert!((smoothed[20 - k] - smoothed[20 + k]).abs() < 1e-15);
        }
        assert!(smoothed[20] > smoothed[19]);
    }

    #[test]
    fn test_gaussian_reflects_short_input() {
        // A constant stays constant however short the input is
        let smoothed = gaussian_smooth(&[2.0, 2.0], 2.0).unwrap();
        assert!(smoothed.iter().all(|v| (v - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_reflect_indices() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(9, 4), 1);
    }

    #[test]
    fn test_negative_sigma_rejected() {
        assert!(matches!(
            gaussian_smooth(&[1.0], -1.0),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }
}
