use super::features::validate_window;
use super::{AnalysisError, Result};
use crate::model::{FeatureName, Window};
use serde::{Deserialize, Serialize};

/// Parameters for re-aggregating frames into coarser observation windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub window_size: f64,
    pub hop_size: f64,
    /// Frame features carried into each window's vector, in order.
    pub features: Vec<FeatureName>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_size: 1.5,
            hop_size: 0.5,
            features: vec![
                FeatureName::NoteDensity,
                FeatureName::MeanPitch,
                FeatureName::PitchRange,
            ],
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<()> {
        validate_window(self.window_size, self.hop_size)?;
        if self.features.is_empty() {
            return Err(AnalysisError::InvalidParameter(
                "aggregation needs at least one feature".to_string(),
            ));
        }
        Ok(())
    }
}

/// Average time-stamped feature vectors over `[t, t + window_size)` windows.
///
/// Window starts run from `times[0]` in `hop_size` steps and stop before any
/// window would extend past `times[last]`, so the trailing partial window is
/// never emitted. Windows that catch no samples are left out entirely; callers
/// must tolerate hop-sized gaps between successive `Window::start` values.
pub fn aggregate_windows(
    times: &[f64],
    features: &[Vec<f64>],
    window_size: f64,
    hop_size: f64,
) -> Result<Vec<Window>> {
    validate_window(window_size, hop_size)?;
    if times.len() != features.len() {
        return Err(AnalysisError::InvalidParameter(format!(
            "{} timestamps but {} feature vectors",
            times.len(),
            features.len()
        )));
    }

    let (Some(&first), Some(&t_end)) = (times.first(), times.last()) else {
        return Ok(Vec::new());
    };
    let dim = features[0].len();

    let mut windows = Vec::new();
    let mut t = first;
    while t + window_size <= t_end {
        let end = t + window_size;
        let mut sum = vec![0.0_f64; dim];
        let mut members = 0usize;
        for (&time, vec) in times.iter().zip(features) {
            if time >= t && time < end {
                for (acc, &v) in sum.iter_mut().zip(vec) {
                    *acc += v;
                }
                members += 1;
            }
        }

        if members > 0 {
            windows.push(Window {
                start: t,
                end,
                features: sum.into_iter().map(|s| s / members as f64).collect(),
            });
        }
        t += hop_size;
    }

    log::debug!(
        "Aggregated {} samples into {} windows ({}s / {}s)",
        times.len(),
        windows.len(),
        window_size,
        hop_size
    );

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_trailing_partial_window() {
        let times: Vec<f64> = (0..5).map(|i| i as f64 * 0.5).collect(); // 0.0 .. 2.0
        let feats: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64]).collect();
        let windows = aggregate_windows(&times, &feats, 1.5, 0.5).unwrap();
        // t=0.0 (end 1.5) and t=0.5 (end 2.0); t=1.0 would end at 2.5 > 2.0
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, 0.0);
        assert_eq!(windows[0].end, 1.5);
        assert_eq!(windows[1].start, 0.5);
    }

    #[test]
    fn test_window_mean_of_members() {
        let times = vec![0.0, 0.5, 1.0, 1.5, 2.0];
        let feats = vec![
            vec![1.0, 10.0],
            vec![2.0, 20.0],
            vec![3.0, 30.0],
            vec![4.0, 40.0],
            vec![5.0, 50.0],
        ];
        let windows = aggregate_windows(&times, &feats, 1.5, 0.5).unwrap();
        // [0, 1.5) holds samples at 0.0, 0.5, 1.0
        assert_eq!(windows[0].features, vec![2.0, 20.0]);
        // [0.5, 2.0) holds 0.5, 1.0, 1.5
        assert_eq!(windows[1].features, vec![3.0, 30.0]);
    }

    #[test]
    fn test_empty_windows_are_omitted() {
        // Samples cluster at the edges; the middle windows catch nothing
        let times = vec![0.0, 0.1, 5.0];
        let feats = vec![vec![1.0], vec![1.0], vec![2.0]];
        let windows = aggregate_windows(&times, &feats, 1.0, 1.0).unwrap();
        let starts: Vec<f64> = windows.iter().map(|w| w.start).collect();
        assert_eq!(starts, vec![0.0]);
        assert!(windows.iter().all(|w| !w.features.is_empty()));
    }

    #[test]
    fn test_empty_input_yields_no_windows() {
        assert!(aggregate_windows(&[], &[], 1.5, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = aggregate_windows(&[0.0, 1.0], &[vec![1.0]], 1.0, 0.5);
        assert!(matches!(result, Err(AnalysisError::InvalidParameter(_))));
    }

    #[test]
    fn test_non_positive_hop_rejected() {
        let result = aggregate_windows(&[0.0, 1.0], &[vec![1.0], vec![2.0]], 1.0, 0.0);
        assert!(matches!(result, Err(AnalysisError::InvalidParameter(_))));
    }
}
