use super::{AnalysisError, Result};
use crate::model::{FeatureFrame, Note};
use serde::{Deserialize, Serialize};

/// Number of evenly spaced instants sampled per window for polyphony.
const POLYPHONY_SAMPLES: usize = 100;

/// Sliding-window parameters for the frame-level feature curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureCurveConfig {
    /// Window length in seconds.
    pub window_size: f64,
    /// Distance between successive window starts in seconds.
    pub hop_size: f64,
}

impl Default for FeatureCurveConfig {
    fn default() -> Self {
        Self {
            window_size: 1.0,
            hop_size: 0.5,
        }
    }
}

impl FeatureCurveConfig {
    pub fn validate(&self) -> Result<()> {
        validate_window(self.window_size, self.hop_size)
    }
}

/// Reject non-positive (or non-finite) window and hop sizes.
pub(crate) fn validate_window(window_size: f64, hop_size: f64) -> Result<()> {
    if !(window_size.is_finite() && window_size > 0.0) {
        return Err(AnalysisError::InvalidParameter(format!(
            "window_size must be positive, got {window_size}"
        )));
    }
    if !(hop_size.is_finite() && hop_size > 0.0) {
        return Err(AnalysisError::InvalidParameter(format!(
            "hop_size must be positive, got {hop_size}"
        )));
    }
    Ok(())
}

/// Slide a window over the notes and emit one feature frame per hop.
///
/// Windows start at `0, hop, 2·hop, …` and continue while the start lies before
/// the end of the final note (its onset plus duration). A note belongs to the
/// window holding its onset; sustain does not extend membership.
///
/// Notes must be sorted by `start_time`.
pub fn build_feature_curve(notes: &[Note], config: &FeatureCurveConfig) -> Result<Vec<FeatureFrame>> {
    config.validate()?;

    let Some(last) = notes.last() else {
        return Ok(Vec::new());
    };
    let max_time = last.end_time();

    let mut frames = Vec::new();
    let mut start = 0.0_f64;
    while start < max_time {
        let end = start + config.window_size;
        let lo = notes.partition_point(|n| n.start_time < start);
        let hi = notes.partition_point(|n| n.start_time < end).max(lo);
        frames.push(frame_for_window(start, &notes[lo..hi], config.window_size));
        start += config.hop_size;
    }

    log::debug!(
        "Built {} feature frames from {} notes (window {}s, hop {}s)",
        frames.len(),
        notes.len(),
        config.window_size,
        config.hop_size
    );

    Ok(frames)
}

/// Number of `notes` sounding at instant `t`.
pub(crate) fn polyphony_at(notes: &[Note], t: f64) -> usize {
    notes.iter().filter(|n| n.sounds_at(t)).count()
}

fn frame_for_window(start: f64, window_notes: &[Note], window_size: f64) -> FeatureFrame {
    if window_notes.is_empty() {
        return FeatureFrame {
            time: start,
            ..FeatureFrame::default()
        };
    }

    let count = window_notes.len() as f64;
    let pitch_sum: f64 = window_notes.iter().map(|n| n.pitch as f64).sum();
    let min_pitch = window_notes.iter().map(|n| n.pitch).min().unwrap_or(0);
    let max_pitch = window_notes.iter().map(|n| n.pitch).max().unwrap_or(0);
    let velocity_sq_sum: f64 = window_notes
        .iter()
        .map(|n| {
            let v = n.velocity as f64;
            v * v
        })
        .sum();

    // Evenly spaced instants, both window edges included
    let step = window_size / (POLYPHONY_SAMPLES - 1) as f64;
    let end = start + window_size;
    let sounding: usize = (0..POLYPHONY_SAMPLES)
        .map(|k| {
            let t = if k == POLYPHONY_SAMPLES - 1 {
                end
            } else {
                start + k as f64 * step
            };
            polyphony_at(window_notes, t)
        })
        .sum();

    FeatureFrame {
        time: start,
        note_density: count / window_size,
        mean_pitch: pitch_sum / count,
        pitch_range: (max_pitch - min_pitch) as f64,
        velocity_energy: velocity_sq_sum / count,
        polyphony: sounding as f64 / POLYPHONY_SAMPLES as f64,
    }
}
