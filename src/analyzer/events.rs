use super::peaks::find_peaks;
use super::{AnalysisError, Result};
use crate::model::{Event, EventKind, FeatureFrame, FeatureName, Section};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Feature curves searched for peaks, in discovery order.
    pub feature_names: Vec<FeatureName>,
    /// Minimum prominence for a curve peak to count as salient.
    pub peak_prominence: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            feature_names: vec![
                FeatureName::NoteDensity,
                FeatureName::MeanPitch,
                FeatureName::PitchRange,
            ],
            peak_prominence: 0.2,
        }
    }
}

impl EventConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.peak_prominence.is_finite() {
            return Err(AnalysisError::InvalidParameter(format!(
                "peak_prominence must be finite, got {}",
                self.peak_prominence
            )));
        }
        Ok(())
    }
}

/// Collect salient moments: prominent peaks of each named feature curve, then
/// a start and end marker for every section.
///
/// The result is stably sorted by time, so events at the same instant keep
/// their discovery order: peaks in `feature_names` order come before section
/// boundaries.
pub fn detect_salient_events(
    frames: &[FeatureFrame],
    sections: &[Section],
    feature_names: &[FeatureName],
    peak_prominence: f64,
) -> Vec<Event> {
    let mut events = Vec::new();

    for &name in feature_names {
        let curve: Vec<f64> = frames.iter().map(|f| f.get(name)).collect();
        let peaks = find_peaks(&curve, peak_prominence);
        log::trace!("{} peaks in {}", peaks.len(), name);
        events.extend(peaks.into_iter().map(|peak| Event {
            time: frames[peak.index].time,
            kind: EventKind::Peak(name),
            strength: peak.prominence,
        }));
    }

    for section in sections {
        events.push(Event {
            time: section.start,
            kind: EventKind::SectionStart,
            strength: 1.0,
        });
        events.push(Event {
            time: section.end,
            kind: EventKind::SectionEnd,
            strength: 1.0,
        });
    }

    events.sort_by(|a, b| a.time.total_cmp(&b.time));

    log::debug!("Detected {} salient events", events.len());
    events
}
