use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A single note event as delivered by the note source.
/// Sequences of notes are always sorted ascending by `start_time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Onset in seconds (>= 0)
    pub start_time: f64,
    /// Sustain in seconds (> 0)
    pub duration: f64,
    pub pitch: i32,
    pub velocity: i32,
    pub track: i32,
}

impl Note {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// True if the note is sounding at instant `t` (half-open `[start, end)`).
    pub fn sounds_at(&self, t: f64) -> bool {
        self.start_time <= t && t < self.start_time + self.duration
    }
}

/// Names of the per-frame feature curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    NoteDensity,
    MeanPitch,
    PitchRange,
    VelocityEnergy,
    Polyphony,
}

impl FeatureName {
    pub const ALL: [FeatureName; 5] = [
        FeatureName::NoteDensity,
        FeatureName::MeanPitch,
        FeatureName::PitchRange,
        FeatureName::VelocityEnergy,
        FeatureName::Polyphony,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoteDensity => "note_density",
            Self::MeanPitch => "mean_pitch",
            Self::PitchRange => "pitch_range",
            Self::VelocityEnergy => "velocity_energy",
            Self::Polyphony => "polyphony",
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown feature name: {s}"))
    }
}

/// Feature vector of one sliding window over the note list.
/// All values are zero when the window holds no notes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureFrame {
    /// Window start in seconds
    pub time: f64,
    /// Notes per second
    pub note_density: f64,
    pub mean_pitch: f64,
    /// max(pitch) - min(pitch)
    pub pitch_range: f64,
    /// Mean squared velocity
    pub velocity_energy: f64,
    /// Mean number of simultaneously sounding notes
    pub polyphony: f64,
}

impl FeatureFrame {
    pub fn get(&self, name: FeatureName) -> f64 {
        match name {
            FeatureName::NoteDensity => self.note_density,
            FeatureName::MeanPitch => self.mean_pitch,
            FeatureName::PitchRange => self.pitch_range,
            FeatureName::VelocityEnergy => self.velocity_energy,
            FeatureName::Polyphony => self.polyphony,
        }
    }

    /// Project the frame onto the given features, in order.
    pub fn vector(&self, names: &[FeatureName]) -> Vec<f64> {
        names.iter().map(|&n| self.get(n)).collect()
    }
}

/// A coarser observation window aggregated from several frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub start: f64,
    pub end: f64,
    pub features: Vec<f64>,
}

/// A time span `[start, end)` with `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub start: f64,
    pub end: f64,
}

impl Section {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }
}

/// Descriptor vector summarizing one section for repetition analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionFeatureRecord {
    pub start: f64,
    pub end: f64,
    /// `[mean pitch, pitch std, notes/sec, mean |interval|, mean onset polyphony]`
    pub features: Vec<f64>,
}

/// Section index (into the filtered record list) → indices of related sections.
/// Always symmetric.
pub type AdjacencyMap = BTreeMap<usize, BTreeSet<usize>>;

/// What a salient event marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Peak(FeatureName),
    SectionStart,
    SectionEnd,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Peak(name) => write!(f, "peak_{name}"),
            Self::SectionStart => f.write_str("section_start"),
            Self::SectionEnd => f.write_str("section_end"),
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "section_start" => Ok(Self::SectionStart),
            "section_end" => Ok(Self::SectionEnd),
            _ => match s.strip_prefix("peak_") {
                Some(name) => name.parse().map(Self::Peak),
                None => Err(format!("unknown event type: {s}")),
            },
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A musically salient moment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Peak prominence, or 1.0 for section boundaries
    pub strength: f64,
}

/// Everything the analysis hands to the exporter for one performance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MusicStructure {
    pub skeleton_sections: Vec<Section>,
    pub ssm_sections: Vec<Section>,
    pub repetition_adjacency: AdjacencyMap,
    pub salient_events: Vec<Event>,
}
