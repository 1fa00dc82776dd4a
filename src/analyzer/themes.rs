//! Boundary refinement from melodic contour.
//!
//! A section whose opening motif comes back later is cut where the motif
//! returns, and a section that starts by echoing the previous section's tail
//! has its start pushed past the echo. Sections that end up too short are
//! folded into their predecessor.

use super::{AnalysisError, Result};
use crate::model::{Note, Section};
use serde::{Deserialize, Serialize};

/// Direction of one melodic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contour {
    Up,
    Down,
    Same,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub enabled: bool,
    /// Motif length in contour steps.
    pub window_size: usize,
    /// Similarity a window must exceed to count as a restatement.
    pub sim_threshold: f64,
    /// Refined sections shorter than this merge into the previous one.
    pub min_section_length: f64,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_size: 8,
            sim_threshold: 0.6,
            min_section_length: 2.0,
        }
    }
}

impl ThemeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(AnalysisError::InvalidParameter(
                "theme window_size must be positive".to_string(),
            ));
        }
        if !self.sim_threshold.is_finite() {
            return Err(AnalysisError::InvalidParameter(format!(
                "sim_threshold must be finite, got {}",
                self.sim_threshold
            )));
        }
        super::skeleton::validate_min_length(self.min_section_length)
    }
}

/// Up/down/same steps between successive notes.
pub fn pitch_contour(notes: &[Note]) -> Vec<Contour> {
    notes
        .windows(2)
        .map(|w| match w[1].pitch.cmp(&w[0].pitch) {
            std::cmp::Ordering::Greater => Contour::Up,
            std::cmp::Ordering::Less => Contour::Down,
            std::cmp::Ordering::Equal => Contour::Same,
        })
        .collect()
}

/// Ratcliff/Obershelp similarity: `2·M / (|a| + |b|)` where `M` counts the
/// symbols in recursively found longest common blocks. Two empty contours
/// are identical.
pub fn contour_similarity(a: &[Contour], b: &[Contour]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_symbols(a, b) as f64 / total as f64
}

fn matching_symbols(a: &[Contour], b: &[Contour]) -> usize {
    let (i, j, size) = longest_common_block(a, b);
    if size == 0 {
        return 0;
    }
    size + matching_symbols(&a[..i], &b[..j]) + matching_symbols(&a[i + size..], &b[j + size..])
}

/// Longest common contiguous block as `(start in a, start in b, length)`.
/// Ties go to the earliest start in `a`, then in `b`.
fn longest_common_block(a: &[Contour], b: &[Contour]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // run[j + 1] = length of the common run ending at a[i], b[j]
    let mut prev = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut run = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                run[j + 1] = prev[j] + 1;
                let len = run[j + 1];
                let start = (i + 1 - len, j + 1 - len);
                if len > best.2 || (len == best.2 && start < (best.0, best.1)) {
                    best = (start.0, start.1, len);
                }
            }
        }
        prev = run;
    }
    best
}

/// Adjust section boundaries to motif restatements, then merge short results.
///
/// The restatement search skips the opening window itself, so only a later
/// return of the opening motif can end a section early. `config` is expected
/// to have passed [`ThemeConfig::validate`].
pub fn refine_sections(notes: &[Note], sections: &[Section], config: &ThemeConfig) -> Vec<Section> {
    let w = config.window_size.max(1);
    let mut refined: Vec<Section> = Vec::new();

    for section in sections {
        let seg_notes = notes_in(notes, section);
        if seg_notes.is_empty() {
            continue;
        }
        let contour = pitch_contour(seg_notes);
        let n = contour.len();

        // Skip an opening that echoes the previous section's closing motif
        let mut start_idx = 0;
        if let Some(prev) = refined.last() {
            let prev_contour = pitch_contour(notes_in(notes, prev));
            let tail = &prev_contour[prev_contour.len().saturating_sub(w)..];
            for i in 0..w.min(n) {
                let window = &contour[i..(i + w).min(n)];
                if contour_similarity(window, tail) > config.sim_threshold {
                    start_idx = i + w;
                    break;
                }
            }
        }

        // Stop where the opening motif comes back
        let mut end_idx = seg_notes.len();
        if n >= 2 * w {
            let opening = &contour[..w];
            for i in w..=(n - w) {
                if contour_similarity(&contour[i..i + w], opening) > config.sim_threshold {
                    end_idx = i;
                    break;
                }
            }
        }

        let new_start = seg_notes
            .get(start_idx)
            .map_or(section.start, |n| n.start_time);
        let new_end = seg_notes[end_idx - 1].end_time().min(section.end);

        let candidate = if new_end > new_start {
            Section::new(new_start, new_end)
        } else {
            *section
        };
        log::trace!(
            "Refined {:.2}-{:.2}s to {:.2}-{:.2}s",
            section.start,
            section.end,
            candidate.start,
            candidate.end
        );
        refined.push(candidate);
    }

    let mut merged: Vec<Section> = Vec::with_capacity(refined.len());
    for section in refined {
        match merged.last_mut() {
            Some(last) if section.end - last.start < config.min_section_length => {
                last.end = section.end;
            }
            _ => merged.push(section),
        }
    }

    log::debug!("Theme refinement: {} -> {} sections", sections.len(), merged.len());
    merged
}

/// Notes whose onset falls inside `section`. Notes must be sorted by onset.
fn notes_in<'a>(notes: &'a [Note], section: &Section) -> &'a [Note] {
    let lo = notes.partition_point(|n| n.start_time < section.start);
    let hi = notes.partition_point(|n| n.start_time < section.end).max(lo);
    &notes[lo..hi]
}
