//! Prominence-based peak picking for 1-D curves.
//!
//! Used by novelty segmentation and salient-event detection alike.

/// A detected peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub height: f64,
    /// Height above the higher of the two bounding valleys
    pub prominence: f64,
}

/// Find local maxima whose prominence is at least `min_prominence`.
///
/// A local maximum is a sample (or flat plateau) strictly higher than the
/// sample before it and than the first differing sample after it. Plateaus
/// report their left-rounded midpoint. The first and last samples are never
/// peaks.
///
/// Prominence is measured by walking outward from the peak on each side while
/// samples stay at or below the peak height, stopping at the first strictly
/// higher sample or the signal edge. The minimum seen on each side is that
/// side's valley; the peak's prominence is its height above the higher valley.
///
/// Returned peaks are ordered by index.
pub fn find_peaks(signal: &[f64], min_prominence: f64) -> Vec<Peak> {
    local_maxima(signal)
        .into_iter()
        .filter_map(|index| {
            let prominence = prominence(signal, index);
            (prominence >= min_prominence).then_some(Peak {
                index,
                height: signal[index],
                prominence,
            })
        })
        .collect()
}

/// Indices of all local maxima, plateau-aware.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left_edge = i;
                let right_edge = ahead - 1;
                peaks.push((left_edge + right_edge) / 2);
                // Skip the plateau; `ahead` is lower so it can't start a peak
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    for &v in x[..=peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &x[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}
