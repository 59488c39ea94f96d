//! Replicate quality control: sliding-window spread tests over a group of
//! nominally identical curves, ejecting the worst member whenever a window
//! spreads wider than the threshold allows.

use crate::data::model::{SpectralCurve, SAMPLE_COUNT};

/// Default spread threshold for a window of per-curve means.
pub const DEFAULT_THRESHOLD: f64 = 0.02;

/// Default sliding-window width, in 1 nm bands.
pub const DEFAULT_WINDOW: usize = 100;

/// Default replicate-group size.
pub const DEFAULT_GROUP: usize = 10;

/// A group with fewer survivors than this cannot be trusted.
pub const MIN_SURVIVORS: usize = 4;

// ---------------------------------------------------------------------------
// Selection result
// ---------------------------------------------------------------------------

/// Outcome of one quality-control pass over a replicate group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The retained subset, as indices into the original group: ascending,
    /// duplicate-free, at least [`MIN_SURVIVORS`] long.
    Converged(Vec<usize>),
    /// Ejections left fewer than [`MIN_SURVIVORS`] curves; the group is bad
    /// and yields no representative spectrum.
    Exhausted,
}

impl Selection {
    pub fn indices(&self) -> &[usize] {
        match self {
            Selection::Converged(indices) => indices,
            Selection::Exhausted => &[],
        }
    }

    pub fn is_good(&self) -> bool {
        matches!(self, Selection::Converged(_))
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// Pick the self-consistent subset of a replicate group.
///
/// The wavelength axis is scanned in windows of `window_size` bands.  A
/// window fails when the spread of per-curve window means exceeds
/// `threshold`, or their population standard deviation exceeds half of it;
/// the surviving curve farthest from the overall window mean is then
/// ejected (ties go to the lowest surviving index) and the cursor advances
/// by a full window.  A passing window advances by half a window, so
/// neighbouring windows overlap.
///
/// Windows touching the water-absorption zones are skipped: the cursor
/// jumps over bands [1000, 1150) and [1450, 1650), and the scan stops
/// before any window reaching band 1950 — the tail of the spectrum is
/// never tested.
///
/// The whole scan is repeated once per curve of the *initial* group, not
/// of the shrinking survivor set.  Late passes over a stable group are
/// no-ops; the fixed cap keeps the ejection order of the legacy datasets.
///
/// Pure and deterministic; never fails on equal-length curves.  A group
/// smaller than [`MIN_SURVIVORS`], or a window wider than the spectrum,
/// yields [`Selection::Exhausted`] immediately.
pub fn select(curves: &[SpectralCurve], threshold: f64, window_size: usize) -> Selection {
    let group = curves.len();
    if group < MIN_SURVIVORS || window_size == 0 || window_size > SAMPLE_COUNT {
        return Selection::Exhausted;
    }
    let half_threshold = threshold / 2.0;

    let mut survivors: Vec<usize> = (0..group).collect();
    let mut rows: Vec<&[f64]> = curves.iter().map(|c| c.samples()).collect();

    for _ in 0..group {
        let mut j = 0;
        while j < SAMPLE_COUNT {
            if survivors.len() < MIN_SURVIVORS {
                return Selection::Exhausted;
            }
            let end = j + window_size;
            if (1000..1150).contains(&j) || (1000 < end && end < 1150) {
                j = 1150;
                continue;
            }
            if (1450..1650).contains(&j) || (1450 < end && end < 1650) {
                j = 1650;
                continue;
            }
            if j >= 1950 || end > 1950 {
                break;
            }

            let row_means: Vec<f64> = rows.iter().map(|r| mean(&r[j..end])).collect();
            let spread = fold_max(&row_means) - fold_min(&row_means);
            let deviation = population_std(&row_means);

            if spread > threshold || deviation > half_threshold {
                let overall = rows
                    .iter()
                    .map(|r| r[j..end].iter().sum::<f64>())
                    .sum::<f64>()
                    / (rows.len() * window_size) as f64;
                let eject = farthest_from(&row_means, overall);
                rows.remove(eject);
                survivors.remove(eject);
                j += window_size;
                continue;
            }
            j += (window_size / 2).max(1);
        }
    }

    if survivors.len() < MIN_SURVIVORS {
        return Selection::Exhausted;
    }
    Selection::Converged(survivors)
}

/// Convenience wrapper with the stock threshold and window.
pub fn select_default(curves: &[SpectralCurve]) -> Selection {
    select(curves, DEFAULT_THRESHOLD, DEFAULT_WINDOW)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}

fn fold_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn fold_min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Index of the value farthest from `center`; first index on ties, which
/// maps to the lowest surviving group index.
fn farthest_from(values: &[f64], center: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        let distance = (v - center).abs();
        if distance > best_distance {
            best_distance = distance;
            best = i;
        }
    }
    best
}
