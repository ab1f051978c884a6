use ndarray::Array1;
use tracing::{debug, info};

use crate::config::AlignmentConfig;
use crate::services::errors::ComparisonError;

/// One valid frame's angle vector, tagged with the frame index it came from
/// so diagnostics can be mapped back onto the source video.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub frame_index: usize,
    pub timestamp: f64,
    pub features: Array1<f64>,
}

/// Result of the two-stage alignment.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Recovered global start offset in feature frames; positive means the
    /// learner runs late relative to the reference.
    pub offset: i64,
    /// Start of the overlap window within the learner feature stream.
    pub learner_start: usize,
    /// Start of the overlap window within the reference feature stream.
    pub reference_start: usize,
    /// Summed step costs along the warp path.
    pub cumulative_distance: f64,
    /// Monotonic warp path as positions within the two overlap windows.
    pub path: Vec<(usize, usize)>,
}

impl Alignment {
    pub fn mean_path_distance(&self) -> f64 {
        if self.path.is_empty() {
            return 0.0;
        }
        self.cumulative_distance / self.path.len() as f64
    }

    /// Mean absolute index offset along the path, the timing error signal.
    pub fn mean_index_offset(&self) -> f64 {
        if self.path.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .path
            .iter()
            .map(|(i, j)| (*i as f64 - *j as f64).abs())
            .sum();
        total / self.path.len() as f64
    }
}

/// Two-stage temporal aligner: a brute-force global offset search followed
/// by dynamic time warping bounded to a band around the diagonal.
///
/// Independently recorded clips are not guaranteed to start together, so the
/// offset search removes the gross shift first; the bounded warp then
/// absorbs local tempo differences without permitting pathological
/// long-range matches.
pub struct AlignmentService {
    config: AlignmentConfig,
}

impl AlignmentService {
    pub fn new(config: AlignmentConfig) -> Self {
        Self { config }
    }

    pub fn align(
        &self,
        learner: &[FeatureFrame],
        reference: &[FeatureFrame],
    ) -> Result<Alignment, ComparisonError> {
        let required = self.config.min_overlap;
        if learner.len() < required {
            return Err(ComparisonError::InsufficientData {
                reason: "too few valid learner frames".to_string(),
                frames: learner.len(),
                required,
            });
        }
        if reference.len() < required {
            return Err(ComparisonError::InsufficientData {
                reason: "too few valid reference frames".to_string(),
                frames: reference.len(),
                required,
            });
        }

        let offset = self.find_offset(learner, reference)?;
        let (learner_start, overlap) = overlap_window(learner.len(), reference.len(), offset);
        let reference_start = (learner_start as i64 - offset) as usize;
        debug!(offset, overlap, "Auto-sync selected offset");

        let a: Vec<&Array1<f64>> = learner[learner_start..learner_start + overlap]
            .iter()
            .map(|f| &f.features)
            .collect();
        let b: Vec<&Array1<f64>> = reference[reference_start..reference_start + overlap]
            .iter()
            .map(|f| &f.features)
            .collect();

        let (cumulative_distance, path) = bounded_dtw(&a, &b, self.config.dtw_radius);
        info!(
            offset,
            path_len = path.len(),
            mean_distance = cumulative_distance / path.len().max(1) as f64,
            "Alignment complete"
        );

        Ok(Alignment {
            offset,
            learner_start,
            reference_start,
            cumulative_distance,
            path,
        })
    }

    /// Brute-force search over integer offsets for the one minimizing the
    /// mean per-frame distance across the overlap. Deterministic: ties keep
    /// the first (most negative) candidate.
    fn find_offset(
        &self,
        learner: &[FeatureFrame],
        reference: &[FeatureFrame],
    ) -> Result<i64, ComparisonError> {
        let max_offset = self.config.max_offset as i64;
        let mut best: Option<(f64, i64)> = None;
        let mut best_overlap = 0;

        for offset in -max_offset..=max_offset {
            let (start, overlap) = overlap_window(learner.len(), reference.len(), offset);
            if overlap < self.config.min_overlap {
                continue;
            }
            best_overlap = best_overlap.max(overlap);

            let mut total = 0.0;
            for i in start..start + overlap {
                let j = (i as i64 - offset) as usize;
                total += euclidean(&learner[i].features, &reference[j].features);
            }
            let mean = total / overlap as f64;
            if best.map_or(true, |(d, _)| mean < d) {
                best = Some((mean, offset));
            }
        }

        match best {
            Some((_, offset)) => Ok(offset),
            None => Err(ComparisonError::InsufficientData {
                reason: "no candidate offset leaves enough overlap".to_string(),
                frames: best_overlap,
                required: self.config.min_overlap,
            }),
        }
    }
}

/// Overlap of `learner[i]` against `reference[i - offset]`: returns the
/// learner-side start index and the overlap length.
fn overlap_window(learner_len: usize, reference_len: usize, offset: i64) -> (usize, usize) {
    let start = offset.max(0) as usize;
    let end = (learner_len as i64).min(reference_len as i64 + offset).max(0) as usize;
    if end > start {
        (start, end - start)
    } else {
        (0, 0)
    }
}

fn euclidean(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Dynamic time warping restricted to a Sakoe-Chiba band of the given
/// radius. Returns the cumulative cost and the warp path, both monotonic
/// non-decreasing and spanning the full matched ranges.
fn bounded_dtw(a: &[&Array1<f64>], b: &[&Array1<f64>], radius: usize) -> (f64, Vec<(usize, usize)>) {
    let n = a.len();
    let m = b.len();
    if n == 0 || m == 0 {
        return (0.0, Vec::new());
    }

    // DP over an (n+1) x (m+1) grid; cells outside the band stay infinite.
    let width = m + 1;
    let mut cost = vec![f64::INFINITY; (n + 1) * width];
    cost[0] = 0.0;

    // Band center tracks the diagonal when lengths differ.
    let slope = m as f64 / n as f64;
    let band = |i: usize| -> (usize, usize) {
        let center = (i as f64 * slope).round() as i64;
        let lo = (center - radius as i64).max(1) as usize;
        let hi = ((center + radius as i64) as usize).min(m);
        (lo, hi)
    };

    for i in 1..=n {
        let (lo, hi) = band(i);
        for j in lo..=hi.max(lo) {
            let step = euclidean(a[i - 1], b[j - 1]);
            let prev = cost[(i - 1) * width + j - 1]
                .min(cost[(i - 1) * width + j])
                .min(cost[i * width + j - 1]);
            if prev.is_finite() {
                cost[i * width + j] = step + prev;
            }
        }
    }

    // Walk back from the corner, preferring the diagonal on ties.
    let mut path = Vec::with_capacity(n.max(m));
    let mut i = n;
    let mut j = m;
    while i > 0 && j > 0 {
        path.push((i - 1, j - 1));
        let diag = cost[(i - 1) * width + j - 1];
        let up = cost[(i - 1) * width + j];
        let left = cost[i * width + j - 1];
        if diag <= up && diag <= left {
            i -= 1;
            j -= 1;
        } else if up <= left {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    while i > 0 {
        path.push((i - 1, 0));
        i -= 1;
    }
    while j > 0 {
        path.push((0, j - 1));
        j -= 1;
    }
    path.reverse();

    (cost[n * width + m], path)
}
