use tracing::debug;

use crate::config::PreprocessConfig;
use crate::models::{Keypoint, Sequence};

/// Bridge short invalid runs by linear interpolation between the nearest
/// valid frames on both sides. Gaps longer than the configured duration are
/// left invalid: short occlusions should not fragment the analysis, but
/// fabricating data over a long dropout would.
///
/// Returns the number of frames that became valid.
pub fn interpolate_gaps(sequence: &mut Sequence, config: &PreprocessConfig) -> usize {
    let fps = sequence.metadata.fps;
    if fps <= 0.0 {
        return 0;
    }
    let max_gap = (config.max_gap_seconds * fps).round() as usize;
    if max_gap == 0 {
        return 0;
    }

    let mut bridged = 0;
    let mut prev_valid: Option<usize> = None;
    let mut i = 0;
    while i < sequence.frames.len() {
        if sequence.frames[i].is_valid {
            prev_valid = Some(i);
            i += 1;
            continue;
        }

        // Extent of the invalid run starting at i.
        let mut end = i;
        while end < sequence.frames.len() && !sequence.frames[end].is_valid {
            end += 1;
        }
        let run_len = end - i;

        // Only interior runs within the limit are bridged; edges would need
        // extrapolation.
        if let (Some(before), true) = (prev_valid, end < sequence.frames.len()) {
            if run_len <= max_gap {
                fill_gap(sequence, before, end);
                bridged += run_len;
                debug!(start = i, len = run_len, "Interpolated tracking gap");
            }
        }

        i = end;
    }

    bridged
}

fn fill_gap(sequence: &mut Sequence, before: usize, after: usize) {
    let from = sequence.frames[before].keypoints.clone();
    let to = sequence.frames[after].keypoints.clone();
    if from.len() != to.len() || from.is_empty() {
        return;
    }

    let span = (after - before) as f64;
    for idx in (before + 1)..after {
        let t = (idx - before) as f64 / span;
        let keypoints: Vec<Keypoint> = from
            .iter()
            .zip(to.iter())
            .map(|(a, b)| {
                Keypoint::new(
                    a.x + (b.x - a.x) * t,
                    a.y + (b.y - a.y) * t,
                    a.confidence + (b.confidence - a.confidence) * t,
                )
            })
            .collect();
        let frame = &mut sequence.frames[idx];
        frame.keypoints = keypoints;
        frame.is_valid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{joint, FrameRecord, VideoMeta};

    fn sequence_with_validity(pattern: &[bool]) -> Sequence {
        let meta = VideoMeta::new("yolo11l-pose", 1920, 1080, 30.0, pattern.len() as u32);
        let mut seq = Sequence::new(meta);
        for (i, &valid) in pattern.iter().enumerate() {
            let ts = i as f64 / 30.0;
            if valid {
                let kps = vec![Keypoint::new(0.1 + i as f64 * 0.01, 0.2, 0.9); joint::COUNT];
                seq.frames.push(FrameRecord::valid(i, ts, kps));
            } else {
                seq.frames.push(FrameRecord::invalid(i, ts));
            }
        }
        seq
    }

    #[test]
    fn test_single_gap_between_identical_neighbors() {
        let mut seq = sequence_with_validity(&[true, false, true]);
        // Make the flanking frames identical.
        let kps = seq.frames[0].keypoints.clone();
        seq.frames[2].keypoints = kps.clone();
        let bridged = interpolate_gaps(&mut seq, &PreprocessConfig::default());
        assert_eq!(bridged, 1);
        assert!(seq.frames[1].is_valid);
        assert_eq!(seq.frames[1].keypoints, kps);
    }

    #[test]
    fn test_interpolation_is_linear() {
        let mut seq = sequence_with_validity(&[true, false, false, false, true]);
        seq.frames[0].keypoints = vec![Keypoint::new(0.0, 0.0, 1.0); joint::COUNT];
        seq.frames[4].keypoints = vec![Keypoint::new(0.4, 0.8, 0.6); joint::COUNT];
        interpolate_gaps(&mut seq, &PreprocessConfig::default());
        let mid = seq.frames[2].keypoints[0];
        assert!((mid.x - 0.2).abs() < 1e-9);
        assert!((mid.y - 0.4).abs() < 1e-9);
        assert!((mid.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_long_gap_is_left_invalid() {
        // 0.3s at 30fps bridges at most 9 frames.
        let mut pattern = vec![true];
        pattern.extend(std::iter::repeat(false).take(10));
        pattern.push(true);
        let mut seq = sequence_with_validity(&pattern);
        let bridged = interpolate_gaps(&mut seq, &PreprocessConfig::default());
        assert_eq!(bridged, 0);
        assert!(!seq.frames[5].is_valid);
    }

    #[test]
    fn test_maximum_bridgeable_gap() {
        let mut pattern = vec![true];
        pattern.extend(std::iter::repeat(false).take(9));
        pattern.push(true);
        let mut seq = sequence_with_validity(&pattern);
        let bridged = interpolate_gaps(&mut seq, &PreprocessConfig::default());
        assert_eq!(bridged, 9);
        assert!(seq.frames.iter().all(|f| f.is_valid));
    }

    #[test]
    fn test_edge_gaps_are_not_extrapolated() {
        let mut seq = sequence_with_validity(&[false, false, true, false, false]);
        let bridged = interpolate_gaps(&mut seq, &PreprocessConfig::default());
        assert_eq!(bridged, 0);
        assert!(!seq.frames[0].is_valid);
        assert!(!seq.frames[4].is_valid);
    }

    #[test]
    fn test_multiple_gaps_handled_independently() {
        let mut seq =
            sequence_with_validity(&[true, false, true, false, false, true]);
        let bridged = interpolate_gaps(&mut seq, &PreprocessConfig::default());
        assert_eq!(bridged, 3);
        assert!(seq.frames.iter().all(|f| f.is_valid));
    }
}
