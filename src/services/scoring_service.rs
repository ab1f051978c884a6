use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::models::{joint, BodyPart, Grade, ScoreResult, Sequence, TimelineEntry};
use crate::services::alignment_service::{Alignment, AlignmentService, FeatureFrame};
use crate::services::errors::ComparisonError;
use crate::services::feature_extraction_service::{
    extract_features, normalize_pose, NormalizedPose,
};
use crate::services::sequence_preprocessing_service::interpolate_gaps;

/// Learner frames in the path are spaced into ~1 second feedback segments.
const TIMELINE_STRIDE: usize = 30;

/// Number of joints reported in the worst-joint ranking.
const WORST_JOINT_COUNT: usize = 3;

/// The motion comparison engine: turns two tracked sequences into one
/// calibrated score with per-part, per-joint and per-segment diagnostics.
///
/// An instance is an explicitly constructed, owned handle; it holds no
/// shared state, so independent comparisons can run in parallel with one
/// service each.
pub struct MotionComparisonService {
    config: EngineConfig,
    aligner: AlignmentService,
}

/// One side of the comparison after preprocessing and feature extraction:
/// the valid frames only, with poses and angle vectors in step.
struct FeatureStream {
    frames: Vec<FeatureFrame>,
    poses: Vec<NormalizedPose>,
    visibility_ratio: f64,
}

impl MotionComparisonService {
    pub fn new(config: EngineConfig) -> Self {
        let aligner = AlignmentService::new(config.alignment.clone());
        Self { config, aligner }
    }

    /// Score the learner sequence against the reference.
    ///
    /// Both sequences must be complete; there is no streaming mode. The
    /// inputs are not modified — use [`apply_to_sequence`] to merge the
    /// result back into the learner record.
    ///
    /// [`apply_to_sequence`]: MotionComparisonService::apply_to_sequence
    pub fn compare(
        &self,
        learner: &Sequence,
        reference: &Sequence,
    ) -> Result<ScoreResult, ComparisonError> {
        if learner.frames.is_empty() || reference.frames.is_empty() {
            return Err(ComparisonError::EmptySequence);
        }
        info!(
            learner_frames = learner.frames.len(),
            reference_frames = reference.frames.len(),
            "Starting motion comparison"
        );

        let learner_stream = self.prepare(learner);
        let reference_stream = self.prepare(reference);
        let visibility_ratio = learner_stream.visibility_ratio;

        let alignment = self
            .aligner
            .align(&learner_stream.frames, &reference_stream.frames)?;

        let scoring = &self.config.scoring;
        let shape_score = exp_score(alignment.mean_path_distance(), scoring.shape_tolerance);
        let timing_score = exp_score(alignment.mean_index_offset(), scoring.timing_tolerance);
        let total_score = (scoring.shape_weight * shape_score
            + scoring.timing_weight * timing_score)
            .clamp(0.0, 100.0);

        let diagnostics = self.collect_diagnostics(&learner_stream, &reference_stream, &alignment);

        let mut grade = Grade::from_score(total_score);
        if visibility_ratio < scoring.visibility_floor {
            warn!(
                visibility_ratio,
                floor = scoring.visibility_floor,
                "Low visibility, downgrading grade one tier"
            );
            grade = grade.downgraded();
        }

        info!(
            total_score,
            shape_score,
            timing_score,
            grade = grade.as_str(),
            offset = alignment.offset,
            "Motion comparison finished"
        );

        Ok(ScoreResult {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            total_score,
            shape_score,
            timing_score,
            offset_frames: alignment.offset,
            grade,
            part_accuracies: diagnostics.part_accuracies,
            worst_joints: diagnostics.worst_joints,
            timeline: diagnostics.timeline,
            frame_scores: diagnostics.frame_scores,
            frame_errors: diagnostics.frame_errors,
            visibility_ratio,
        })
    }

    /// Merge a comparison result back into the learner sequence: the
    /// summary block, the timeline, and the per-frame score/error fields
    /// the surrounding application persists and uploads.
    pub fn apply_to_sequence(&self, sequence: &mut Sequence, result: &ScoreResult) {
        sequence.summary.total_score = round1(result.total_score);
        sequence.summary.accuracy_grade = result.grade.as_str().to_string();
        sequence.summary.part_accuracies = result
            .part_accuracies
            .iter()
            .map(|(name, score)| (name.clone(), round1(*score)))
            .collect();
        sequence.summary.worst_points = result.worst_joints.clone();
        sequence.timeline_feedback = result.timeline.clone();

        for frame in sequence.frames.iter_mut() {
            if let Some(score) = result.frame_scores.get(&frame.frame_index) {
                frame.score = round1(*score);
            }
            if let Some(errors) = result.frame_errors.get(&frame.frame_index) {
                frame.errors = errors.clone();
            }
        }
    }

    /// Interpolate short gaps, then lift every remaining valid frame into a
    /// normalized pose and its angle vector.
    fn prepare(&self, sequence: &Sequence) -> FeatureStream {
        let mut processed = sequence.clone();
        interpolate_gaps(&mut processed, &self.config.preprocess);

        let mut frames = Vec::new();
        let mut poses = Vec::new();
        for frame in processed.frames.iter() {
            if !frame.is_valid || frame.keypoints.len() != joint::COUNT {
                continue;
            }
            let pose = normalize_pose(&frame.keypoints);
            let features = extract_features(&pose);
            frames.push(FeatureFrame {
                frame_index: frame.frame_index,
                timestamp: frame.timestamp,
                features: features.to_ndarray(),
            });
            poses.push(pose);
        }
        FeatureStream {
            frames,
            poses,
            visibility_ratio: processed.visibility_ratio(),
        }
    }

    fn collect_diagnostics(
        &self,
        learner: &FeatureStream,
        reference: &FeatureStream,
        alignment: &Alignment,
    ) -> Diagnostics {
        let scoring = &self.config.scoring;
        let pairs = alignment.path.len().max(1) as f64;

        // Accumulators keyed by bucket / joint / learner frame.
        let mut part_error_sums = [0.0; BodyPart::ALL.len()];
        let mut joint_error_sums = [0.0; joint::NECK];
        let mut frame_distance: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
        let mut frame_errors: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut frame_error_angles: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

        for (pi, pj) in alignment.path.iter() {
            let li = alignment.learner_start + pi;
            let rj = alignment.reference_start + pj;
            let learner_frame = &learner.frames[li];
            let reference_frame = &reference.frames[rj];
            let frame_index = learner_frame.frame_index;

            // Angular channel: bucketed absolute differences.
            for (bucket, part) in BodyPart::ALL.iter().enumerate() {
                for &k in part.angle_indices() {
                    let diff =
                        (learner_frame.features[k] - reference_frame.features[k]).abs();
                    part_error_sums[bucket] += diff;
                    if diff > scoring.angle_error_threshold_deg {
                        let angles = frame_error_angles.entry(frame_index).or_default();
                        if !angles.contains(&k) {
                            angles.push(k);
                        }
                    }
                }
            }

            // Positional channel: catches localized placement errors that
            // angles alone can miss. The derived neck is excluded.
            let learner_pose = &learner.poses[li];
            let reference_pose = &reference.poses[rj];
            for j in 0..joint::NECK {
                let (lx, ly) = learner_pose.points[j];
                let (rx, ry) = reference_pose.points[j];
                let dist = ((lx - rx).powi(2) + (ly - ry).powi(2)).sqrt();
                joint_error_sums[j] += dist;
                if dist > scoring.joint_error_threshold {
                    let errors = frame_errors.entry(frame_index).or_default();
                    if !errors.contains(&j) {
                        errors.push(j);
                    }
                }
            }

            // Per-frame distance, averaged when the frame recurs in the path.
            let step = (&learner_frame.features - &reference_frame.features)
                .mapv(|x| x * x)
                .sum()
                .sqrt();
            let entry = frame_distance.entry(frame_index).or_insert((0.0, 0));
            entry.0 += step;
            entry.1 += 1;
        }

        let part_accuracies: BTreeMap<String, f64> = BodyPart::ALL
            .iter()
            .enumerate()
            .map(|(bucket, part)| {
                let samples = pairs * part.angle_indices().len() as f64;
                let mean = part_error_sums[bucket] / samples;
                (
                    part.name().to_string(),
                    exp_score(mean, scoring.shape_tolerance),
                )
            })
            .collect();

        let mut ranked: Vec<(usize, f64)> = joint_error_sums
            .iter()
            .copied()
            .enumerate()
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        let worst_joints: Vec<String> = ranked
            .iter()
            .take(WORST_JOINT_COUNT)
            .map(|(j, _)| joint::name(*j).to_string())
            .collect();

        let frame_scores: BTreeMap<usize, f64> = frame_distance
            .iter()
            .map(|(frame_index, (total, count))| {
                (
                    *frame_index,
                    exp_score(total / *count as f64, scoring.shape_tolerance),
                )
            })
            .collect();

        for errors in frame_errors.values_mut() {
            errors.sort_unstable();
        }
        for angles in frame_error_angles.values_mut() {
            angles.sort_unstable();
        }

        // One feedback segment per timeline stride of the learner video.
        let mut timeline = Vec::new();
        for (&frame_index, &score) in frame_scores.iter() {
            if frame_index % TIMELINE_STRIDE != 0 {
                continue;
            }
            let position = learner
                .frames
                .iter()
                .find(|f| f.frame_index == frame_index)
                .map(|f| f.timestamp)
                .unwrap_or(0.0);
            timeline.push(TimelineEntry {
                start_time: position,
                end_time: position + 1.0,
                frame_score: round1(score),
                error_angles: frame_error_angles
                    .get(&frame_index)
                    .cloned()
                    .unwrap_or_default(),
            });
        }

        Diagnostics {
            part_accuracies,
            worst_joints,
            timeline,
            frame_scores,
            frame_errors,
        }
    }
}

struct Diagnostics {
    part_accuracies: BTreeMap<String, f64>,
    worst_joints: Vec<String>,
    timeline: Vec<TimelineEntry>,
    frame_scores: BTreeMap<usize, f64>,
    frame_errors: BTreeMap<usize, Vec<usize>>,
}

/// The calibrated score mapping: perfect agreement scores 100 and the
/// tolerance constant sets how fast it decays.
fn exp_score(mean_error: f64, tolerance: f64) -> f64 {
    (100.0 * (-mean_error / tolerance).exp()).clamp(0.0, 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FrameRecord, Keypoint, VideoMeta};

    /// A moving stick figure long enough to clear the alignment minimum.
    fn synthetic_sequence(frames: usize, phase: f64) -> Sequence {
        let meta = VideoMeta::new("yolo11l-pose", 1920, 1080, 30.0, frames as u32);
        let mut seq = Sequence::new(meta);
        for i in 0..frames {
            seq.frames.push(FrameRecord::valid(
                i,
                i as f64 / 30.0,
                posed_keypoints(i as f64 / 30.0 + phase),
            ));
        }
        seq
    }

    /// Stick figure with arms swinging over time.
    fn posed_keypoints(t: f64) -> Vec<Keypoint> {
        let swing = (t * 2.0).sin() * 0.08;
        let mut kps = vec![Keypoint::absent(); joint::COUNT];
        let mut set = |idx: usize, x: f64, y: f64| {
            kps[idx] = Keypoint::new(x, y, 0.9);
        };
        set(joint::NOSE, 0.50, 0.10);
        set(joint::LEFT_SHOULDER, 0.45, 0.25);
        set(joint::RIGHT_SHOULDER, 0.55, 0.25);
        set(joint::LEFT_ELBOW, 0.40 - swing, 0.35);
        set(joint::RIGHT_ELBOW, 0.60 + swing, 0.35);
        set(joint::LEFT_WRIST, 0.38 - swing * 2.0, 0.45);
        set(joint::RIGHT_WRIST, 0.62 + swing * 2.0, 0.45);
        set(joint::LEFT_HIP, 0.46, 0.50);
        set(joint::RIGHT_HIP, 0.54, 0.50);
        set(joint::LEFT_KNEE, 0.46 + swing, 0.70);
        set(joint::RIGHT_KNEE, 0.54 - swing, 0.70);
        set(joint::LEFT_ANKLE, 0.46, 0.90);
        set(joint::RIGHT_ANKLE, 0.54, 0.90);
        set(joint::NECK, 0.50, 0.25);
        kps
    }

    fn service() -> MotionComparisonService {
        MotionComparisonService::new(EngineConfig::default())
    }

    #[test]
    fn test_self_comparison_scores_maximum() {
        let seq = synthetic_sequence(90, 0.0);
        let result = service().compare(&seq, &seq).unwrap();
        assert!(result.shape_score >= 99.0, "shape={}", result.shape_score);
        assert!(result.timing_score >= 99.0, "timing={}", result.timing_score);
        assert_eq!(result.grade, Grade::S);
        assert_eq!(result.offset_frames, 0);
        for score in result.part_accuracies.values() {
            assert!(*score >= 99.0);
        }
    }

    #[test]
    fn test_comparison_is_idempotent() {
        let learner = synthetic_sequence(90, 0.05);
        let reference = synthetic_sequence(90, 0.0);
        let svc = service();
        let first = svc.compare(&learner, &reference).unwrap();
        let second = svc.compare(&learner, &reference).unwrap();
        assert_eq!(first.total_score, second.total_score);
        assert_eq!(first.shape_score, second.shape_score);
        assert_eq!(first.timing_score, second.timing_score);
        assert_eq!(first.offset_frames, second.offset_frames);
        assert_eq!(first.part_accuracies, second.part_accuracies);
        assert_eq!(first.worst_joints, second.worst_joints);
        assert_eq!(first.frame_scores, second.frame_scores);
        assert_eq!(first.frame_errors, second.frame_errors);
        assert_eq!(first.timeline, second.timeline);
    }

    #[test]
    fn test_insufficient_data_is_explicit() {
        let learner = synthetic_sequence(10, 0.0);
        let reference = synthetic_sequence(90, 0.0);
        let err = service().compare(&learner, &reference).unwrap_err();
        assert!(matches!(err, ComparisonError::InsufficientData { .. }));
    }

    #[test]
    fn test_empty_sequence_is_rejected() {
        let empty = Sequence::new(VideoMeta::new("yolo11l-pose", 1920, 1080, 30.0, 0));
        let reference = synthetic_sequence(90, 0.0);
        let err = service().compare(&empty, &reference).unwrap_err();
        assert!(matches!(err, ComparisonError::EmptySequence));
    }

    #[test]
    fn test_visibility_downgrade_is_one_tier() {
        // Identical motion, but a third of the learner frames unusable in
        // runs too long to interpolate.
        let reference = synthetic_sequence(120, 0.0);
        let mut learner = synthetic_sequence(120, 0.0);
        for i in 80..120 {
            learner.frames[i] = FrameRecord::invalid(i, i as f64 / 30.0);
        }
        let result = service().compare(&learner, &reference).unwrap();
        assert!(result.visibility_ratio < 0.7);
        let base = Grade::from_score(result.total_score);
        assert_eq!(result.grade, base.downgraded());
    }

    #[test]
    fn test_apply_to_sequence_merges_summary_and_frames() {
        let reference = synthetic_sequence(90, 0.0);
        let mut learner = synthetic_sequence(90, 0.02);
        let svc = service();
        let result = svc.compare(&learner, &reference).unwrap();
        svc.apply_to_sequence(&mut learner, &result);

        assert_eq!(learner.summary.total_score, round1(result.total_score));
        assert_eq!(learner.summary.accuracy_grade, result.grade.as_str());
        assert_eq!(learner.summary.part_accuracies.len(), BodyPart::ALL.len());
        assert_eq!(learner.summary.worst_points.len(), WORST_JOINT_COUNT);
        assert!(!learner.timeline_feedback.is_empty());
        // Every aligned frame received its instantaneous score.
        assert!(learner.frames.iter().any(|f| f.score > 0.0));
    }

    #[test]
    fn test_timeline_cadence() {
        let reference = synthetic_sequence(120, 0.0);
        let learner = synthetic_sequence(120, 0.0);
        let result = service().compare(&learner, &reference).unwrap();
        assert!(!result.timeline.is_empty());
        for entry in &result.timeline {
            assert!((entry.end_time - entry.start_time - 1.0).abs() < 1e-9);
        }
        // Segments land on the 30-frame grid of the learner video.
        let first = &result.timeline[0];
        let frame = (first.start_time * 30.0).round() as usize;
        assert_eq!(frame % TIMELINE_STRIDE, 0);
    }

    #[test]
    fn test_exp_score_clamps_and_calibrates() {
        assert_eq!(exp_score(0.0, 15.0), 100.0);
        assert!(exp_score(15.0, 15.0) > 36.0);
        assert!(exp_score(1e9, 15.0) >= 0.0);
        assert!(exp_score(1e9, 15.0) < 1e-6);
    }
}
