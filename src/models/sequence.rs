use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::keypoint::Keypoint;

/// Sequence contract version understood by this engine and by the external
/// visualization tools that consume the same JSON.
pub const CONTRACT_VERSION: &str = "1.1";

/// Video-level metadata captured when the sequence was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub version: String,
    pub model: String,
    pub video_width: u32,
    pub video_height: u32,
    pub total_frames: u32,
    pub fps: f64,
    pub duration_sec: f64,
}

impl VideoMeta {
    pub fn new(model: &str, width: u32, height: u32, fps: f64, total_frames: u32) -> Self {
        let duration_sec = if fps > 0.0 {
            total_frames as f64 / fps
        } else {
            0.0
        };
        Self {
            version: CONTRACT_VERSION.to_string(),
            model: model.to_string(),
            video_width: width,
            video_height: height,
            total_frames,
            fps,
            duration_sec,
        }
    }

    /// The longer frame dimension, the divisor for coordinate normalization.
    pub fn max_dimension(&self) -> f64 {
        self.video_width.max(self.video_height) as f64
    }
}

/// One record per decoded frame, valid or not.
///
/// Valid frames carry the 18-entry keypoint array (17 detected + derived
/// neck); invalid placeholders carry an empty one. `score` and `errors` stay
/// at their defaults until a comparison is merged back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_index: usize,
    pub timestamp: f64,
    pub is_valid: bool,
    pub score: f64,
    pub keypoints: Vec<Keypoint>,
    /// Indices of joints whose position diverged beyond the error threshold.
    pub errors: Vec<usize>,
}

impl FrameRecord {
    pub fn invalid(frame_index: usize, timestamp: f64) -> Self {
        Self {
            frame_index,
            timestamp,
            is_valid: false,
            score: 0.0,
            keypoints: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn valid(frame_index: usize, timestamp: f64, keypoints: Vec<Keypoint>) -> Self {
        Self {
            frame_index,
            timestamp,
            is_valid: true,
            score: 0.0,
            keypoints,
            errors: Vec::new(),
        }
    }
}

/// Comparison summary merged into a learner sequence after scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSummary {
    pub total_score: f64,
    pub accuracy_grade: String,
    pub part_accuracies: BTreeMap<String, f64>,
    pub worst_points: Vec<String>,
}

impl Default for ScoringSummary {
    fn default() -> Self {
        Self {
            total_score: 0.0,
            accuracy_grade: "Pending".to_string(),
            part_accuracies: BTreeMap::new(),
            worst_points: Vec::new(),
        }
    }
}

/// One ~1 second feedback segment on the learner timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub start_time: f64,
    pub end_time: f64,
    pub frame_score: f64,
    /// Feature-vector angle indices exceeding the angle error threshold.
    pub error_angles: Vec<usize>,
}

/// The per-subject, per-video record stream: the durable contract between
/// tracking, scoring and any external visualization tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub metadata: VideoMeta,
    pub summary: ScoringSummary,
    pub timeline_feedback: Vec<TimelineEntry>,
    pub frames: Vec<FrameRecord>,
}

impl Sequence {
    pub fn new(metadata: VideoMeta) -> Self {
        Self {
            metadata,
            summary: ScoringSummary::default(),
            timeline_feedback: Vec::new(),
            frames: Vec::new(),
        }
    }

    pub fn valid_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_valid).count()
    }

    /// Fraction of frames with usable keypoints.
    pub fn visibility_ratio(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        self.valid_frame_count() as f64 / self.frames.len() as f64
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse sequence JSON")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize sequence")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_sequence() -> Sequence {
        let mut seq = Sequence::new(VideoMeta::new("yolo11l-pose", 1920, 1080, 30.0, 3));
        seq.frames.push(FrameRecord::valid(
            0,
            0.0,
            vec![Keypoint::new(0.1, 0.2, 0.9); 18],
        ));
        seq.frames.push(FrameRecord::invalid(1, 1.0 / 30.0));
        seq.frames.push(FrameRecord::valid(
            2,
            2.0 / 30.0,
            vec![Keypoint::new(0.15, 0.25, 0.8); 18],
        ));
        seq
    }

    #[test]
    fn test_max_dimension_uses_longer_side() {
        let meta = VideoMeta::new("yolo11l-pose", 1080, 1920, 30.0, 100);
        assert_eq!(meta.max_dimension(), 1920.0);
        assert!((meta.duration_sec - 100.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_visibility_ratio() {
        let seq = sample_sequence();
        assert_eq!(seq.valid_frame_count(), 2);
        assert!((seq.visibility_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_contract_round_trip() {
        let seq = sample_sequence();
        let json = seq.to_json().unwrap();
        let back = Sequence::from_json(&json).unwrap();
        assert_eq!(back, seq);
    }

    #[test]
    fn test_round_trip_keeps_full_float_precision() {
        // Realistic pixel-derived coordinates are not exactly representable
        // in decimal; one serialize/parse cycle must still be lossless.
        let mut seq = Sequence::new(VideoMeta::new("yolo11l-pose", 1920, 1080, 30.0, 1));
        let kp = Keypoint::new(350.0 / 1920.0, 1000.0 / 1920.0, 0.92);
        seq.frames
            .push(FrameRecord::valid(0, 1.0 / 30.0, vec![kp; 18]));

        let back = Sequence::from_json(&seq.to_json().unwrap()).unwrap();
        let kp_back = back.frames[0].keypoints[0];
        assert_eq!(kp_back.x, kp.x);
        assert_eq!(kp_back.y, kp.y);
        assert_eq!(kp_back.confidence, kp.confidence);
        assert_eq!(back.frames[0].timestamp, seq.frames[0].timestamp);
        assert_eq!(back, seq);
    }

    #[test]
    fn test_contract_field_names() {
        let seq = sample_sequence();
        let value: serde_json::Value = serde_json::from_str(&seq.to_json().unwrap()).unwrap();
        assert_eq!(value["metadata"]["version"], CONTRACT_VERSION);
        assert_eq!(value["metadata"]["video_width"], 1920);
        assert_eq!(value["summary"]["accuracy_grade"], "Pending");
        assert_eq!(value["frames"][0]["frame_index"], 0);
        assert_eq!(value["frames"][1]["is_valid"], false);
        // Keypoints are stored as [x, y, confidence] triples.
        assert_eq!(value["frames"][0]["keypoints"][0][2], 0.9);
    }
}
