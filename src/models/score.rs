use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::sequence::TimelineEntry;

/// Letter grade tiers derived from the total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::S
        } else if score >= 80.0 {
            Grade::A
        } else if score >= 70.0 {
            Grade::B
        } else if score >= 60.0 {
            Grade::C
        } else {
            Grade::D
        }
    }

    /// One tier lower, saturating at the bottom.
    pub fn downgraded(self) -> Self {
        match self {
            Grade::S => Grade::A,
            Grade::A => Grade::B,
            Grade::B => Grade::C,
            Grade::C => Grade::D,
            Grade::D => Grade::D,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

/// Full outcome of comparing one learner sequence against one reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,

    pub total_score: f64,
    pub shape_score: f64,
    pub timing_score: f64,
    /// Recovered global start offset in frames; positive means the learner
    /// runs late relative to the reference.
    pub offset_frames: i64,
    pub grade: Grade,

    /// Per body-part accuracy, 0-100, keyed by display name.
    pub part_accuracies: BTreeMap<String, f64>,
    /// Display names of the three joints with the highest cumulative
    /// positional error.
    pub worst_joints: Vec<String>,
    pub timeline: Vec<TimelineEntry>,

    /// Instantaneous score per learner frame index.
    pub frame_scores: BTreeMap<usize, f64>,
    /// Errored joint indices per learner frame index.
    pub frame_errors: BTreeMap<usize, Vec<usize>>,

    /// Valid frames after interpolation over total frames, learner side.
    pub visibility_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_tiers() {
        assert_eq!(Grade::from_score(95.0), Grade::S);
        assert_eq!(Grade::from_score(90.0), Grade::S);
        assert_eq!(Grade::from_score(89.9), Grade::A);
        assert_eq!(Grade::from_score(75.0), Grade::B);
        assert_eq!(Grade::from_score(60.0), Grade::C);
        assert_eq!(Grade::from_score(12.0), Grade::D);
    }

    #[test]
    fn test_downgrade_saturates() {
        assert_eq!(Grade::S.downgraded(), Grade::A);
        assert_eq!(Grade::C.downgraded(), Grade::D);
        assert_eq!(Grade::D.downgraded(), Grade::D);
    }

    #[test]
    fn test_grade_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Grade::S).unwrap(), "\"S\"");
        assert_eq!(Grade::B.as_str(), "B");
    }
}
