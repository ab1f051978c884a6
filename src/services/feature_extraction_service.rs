use ndarray::Array1;

use crate::models::{joint, Keypoint, ANGLE_COUNT, ANGLE_TRIPLETS, TORSO_TILT_INDEX};

/// Spine lengths below this are treated as degenerate and left unscaled.
pub const SPINE_EPSILON: f64 = 1e-6;

/// A body-centered pose: hip-center at the origin, spine length scaled to
/// one unit unless the input spine was degenerate.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPose {
    pub points: Vec<(f64, f64)>,
    /// Spine length of the input pose before scaling.
    pub raw_spine_length: f64,
}

impl NormalizedPose {
    pub fn spine_length(&self) -> f64 {
        let (nx, ny) = self.points[joint::NECK];
        (nx * nx + ny * ny).sqrt()
    }
}

/// Nine joint angles in degrees: eight interior limb angles plus the global
/// torso tilt. Angles are preferred over raw coordinates for their
/// robustness to residual scale and body-shape mismatch.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub angles: [f64; ANGLE_COUNT],
}

impl FeatureVector {
    pub fn to_ndarray(&self) -> Array1<f64> {
        Array1::from_iter(self.angles.iter().copied())
    }
}

/// Remove translation and scale: subtract the hip center, then divide by the
/// neck-to-origin distance. A near-zero spine skips the division so a single
/// collapsed detection cannot blow the pose up.
pub fn normalize_pose(keypoints: &[Keypoint]) -> NormalizedPose {
    let left_hip = keypoints[joint::LEFT_HIP];
    let right_hip = keypoints[joint::RIGHT_HIP];
    let hip_x = (left_hip.x + right_hip.x) / 2.0;
    let hip_y = (left_hip.y + right_hip.y) / 2.0;

    let mut points: Vec<(f64, f64)> = keypoints
        .iter()
        .map(|kp| (kp.x - hip_x, kp.y - hip_y))
        .collect();

    let (neck_x, neck_y) = points[joint::NECK];
    let raw_spine_length = (neck_x * neck_x + neck_y * neck_y).sqrt();

    if raw_spine_length > SPINE_EPSILON {
        let scale = 1.0 / raw_spine_length;
        for point in points.iter_mut() {
            point.0 *= scale;
            point.1 *= scale;
        }
    }

    NormalizedPose {
        points,
        raw_spine_length,
    }
}

/// Interior angle at `b` between the bones `b->a` and `b->c`, in degrees.
fn interior_angle(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let v1 = (a.0 - b.0, a.1 - b.1);
    let v2 = (c.0 - b.0, c.1 - b.1);
    let n1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let n2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    if n1 < SPINE_EPSILON || n2 < SPINE_EPSILON {
        return 0.0;
    }
    let cos = ((v1.0 * v2.0 + v1.1 * v2.1) / (n1 * n2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Angle vector for one normalized pose.
pub fn extract_features(pose: &NormalizedPose) -> FeatureVector {
    let mut angles = [0.0; ANGLE_COUNT];
    for (i, (a, b, c)) in ANGLE_TRIPLETS.iter().enumerate() {
        angles[i] = interior_angle(pose.points[*a], pose.points[*b], pose.points[*c]);
    }

    // Torso tilt: the neck vector against the vertical reference. Image y
    // grows downward, so upright is (0, -1).
    let (nx, ny) = pose.points[joint::NECK];
    let norm = (nx * nx + ny * ny).sqrt();
    angles[TORSO_TILT_INDEX] = if norm < SPINE_EPSILON {
        0.0
    } else {
        ((-ny) / norm).clamp(-1.0, 1.0).acos().to_degrees()
    };

    FeatureVector { angles }
}
