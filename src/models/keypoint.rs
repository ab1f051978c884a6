use serde::{Deserialize, Serialize};

/// COCO-17 joint indices as produced by the pose detector, plus the derived
/// neck point appended during record building.
pub mod joint {
    pub const NOSE: usize = 0;
    pub const LEFT_EYE: usize = 1;
    pub const RIGHT_EYE: usize = 2;
    pub const LEFT_EAR: usize = 3;
    pub const RIGHT_EAR: usize = 4;
    pub const LEFT_SHOULDER: usize = 5;
    pub const RIGHT_SHOULDER: usize = 6;
    pub const LEFT_ELBOW: usize = 7;
    pub const RIGHT_ELBOW: usize = 8;
    pub const LEFT_WRIST: usize = 9;
    pub const RIGHT_WRIST: usize = 10;
    pub const LEFT_HIP: usize = 11;
    pub const RIGHT_HIP: usize = 12;
    pub const LEFT_KNEE: usize = 13;
    pub const RIGHT_KNEE: usize = 14;
    pub const LEFT_ANKLE: usize = 15;
    pub const RIGHT_ANKLE: usize = 16;
    pub const NECK: usize = 17;

    /// Keypoints delivered by the detector per person.
    pub const RAW_COUNT: usize = 17;
    /// Keypoints stored per frame record (raw + derived neck).
    pub const COUNT: usize = 18;

    pub const NAMES: [&str; COUNT] = [
        "Nose",
        "Left Eye",
        "Right Eye",
        "Left Ear",
        "Right Ear",
        "Left Shoulder",
        "Right Shoulder",
        "Left Elbow",
        "Right Elbow",
        "Left Wrist",
        "Right Wrist",
        "Left Hip",
        "Right Hip",
        "Left Knee",
        "Right Knee",
        "Left Ankle",
        "Right Ankle",
        "Neck",
    ];

    pub fn name(index: usize) -> &'static str {
        NAMES.get(index).copied().unwrap_or("Unknown")
    }
}

/// Joint triplets for the eight limb angles: the interior angle is measured
/// at the middle joint between the two adjacent bone vectors.
pub const ANGLE_TRIPLETS: [(usize, usize, usize); 8] = [
    (joint::LEFT_SHOULDER, joint::LEFT_ELBOW, joint::LEFT_WRIST),
    (joint::RIGHT_SHOULDER, joint::RIGHT_ELBOW, joint::RIGHT_WRIST),
    (joint::LEFT_ELBOW, joint::LEFT_SHOULDER, joint::LEFT_HIP),
    (joint::RIGHT_ELBOW, joint::RIGHT_SHOULDER, joint::RIGHT_HIP),
    (joint::LEFT_HIP, joint::LEFT_KNEE, joint::LEFT_ANKLE),
    (joint::RIGHT_HIP, joint::RIGHT_KNEE, joint::RIGHT_ANKLE),
    (joint::LEFT_KNEE, joint::LEFT_HIP, joint::LEFT_SHOULDER),
    (joint::RIGHT_KNEE, joint::RIGHT_HIP, joint::RIGHT_SHOULDER),
];

/// Index of the torso-tilt angle within a feature vector.
pub const TORSO_TILT_INDEX: usize = 8;

/// Total number of angles in a feature vector (8 limb angles + torso tilt).
pub const ANGLE_COUNT: usize = 9;

/// Body-part buckets used for error attribution. Each bucket groups the
/// feature-vector angle indices that belong to that part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyPart {
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
    Torso,
}

impl BodyPart {
    pub const ALL: [BodyPart; 5] = [
        BodyPart::LeftArm,
        BodyPart::RightArm,
        BodyPart::LeftLeg,
        BodyPart::RightLeg,
        BodyPart::Torso,
    ];

    /// Feature-vector angle indices belonging to this part.
    pub fn angle_indices(&self) -> &'static [usize] {
        match self {
            BodyPart::LeftArm => &[0, 2],
            BodyPart::RightArm => &[1, 3],
            BodyPart::LeftLeg => &[4, 6],
            BodyPart::RightLeg => &[5, 7],
            BodyPart::Torso => &[TORSO_TILT_INDEX],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BodyPart::LeftArm => "Left Arm",
            BodyPart::RightArm => "Right Arm",
            BodyPart::LeftLeg => "Left Leg",
            BodyPart::RightLeg => "Right Leg",
            BodyPart::Torso => "Torso",
        }
    }
}

/// A single body-joint estimate in frame-relative coordinates.
///
/// Coordinates are normalized to [0,1] by the longer frame dimension so the
/// stored sequence is resolution independent. Serializes as the `[x, y,
/// confidence]` triple of the sequence JSON contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    /// A zero entry standing in for an unobservable point.
    pub fn absent() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn is_visible(&self) -> bool {
        self.confidence > 0.0
    }

    pub fn distance_to(&self, other: &Keypoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[f64; 3]> for Keypoint {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Keypoint> for [f64; 3] {
    fn from(kp: Keypoint) -> Self {
        [kp.x, kp.y, kp.confidence]
    }
}
