use serde::{Deserialize, Serialize};

/// One raw keypoint as emitted by the pose model, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawKeypoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl RawKeypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }
}

/// One candidate person in one frame, as delivered by the detection adapter.
///
/// `track_id` is the detector-assigned identity. It is not guaranteed stable
/// and may be absent entirely when the detector falls back to plain
/// per-frame prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub track_id: Option<i64>,
    /// Bounding-box center in pixels.
    pub center_x: f64,
    pub center_y: f64,
    /// Bounding-box size in pixels.
    pub width: f64,
    pub height: f64,
    /// The 17 body keypoints in pixel coordinates.
    pub keypoints: Vec<RawKeypoint>,
}

impl Detection {
    pub fn box_area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center_distance_to(&self, x: f64, y: f64) -> f64 {
        let dx = self.center_x - x;
        let dy = self.center_y - y;
        (dx * dx + dy * dy).sqrt()
    }
}
