use tracing::{debug, info, warn};

use crate::config::TrackingConfig;
use crate::models::{joint, Detection, FrameRecord, Keypoint, Sequence, VideoMeta};

/// Follows one subject through a noisy, multi-person detection stream and
/// accumulates one `FrameRecord` per decoded frame.
///
/// Matching is hybrid: the detector-assigned track id is trusted first; when
/// the id disappears the nearest detection to the last known position takes
/// over, bounded by a fraction of the frame width. All tracking state is
/// local to one video.
pub struct SubjectTracker {
    config: TrackingConfig,
    metadata: VideoMeta,
    target_track_id: Option<i64>,
    last_center: Option<(f64, f64)>,
    acquired: bool,
    position_seeded: bool,
    lost_streak: u32,
    frames: Vec<FrameRecord>,
}

impl SubjectTracker {
    pub fn new(config: TrackingConfig, metadata: VideoMeta) -> Self {
        Self {
            config,
            metadata,
            target_track_id: None,
            last_center: None,
            acquired: false,
            position_seeded: false,
            lost_streak: 0,
            frames: Vec::new(),
        }
    }

    /// Start already locked onto a detector id, as when an external UI has
    /// picked the subject. Position-based recovery activates once the id has
    /// been seen at least once.
    pub fn with_target_id(mut self, track_id: i64) -> Self {
        self.target_track_id = Some(track_id);
        self.acquired = true;
        self
    }

    /// Start from a pixel position instead of an id. The nearest detection
    /// is adopted unconditionally on the first frame with any, since a UI
    /// seed may sit well off the body; the distance bound applies from then
    /// on.
    pub fn with_target_position(mut self, x: f64, y: f64) -> Self {
        self.last_center = Some((x, y));
        self.acquired = true;
        self.position_seeded = true;
        self
    }

    /// Consume one frame's detections and append the resulting record.
    pub fn process_frame(&mut self, detections: &[Detection]) -> &FrameRecord {
        let frame_index = self.frames.len();
        let timestamp = if self.metadata.fps > 0.0 {
            frame_index as f64 / self.metadata.fps
        } else {
            0.0
        };

        if !self.acquired {
            self.acquire(detections, frame_index);
        }

        let record = match self.select_detection(detections) {
            Some(detection) => {
                self.lost_streak = 0;
                self.last_center = Some((detection.center_x, detection.center_y));
                self.build_record(frame_index, timestamp, &detection)
            }
            None => {
                self.register_miss(frame_index);
                FrameRecord::invalid(frame_index, timestamp)
            }
        };

        self.frames.push(record);
        self.frames.last().unwrap()
    }

    /// Finish the video and hand over the immutable sequence.
    pub fn finish(mut self) -> Sequence {
        if !self.acquired {
            warn!("No subject was detected in the entire video");
        }
        self.metadata.total_frames = self.frames.len() as u32;
        if self.metadata.fps > 0.0 {
            self.metadata.duration_sec = self.frames.len() as f64 / self.metadata.fps;
        }
        let mut sequence = Sequence::new(self.metadata);
        sequence.frames = self.frames;
        sequence
    }

    /// Initial target selection: the largest box on the first frame with any
    /// detections.
    fn acquire(&mut self, detections: &[Detection], frame_index: usize) {
        let largest = detections.iter().max_by(|a, b| {
            a.box_area()
                .partial_cmp(&b.box_area())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let Some(detection) = largest {
            self.target_track_id = detection.track_id;
            self.last_center = Some((detection.center_x, detection.center_y));
            self.acquired = true;
            info!(
                frame_index,
                track_id = ?self.target_track_id,
                "Subject acquired"
            );
        }
    }

    /// Id-first matching with distance-bounded fallback.
    fn select_detection(&mut self, detections: &[Detection]) -> Option<Detection> {
        if !self.acquired {
            return None;
        }

        // The detector's own id is the strongest evidence.
        if let Some(target_id) = self.target_track_id {
            if let Some(detection) = detections
                .iter()
                .find(|d| d.track_id == Some(target_id))
            {
                return Some(detection.clone());
            }
        }

        // Id lost: fall back to the nearest detection to the last known
        // position, within the Re-ID bound.
        let (last_x, last_y) = self.last_center?;
        let bound = self.config.reid_distance_ratio * self.metadata.video_width as f64;

        let nearest = detections
            .iter()
            .map(|d| (d.center_distance_to(last_x, last_y), d))
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let (dist, detection) = nearest?;
        // The first match after a position seed is exempt from the bound.
        if dist >= bound && !self.position_seeded {
            return None;
        }
        self.position_seeded = false;
        // A null-id fallback detection must not overwrite a known stable id;
        // follow its position without adopting the missing id.
        if let Some(new_id) = detection.track_id {
            if self.target_track_id != Some(new_id) {
                info!(
                    old_id = ?self.target_track_id,
                    new_id,
                    distance = dist,
                    "Target re-identified under a new track id"
                );
                self.target_track_id = Some(new_id);
            }
        }
        Some(detection.clone())
    }

    fn register_miss(&mut self, frame_index: usize) {
        if !self.acquired {
            return;
        }
        self.lost_streak += 1;
        debug!(frame_index, streak = self.lost_streak, "Subject unmatched");
        if let Some(max_lost) = self.config.max_lost_frames {
            if self.lost_streak > max_lost {
                info!(
                    frame_index,
                    max_lost, "Loss limit reached, releasing target"
                );
                self.target_track_id = None;
                self.last_center = None;
                self.acquired = false;
                self.lost_streak = 0;
            }
        }
        // Without a loss limit, the last known position is carried forward
        // indefinitely so the subject can re-appear at any point.
    }

    /// Normalize the matched detection into the 18-entry record shape.
    fn build_record(
        &self,
        frame_index: usize,
        timestamp: f64,
        detection: &Detection,
    ) -> FrameRecord {
        if detection.keypoints.len() != joint::RAW_COUNT {
            warn!(
                frame_index,
                count = detection.keypoints.len(),
                "Detection has unexpected keypoint count, skipping frame"
            );
            return FrameRecord::invalid(frame_index, timestamp);
        }

        let max_dim = self.metadata.max_dimension();
        let mut keypoints: Vec<Keypoint> = detection
            .keypoints
            .iter()
            .map(|kp| {
                let (x, y) = if max_dim > 0.0 {
                    (kp.x / max_dim, kp.y / max_dim)
                } else {
                    (0.0, 0.0)
                };
                Keypoint::new(
                    x.clamp(0.0, 1.0),
                    y.clamp(0.0, 1.0),
                    kp.confidence.clamp(0.0, 1.0),
                )
            })
            .collect();

        // Derived neck: shoulder midpoint when both shoulders are visible.
        let left = keypoints[joint::LEFT_SHOULDER];
        let right = keypoints[joint::RIGHT_SHOULDER];
        let neck = if left.is_visible() && right.is_visible() {
            Keypoint::new(
                (left.x + right.x) / 2.0,
                (left.y + right.y) / 2.0,
                (left.confidence + right.confidence) / 2.0,
            )
        } else {
            Keypoint::absent()
        };
        keypoints.push(neck);

        FrameRecord::valid(frame_index, timestamp, keypoints)
    }
}
