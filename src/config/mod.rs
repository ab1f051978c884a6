use anyhow::Result;
use std::env;

/// Subject tracking configuration
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Re-identification distance bound as a fraction of frame width.
    pub reid_distance_ratio: f64,
    /// Consecutive misses before the target is dropped and acquisition
    /// starts over. `None` waits indefinitely for re-acquisition.
    pub max_lost_frames: Option<u32>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            reid_distance_ratio: 0.20,
            max_lost_frames: None,
        }
    }
}

/// Gap interpolation configuration
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Longest invalid run bridged by interpolation, in seconds.
    pub max_gap_seconds: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_gap_seconds: 0.3,
        }
    }
}

/// Temporal alignment configuration
#[derive(Debug, Clone)]
pub struct AlignmentConfig {
    /// Offset search range in frames, searched symmetrically.
    pub max_offset: usize,
    /// Minimum usable overlap in feature frames; also the minimum valid
    /// frame count per sequence.
    pub min_overlap: usize,
    /// Warp band radius around the diagonal, in frames.
    pub dtw_radius: usize,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            max_offset: 90,
            min_overlap: 30,
            dtw_radius: 30,
        }
    }
}

/// Scoring model configuration. The tolerance constants are deliberately
/// tunable; none of them has a closed-form derivation.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Shape tolerance in degrees of mean angular distance.
    pub shape_tolerance: f64,
    /// Timing tolerance in frames of mean path offset.
    pub timing_tolerance: f64,
    pub shape_weight: f64,
    pub timing_weight: f64,
    /// Positional error threshold per joint, in spine-length units.
    pub joint_error_threshold: f64,
    /// Angle difference marking a timeline error, in degrees.
    pub angle_error_threshold_deg: f64,
    /// Visibility ratio below which the grade drops one tier.
    pub visibility_floor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            shape_tolerance: 15.0,
            timing_tolerance: 10.0,
            shape_weight: 0.7,
            timing_weight: 0.3,
            joint_error_threshold: 0.15,
            angle_error_threshold_deg: 20.0,
            visibility_floor: 0.7,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub tracking: TrackingConfig,
    pub preprocess: PreprocessConfig,
    pub alignment: AlignmentConfig,
    pub scoring: ScoringConfig,
}

impl EngineConfig {
    /// Create configuration from environment variables, falling back to the
    /// built-in defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            tracking: TrackingConfig {
                reid_distance_ratio: env_f64(
                    "REID_DISTANCE_RATIO",
                    defaults.tracking.reid_distance_ratio,
                )?,
                max_lost_frames: match env::var("MAX_LOST_FRAMES") {
                    Ok(v) => Some(v.parse()?),
                    Err(_) => defaults.tracking.max_lost_frames,
                },
            },
            preprocess: PreprocessConfig {
                max_gap_seconds: env_f64("MAX_GAP_SECONDS", defaults.preprocess.max_gap_seconds)?,
            },
            alignment: AlignmentConfig {
                max_offset: env_usize("SYNC_MAX_OFFSET", defaults.alignment.max_offset)?,
                min_overlap: env_usize("SYNC_MIN_OVERLAP", defaults.alignment.min_overlap)?,
                dtw_radius: env_usize("DTW_RADIUS", defaults.alignment.dtw_radius)?,
            },
            scoring: ScoringConfig {
                shape_tolerance: env_f64("SHAPE_TOLERANCE", defaults.scoring.shape_tolerance)?,
                timing_tolerance: env_f64("TIMING_TOLERANCE", defaults.scoring.timing_tolerance)?,
                shape_weight: env_f64("SHAPE_WEIGHT", defaults.scoring.shape_weight)?,
                timing_weight: env_f64("TIMING_WEIGHT", defaults.scoring.timing_weight)?,
                joint_error_threshold: env_f64(
                    "JOINT_ERROR_THRESHOLD",
                    defaults.scoring.joint_error_threshold,
                )?,
                angle_error_threshold_deg: env_f64(
                    "ANGLE_ERROR_THRESHOLD_DEG",
                    defaults.scoring.angle_error_threshold_deg,
                )?,
                visibility_floor: env_f64("VISIBILITY_FLOOR", defaults.scoring.visibility_floor)?,
            },
        })
    }
}

fn env_f64(key: &str, default: f64) -> Result<f64> {
    match env::var(key) {
        Ok(v) => Ok(v.parse()?),
        Err(_) => Ok(default),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(v) => Ok(v.parse()?),
        Err(_) => Ok(default),
    }
}
