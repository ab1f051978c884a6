// Engine services

pub mod alignment_service;
pub mod errors;
pub mod feature_extraction_service;
pub mod scoring_service;
pub mod sequence_preprocessing_service;
pub mod tracking_service;

pub use alignment_service::{Alignment, AlignmentService, FeatureFrame};
pub use errors::ComparisonError;
pub use feature_extraction_service::{
    extract_features, normalize_pose, FeatureVector, NormalizedPose,
};
pub use scoring_service::MotionComparisonService;
pub use sequence_preprocessing_service::interpolate_gaps;
pub use tracking_service::SubjectTracker;
