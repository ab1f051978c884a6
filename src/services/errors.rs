use thiserror::Error;

/// Failure modes of a full comparison.
///
/// Per-frame anomalies (degenerate poses, tracking losses, malformed
/// detections) are absorbed where they occur; only these variants abort a
/// comparison.
#[derive(Error, Debug)]
pub enum ComparisonError {
    /// Fewer valid frames than the alignment minimum, before or after the
    /// offset search. Non-retryable: the caller gets an explicit no-score
    /// outcome instead of a misleading number.
    #[error("Insufficient data: {reason} ({frames} frames, {required} required)")]
    InsufficientData {
        reason: String,
        frames: usize,
        required: usize,
    },
    #[error("Sequence contains no frames")]
    EmptySequence,
}
