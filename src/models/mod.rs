// Data model for the motion comparison engine

pub mod detection;
pub mod keypoint;
pub mod score;
pub mod sequence;

pub use detection::*;
pub use keypoint::*;
pub use score::*;
pub use sequence::*;
