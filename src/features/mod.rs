// Feature extraction module
// Rolling windows and the stateless transforms computed over them

pub mod extract;
pub mod window;

pub use extract::{delta_magnitude, distance, ema, joint_angle, magnitude, peak, span_delta};
pub use window::{FeatureWindow, Freshness, MAX_WINDOW, MIN_WINDOW};
