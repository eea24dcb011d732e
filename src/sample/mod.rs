// Sample model
// Typed inertial, button and pose samples plus validation of raw records

pub mod ingest;
pub mod types;

pub use ingest::{ingest_inertial, validate_inertial, validate_pose, RawInertialRecord, SampleError};
pub use types::{
    Axis, ButtonEdge, InertialSample, Landmark, Leg, Millis, Modality, MotionSample,
    OrientationSample, PoseFrame, Quaternion, Side, UpperBody, Vec3,
};
