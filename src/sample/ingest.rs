// Sample ingestion
// Validates loosely-typed inbound records into typed samples

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sample::types::{
    ButtonEdge, InertialSample, Landmark, Modality, MotionSample, OrientationSample, PoseFrame,
    Quaternion,
};

/// Quaternions whose norm strays further than this from 1 are rejected
const QUATERNION_NORM_TOLERANCE: f64 = 0.5;

#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("Unknown modality: {0}")]
    UnknownModality(String),

    #[error("Malformed {modality} sample: expected {expected} values, got {actual}")]
    WrongArity {
        modality: Modality,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite value in {0} sample")]
    NonFinite(Modality),

    #[error("Negative capture timestamp: {0}")]
    NegativeTimestamp(i64),

    #[error("Invalid button record: code {code}, state {state}")]
    InvalidButton { code: f64, state: f64 },

    #[error("Orientation quaternion norm {0:.3} is not close to 1")]
    DegenerateQuaternion(f64),

    #[error("Landmark {joint} out of range: ({x:.3}, {y:.3})")]
    LandmarkOutOfRange { joint: String, x: f64, y: f64 },
}

/// An inertial record as delivered by the transport decoder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInertialRecord {
    /// Modality tag (accel | gyro | orientation | button)
    pub modality: String,

    /// 2-4 numeric values depending on modality
    pub values: Vec<f64>,

    /// Capture timestamp in milliseconds
    pub capture_ms: i64,

    /// Set by the device when the record is a latency probe
    #[serde(default)]
    pub diagnostic: bool,
}

impl RawInertialRecord {
    pub fn new(modality: impl Into<String>, values: Vec<f64>, capture_ms: i64) -> Self {
        RawInertialRecord {
            modality: modality.into(),
            values,
            capture_ms,
            diagnostic: false,
        }
    }
}

/// Convert a raw record into a typed sample
pub fn ingest_inertial(record: &RawInertialRecord) -> Result<InertialSample, SampleError> {
    let modality = Modality::from_tag(&record.modality)
        .ok_or_else(|| SampleError::UnknownModality(record.modality.clone()))?;

    if record.values.len() != modality.arity() {
        return Err(SampleError::WrongArity {
            modality,
            expected: modality.arity(),
            actual: record.values.len(),
        });
    }

    if record.values.iter().any(|v| !v.is_finite()) {
        return Err(SampleError::NonFinite(modality));
    }

    let capture_ms = u64::try_from(record.capture_ms)
        .map_err(|_| SampleError::NegativeTimestamp(record.capture_ms))?;

    if record.diagnostic {
        log::debug!("Diagnostic {} record at {} ms", modality, capture_ms);
    }

    let v = &record.values;
    let sample = match modality {
        Modality::Accel => InertialSample::Accel(MotionSample::new(v[0], v[1], v[2], capture_ms)),
        Modality::Gyro => InertialSample::Gyro(MotionSample::new(v[0], v[1], v[2], capture_ms)),
        Modality::Orientation => {
            let rotation = Quaternion {
                w: v[0],
                x: v[1],
                y: v[2],
                z: v[3],
            };
            check_quaternion(&rotation)?;
            InertialSample::Orientation(OrientationSample {
                rotation,
                capture_ms,
            })
        }
        Modality::Button => {
            let (code, state) = (v[0], v[1]);
            let valid_code = code >= 0.0 && code.fract() == 0.0 && code <= u32::MAX as f64;
            let valid_state = state == 0.0 || state == 1.0;
            if !valid_code || !valid_state {
                return Err(SampleError::InvalidButton { code, state });
            }
            InertialSample::Button(ButtonEdge {
                code: code as u32,
                pressed: state == 1.0,
                capture_ms,
            })
        }
    };

    Ok(sample)
}

/// Check that a typed sample is usable by the recognizers
pub fn validate_inertial(sample: &InertialSample) -> Result<(), SampleError> {
    match sample {
        InertialSample::Accel(s) | InertialSample::Gyro(s) => {
            if s.value.is_finite() {
                Ok(())
            } else {
                Err(SampleError::NonFinite(sample.modality()))
            }
        }
        InertialSample::Orientation(s) => check_quaternion(&s.rotation),
        InertialSample::Button(_) => Ok(()),
    }
}

fn check_quaternion(rotation: &Quaternion) -> Result<(), SampleError> {
    if !rotation.is_finite() {
        return Err(SampleError::NonFinite(Modality::Orientation));
    }
    let norm = rotation.norm();
    if (norm - 1.0).abs() > QUATERNION_NORM_TOLERANCE {
        return Err(SampleError::DegenerateQuaternion(norm));
    }
    Ok(())
}

/// Check every landmark lies in [0, 1] widened by `margin` on each side
pub fn validate_pose(frame: &PoseFrame, margin: f64) -> Result<(), SampleError> {
    let (lo, hi) = (-margin, 1.0 + margin);

    let check = |joint: String, lm: Landmark| {
        let in_range = lm.x.is_finite()
            && lm.y.is_finite()
            && (lo..=hi).contains(&lm.x)
            && (lo..=hi).contains(&lm.y);
        if in_range {
            Ok(())
        } else {
            Err(SampleError::LandmarkOutOfRange {
                joint,
                x: lm.x,
                y: lm.y,
            })
        }
    };

    for (side, leg) in [("left", &frame.left), ("right", &frame.right)] {
        for (name, lm) in leg.landmarks() {
            check(format!("{}_{}", side, name), lm)?;
        }
    }
    for (name, lm) in frame.upper.landmarks() {
        check(name.to_string(), lm)?;
    }

    Ok(())
}
