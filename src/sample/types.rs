// Sample types
// Normalized, timestamped values produced by ingestion and consumed by recognizers

use serde::{Deserialize, Serialize};

/// Capture time in integer milliseconds on the producing device's clock
pub type Millis = u64;

/// Three-axis vector (acceleration in m/s^2, angular velocity in rad/s)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Vector axis selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    pub fn component(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Orientation quaternion as reported by the device's rotation-vector sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Inertial modality tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Accel,
    Gyro,
    Orientation,
    Button,
}

impl Modality {
    /// Parse a transport tag. Accepts the aliases older device builds send.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "accel" | "accelerometer" => Some(Modality::Accel),
            "gyro" | "gyroscope" => Some(Modality::Gyro),
            "orientation" | "rotq" => Some(Modality::Orientation),
            "button" | "volkey" | "key" => Some(Modality::Button),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Accel => "accel",
            Modality::Gyro => "gyro",
            Modality::Orientation => "orientation",
            Modality::Button => "button",
        }
    }

    /// Number of numeric values a record of this modality carries
    pub fn arity(&self) -> usize {
        match self {
            Modality::Accel | Modality::Gyro => 3,
            Modality::Orientation => 4,
            // button code, pressed flag
            Modality::Button => 2,
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accelerometer or gyroscope reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub value: Vec3,
    pub capture_ms: Millis,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64, capture_ms: Millis) -> Self {
        MotionSample {
            value: Vec3::new(x, y, z),
            capture_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub rotation: Quaternion,
    pub capture_ms: Millis,
}

/// Press or release of a hardware button on the handheld device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEdge {
    /// Platform key code (e.g. 24 = volume up, 25 = volume down on Android)
    pub code: u32,
    pub pressed: bool,
    pub capture_ms: Millis,
}

/// One typed sample from the handheld device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InertialSample {
    Accel(MotionSample),
    Gyro(MotionSample),
    Orientation(OrientationSample),
    Button(ButtonEdge),
}

impl InertialSample {
    pub fn modality(&self) -> Modality {
        match self {
            InertialSample::Accel(_) => Modality::Accel,
            InertialSample::Gyro(_) => Modality::Gyro,
            InertialSample::Orientation(_) => Modality::Orientation,
            InertialSample::Button(_) => Modality::Button,
        }
    }

    pub fn capture_ms(&self) -> Millis {
        match self {
            InertialSample::Accel(s) | InertialSample::Gyro(s) => s.capture_ms,
            InertialSample::Orientation(s) => s.capture_ms,
            InertialSample::Button(b) => b.capture_ms,
        }
    }
}

/// Normalized image coordinate of one skeletal joint
/// x grows rightward, y grows downward, both nominally in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64) -> Self {
        Landmark { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Hip, knee and ankle of one leg
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Leg {
    pub hip: Landmark,
    pub knee: Landmark,
    pub ankle: Landmark,
}

impl Leg {
    pub fn landmarks(&self) -> [(&'static str, Landmark); 3] {
        [("hip", self.hip), ("knee", self.knee), ("ankle", self.ankle)]
    }
}

/// Head and hands, for gestures made above the shoulders
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UpperBody {
    pub nose: Landmark,
    pub left_wrist: Landmark,
    pub right_wrist: Landmark,
}

impl UpperBody {
    pub fn landmarks(&self) -> [(&'static str, Landmark); 3] {
        [
            ("nose", self.nose),
            ("left_wrist", self.left_wrist),
            ("right_wrist", self.right_wrist),
        ]
    }
}

/// Landmarks from one processed video frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseFrame {
    pub left: Leg,
    pub right: Leg,

    /// Estimators that only track legs leave this at the default
    #[serde(default)]
    pub upper: UpperBody,

    pub capture_ms: Millis,
}

impl PoseFrame {
    pub fn leg(&self, side: Side) -> &Leg {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Midpoint of both hips
    pub fn hip_center(&self) -> Landmark {
        Landmark::new(
            (self.left.hip.x + self.right.hip.x) / 2.0,
            (self.left.hip.y + self.right.hip.y) / 2.0,
        )
    }
}
