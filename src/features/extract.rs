// Feature extraction
// Pure transforms over feature windows used by the gesture recognizers
// All return 0 for windows too short to carry the feature

use crate::features::window::FeatureWindow;
use crate::sample::{Axis, Landmark, Vec3};

/// Euclidean norm of any number of axes
pub fn magnitude(axes: &[f64]) -> f64 {
    axes.iter().map(|a| a * a).sum::<f64>().sqrt()
}

/// Magnitude of the difference between the two most recent vectors
/// Tracks sample-to-sample jerk rather than absolute level, so the constant
/// gravity component of accelerometer readings cancels out
pub fn delta_magnitude(window: &FeatureWindow<Vec3>) -> f64 {
    match window.last_two() {
        Some((prev, curr)) => distance(&prev, &curr),
        None => 0.0,
    }
}

/// Euclidean distance between two vectors
pub fn distance(a: &Vec3, b: &Vec3) -> f64 {
    let d = b.sub(a);
    magnitude(&[d.x, d.y, d.z])
}

/// Exponential moving average step: (1 - alpha) * prev + alpha * sample
pub fn ema(prev: f64, sample: f64, alpha: f64) -> f64 {
    (1.0 - alpha) * prev + alpha * sample
}

/// Largest absolute value of one axis across the window
pub fn peak(window: &FeatureWindow<Vec3>, axis: Axis) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    window
        .iter()
        .map(|v| v.component(axis).abs())
        .fold(0.0, f64::max)
}

/// Newest minus oldest value in the window
pub fn span_delta(window: &FeatureWindow<f64>) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    match (window.oldest(), window.latest()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    }
}

/// Angle at `b` formed by the segments b→a and b→c, in degrees [0, 180]
pub fn joint_angle(a: Landmark, b: Landmark, c: Landmark) -> f64 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let angle = radians.to_degrees().abs();
    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_window(values: &[(f64, f64, f64)]) -> FeatureWindow<Vec3> {
        let mut window = FeatureWindow::new(10);
        for &(x, y, z) in values {
            window.push(Vec3::new(x, y, z));
        }
        window
    }

    #[test]
    fn test_magnitude() {
        assert_eq!(magnitude(&[3.0, 4.0]), 5.0);
        assert_eq!(magnitude(&[]), 0.0);
        assert!((magnitude(&[0.0, 0.0, 9.8]) - 9.8).abs() < 1e-12);
    }

    #[test]
    fn test_delta_magnitude_ignores_gravity() {
        let resting = vec_window(&[(0.0, 0.0, 9.8), (0.0, 0.0, 9.8)]);
        assert_eq!(delta_magnitude(&resting), 0.0);

        let swing = vec_window(&[(0.0, 0.0, 9.8), (30.0, 0.0, 9.8)]);
        assert!((delta_magnitude(&swing) - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance() {
        let a = Vec3::new(1.0, 2.0, 9.8);
        let b = Vec3::new(4.0, 6.0, 9.8);
        assert!((distance(&a, &b) - 5.0).abs() < 1e-12);
        assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn test_short_windows_are_neutral() {
        let empty = vec_window(&[]);
        let single = vec_window(&[(50.0, 50.0, 50.0)]);

        assert_eq!(delta_magnitude(&empty), 0.0);
        assert_eq!(delta_magnitude(&single), 0.0);
        assert_eq!(peak(&single, Axis::Y), 0.0);

        let mut scalar = FeatureWindow::new(5);
        assert_eq!(span_delta(&scalar), 0.0);
        scalar.push(0.7);
        assert_eq!(span_delta(&scalar), 0.0);
    }

    #[test]
    fn test_ema() {
        assert_eq!(ema(0.0, 1.0, 0.25), 0.25);
        assert_eq!(ema(1.0, 1.0, 0.5), 1.0);
        assert_eq!(ema(2.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_peak_uses_absolute_value() {
        let window = vec_window(&[(0.0, 1.0, 0.0), (0.0, -5.0, 0.0), (0.0, 3.0, 0.0)]);
        assert_eq!(peak(&window, Axis::Y), 5.0);
        assert_eq!(peak(&window, Axis::X), 0.0);
    }

    #[test]
    fn test_span_delta() {
        let mut window = FeatureWindow::new(5);
        for x in [0.40, 0.42, 0.45, 0.50] {
            window.push(x);
        }
        assert!((span_delta(&window) - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_joint_angle() {
        // Straight leg
        let straight = joint_angle(
            Landmark::new(0.5, 0.4),
            Landmark::new(0.5, 0.6),
            Landmark::new(0.5, 0.8),
        );
        assert!((straight - 180.0).abs() < 1e-9);

        // Right angle at the knee
        let bent = joint_angle(
            Landmark::new(0.3, 0.6),
            Landmark::new(0.5, 0.6),
            Landmark::new(0.5, 0.8),
        );
        assert!((bent - 90.0).abs() < 1e-9);
    }
}
