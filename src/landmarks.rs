//! Hand landmark geometry and feature centering.

use serde::{Deserialize, Serialize};

/// Landmarks per detected hand in the extractor's vocabulary.
pub const HAND_LANDMARKS: usize = 21;

/// Index fingertip, the landmark swipe tracking follows.
pub const INDEX_TIP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Distance from the origin. On centered features the origin is the
    /// hand centroid.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Subtracts the per-axis mean from every landmark, removing dependence on
/// where the hand sits in the frame while preserving relative shape.
///
/// An empty set (no hand detected this frame) yields an empty vector; the
/// caller treats that frame as idle rather than an error.
pub fn center(landmarks: &[Point]) -> Vec<Point> {
    if landmarks.is_empty() {
        return Vec::new();
    }
    let n = landmarks.len() as f32;
    let mean_x: f32 = landmarks.iter().map(|p| p.x).sum::<f32>() / n;
    let mean_y: f32 = landmarks.iter().map(|p| p.y).sum::<f32>() / n;
    landmarks
        .iter()
        .map(|p| Point::new(p.x - mean_x, p.y - mean_y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_zero_mean() {
        let raw = vec![
            Point::new(120.0, 40.0),
            Point::new(300.0, 220.0),
            Point::new(95.0, 180.0),
            Point::new(410.0, 77.0),
        ];
        let centered = center(&raw);
        assert_eq!(centered.len(), raw.len());

        let n = centered.len() as f32;
        let mean_x: f32 = centered.iter().map(|p| p.x).sum::<f32>() / n;
        let mean_y: f32 = centered.iter().map(|p| p.y).sum::<f32>() / n;
        assert!(mean_x.abs() < 1e-4, "x mean was {mean_x}");
        assert!(mean_y.abs() < 1e-4, "y mean was {mean_y}");
    }

    #[test]
    fn test_center_preserves_shape() {
        let raw = vec![Point::new(10.0, 10.0), Point::new(20.0, 30.0)];
        let shifted: Vec<Point> = raw
            .iter()
            .map(|p| Point::new(p.x + 500.0, p.y - 42.0))
            .collect();
        assert_eq!(center(&raw), center(&shifted));
    }

    #[test]
    fn test_center_empty_is_empty() {
        assert!(center(&[]).is_empty());
    }

    #[test]
    fn test_center_single_point() {
        let centered = center(&[Point::new(33.0, 44.0)]);
        assert_eq!(centered, vec![Point::new(0.0, 0.0)]);
    }
}
