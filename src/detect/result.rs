use serde::Serialize;
use std::time::SystemTime;

use crate::classes::{DangerTier, ObjectClass};
use crate::geometry::BoundingBox;

/// Horizontal position of a detection relative to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Position {
    Left,
    Center,
    Right,
}

impl Position {
    /// Bucket a normalized horizontal center (0..1) into frame thirds.
    pub fn from_normalized_x(x: f32) -> Self {
        if x < 0.33 {
            Position::Left
        } else if x > 0.66 {
            Position::Right
        } else {
            Position::Center
        }
    }

    /// Spoken phrase for the position.
    pub fn phrase(self) -> &'static str {
        match self {
            Position::Left => "on your left",
            Position::Right => "on your right",
            Position::Center => "directly ahead",
        }
    }
}

/// One detected object instance in a single frame.
///
/// The tier is unset when the decoder creates the detection and is written
/// once by the danger classifier.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub class: ObjectClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub position: Position,
    pub danger_tier: Option<DangerTier>,
    pub detected_at: SystemTime,
}

impl Detection {
    pub fn new(class: ObjectClass, confidence: f32, bbox: BoundingBox, position: Position) -> Self {
        Self {
            class,
            confidence,
            bbox,
            position,
            danger_tier: None,
            detected_at: SystemTime::now(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.class.label()
    }

    /// Assigned tier, or `Low` if the classifier has not run.
    pub fn tier(&self) -> DangerTier {
        self.danger_tier.unwrap_or(DangerTier::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_buckets_by_thirds() {
        assert_eq!(Position::from_normalized_x(0.1), Position::Left);
        assert_eq!(Position::from_normalized_x(0.33), Position::Center);
        assert_eq!(Position::from_normalized_x(0.5), Position::Center);
        assert_eq!(Position::from_normalized_x(0.66), Position::Center);
        assert_eq!(Position::from_normalized_x(0.9), Position::Right);
    }

    #[test]
    fn new_detection_is_unclassified() {
        let d = Detection::new(
            ObjectClass::CAR,
            0.9,
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            Position::Center,
        );
        assert_eq!(d.danger_tier, None);
        assert_eq!(d.tier(), DangerTier::Low);
        assert_eq!(d.label(), "car");
    }
}
