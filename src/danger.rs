//! Danger assessment.
//!
//! Tiers are derived deterministically from the class and the box:
//! 1. base tier from the class table,
//! 2. one step up when the box covers more than 30% of the model's square
//!    input area (the object is very close),
//! 3. one more step when the object is directly ahead and already at least
//!    `Medium` after step 2.
//!
//! Both escalations saturate at `Critical`.

use crate::classes::DangerTier;
use crate::detect::{Detection, Position};

pub const DEFAULT_CLOSE_AREA_FRACTION: f32 = 0.3;

#[derive(Clone, Debug)]
pub struct DangerClassifier {
    input_size: u32,
    close_area_fraction: f32,
}

impl DangerClassifier {
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size,
            close_area_fraction: DEFAULT_CLOSE_AREA_FRACTION,
        }
    }

    pub fn with_close_area_fraction(mut self, fraction: f32) -> Self {
        self.close_area_fraction = fraction;
        self
    }

    pub fn classify(&self, detection: &Detection) -> DangerTier {
        let mut tier = detection.class.base_tier();

        let side = self.input_size as f32;
        if detection.bbox.area() > self.close_area_fraction * side * side {
            tier = tier.escalate();
        }

        if detection.position == Position::Center && tier >= DangerTier::Medium {
            tier = tier.escalate();
        }

        tier
    }

    /// Assign the tier to a detection that has not been classified yet.
    pub fn assess(&self, detection: &mut Detection) {
        if detection.danger_tier.is_none() {
            detection.danger_tier = Some(self.classify(detection));
        }
    }
}
