//! Spoken-alert gating.
//!
//! Detections at `High` or above raise an alert the first time their class is
//! seen within the current cooldown window. The window is cleared wholesale
//! by the orchestrator's timer and on session start/stop, so a hazard that is
//! still present is announced again once the window lapses.

use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::classes::{DangerTier, ObjectClass};
use crate::detect::Detection;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Tier at which a detection is announced.
pub const ALERT_TIER: DangerTier = DangerTier::High;

/// A newly announced hazard.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DangerAlert {
    pub detection: Detection,
    /// Phrase for the speech layer.
    pub message: String,
}

impl DangerAlert {
    pub fn for_detection(detection: &Detection) -> Self {
        Self {
            message: alert_message(detection),
            detection: detection.clone(),
        }
    }

    pub fn tier(&self) -> DangerTier {
        self.detection.tier()
    }

    pub fn label(&self) -> &'static str {
        self.detection.label()
    }
}

/// "Stop! car directly ahead!" for critical hazards, "Caution! ..." otherwise.
pub fn alert_message(detection: &Detection) -> String {
    let label = detection.label();
    let place = detection.position.phrase();
    if detection.tier() == DangerTier::Critical {
        format!("Stop! {} {}!", label, place)
    } else {
        format!("Caution! {} {}.", label, place)
    }
}

/// Classes alerted within the current cooldown window.
#[derive(Debug)]
pub struct AlertDeduplicator {
    alerted: HashSet<ObjectClass>,
    window_started: Instant,
}

impl AlertDeduplicator {
    pub fn new() -> Self {
        Self {
            alerted: HashSet::new(),
            window_started: Instant::now(),
        }
    }

    /// Start a fresh window.
    pub fn reset(&mut self) {
        self.alerted.clear();
        self.window_started = Instant::now();
    }

    pub fn window_started(&self) -> Instant {
        self.window_started
    }

    pub fn is_cooling_down(&self, class: ObjectClass) -> bool {
        self.alerted.contains(&class)
    }

    pub fn alerted_count(&self) -> usize {
        self.alerted.len()
    }

    /// Alerts for the frame's tiered detections, in detection order.
    pub fn observe(&mut self, detections: &[Detection]) -> Vec<DangerAlert> {
        detections
            .iter()
            .filter(|d| d.tier() >= ALERT_TIER)
            .filter(|d| self.alerted.insert(d.class))
            .map(DangerAlert::for_detection)
            .collect()
    }
}

impl Default for AlertDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Position;
    use crate::geometry::BoundingBox;

    fn det(class: ObjectClass, tier: DangerTier, position: Position) -> Detection {
        let mut d = Detection::new(class, 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0), position);
        d.danger_tier = Some(tier);
        d
    }

    #[test]
    fn same_class_alerts_once_per_window() {
        let mut dedup = AlertDeduplicator::new();
        let frame = vec![
            det(ObjectClass::CAR, DangerTier::Critical, Position::Center),
            det(ObjectClass::CAR, DangerTier::Critical, Position::Left),
        ];
        let alerts = dedup.observe(&frame);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].detection.position, Position::Center);

        assert!(dedup.observe(&frame).is_empty());
        assert!(dedup.is_cooling_down(ObjectClass::CAR));
    }

    #[test]
    fn different_classes_each_alert() {
        let mut dedup = AlertDeduplicator::new();
        let frame = vec![
            det(ObjectClass::CAR, DangerTier::Critical, Position::Center),
            det(ObjectClass::TRUCK, DangerTier::Critical, Position::Right),
        ];
        let alerts = dedup.observe(&frame);
        let labels: Vec<&str> = alerts.iter().map(DangerAlert::label).collect();
        assert_eq!(labels, vec!["car", "truck"]);
    }

    #[test]
    fn below_high_never_alerts_or_consumes_cooldown() {
        let mut dedup = AlertDeduplicator::new();
        let frame = vec![det(ObjectClass::PERSON, DangerTier::Medium, Position::Center)];
        assert!(dedup.observe(&frame).is_empty());
        assert_eq!(dedup.alerted_count(), 0);

        let frame = vec![det(ObjectClass::PERSON, DangerTier::High, Position::Center)];
        assert_eq!(dedup.observe(&frame).len(), 1);
    }

    #[test]
    fn reset_reopens_the_window() {
        let mut dedup = AlertDeduplicator::new();
        let frame = vec![det(ObjectClass::BUS, DangerTier::High, Position::Left)];
        let before = dedup.window_started();
        assert_eq!(dedup.observe(&frame).len(), 1);
        dedup.reset();
        assert!(dedup.window_started() >= before);
        assert_eq!(dedup.observe(&frame).len(), 1);
    }

    #[test]
    fn messages_depend_on_tier_and_position() {
        let critical = det(ObjectClass::CAR, DangerTier::Critical, Position::Center);
        assert_eq!(alert_message(&critical), "Stop! car directly ahead!");
        let high = det(ObjectClass::DOG, DangerTier::High, Position::Left);
        assert_eq!(alert_message(&high), "Caution! dog on your left.");
        let right = det(ObjectClass::BUS, DangerTier::High, Position::Right);
        assert_eq!(alert_message(&right), "Caution! bus on your right.");
    }
}
