//! Non-maximum suppression.
//!
//! Greedy, per class: a detection only suppresses detections of the same
//! class. A person standing in front of a car keeps both boxes.

use std::cmp::Ordering;

use crate::detect::Detection;
use crate::geometry::iou;

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

/// Remove same-class duplicates, keeping the most confident of each cluster.
///
/// Output is in descending confidence order. Equal confidences keep their
/// input order, so the result is deterministic for a given input.
pub fn suppress(detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    let mut ranked: Vec<(usize, Detection)> = detections.into_iter().enumerate().collect();
    ranked.sort_by(|(ia, a), (ib, b)| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then(ia.cmp(ib))
    });

    let mut keep: Vec<Detection> = Vec::with_capacity(ranked.len());
    for (_, candidate) in ranked {
        let duplicate = keep.iter().any(|kept| {
            kept.class == candidate.class && iou(&kept.bbox, &candidate.bbox) >= iou_threshold
        });
        if !duplicate {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ObjectClass;
    use crate::detect::Position;
    use crate::geometry::BoundingBox;

    fn det(class: ObjectClass, confidence: f32, x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection::new(
            class,
            confidence,
            BoundingBox::new(x, y, w, h),
            Position::Center,
        )
    }

    #[test]
    fn keeps_most_confident_of_overlapping_pair() {
        // 100x100 boxes offset by 10px horizontally: iou = 9000 / 11000 ~ 0.82.
        let dets = vec![
            det(ObjectClass::PERSON, 0.6, 10.0, 0.0, 100.0, 100.0),
            det(ObjectClass::PERSON, 0.9, 0.0, 0.0, 100.0, 100.0),
        ];
        let kept = suppress(dets, DEFAULT_IOU_THRESHOLD);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn different_classes_never_suppress_each_other() {
        let dets = vec![
            det(ObjectClass::PERSON, 0.9, 0.0, 0.0, 50.0, 50.0),
            det(ObjectClass::CAR, 0.8, 0.0, 0.0, 50.0, 50.0),
        ];
        let kept = suppress(dets, DEFAULT_IOU_THRESHOLD);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn disjoint_same_class_boxes_survive() {
        let dets = vec![
            det(ObjectClass::CAR, 0.7, 0.0, 0.0, 50.0, 50.0),
            det(ObjectClass::CAR, 0.9, 300.0, 0.0, 50.0, 50.0),
        ];
        let kept = suppress(dets, DEFAULT_IOU_THRESHOLD);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn threshold_is_inclusive() {
        // iou exactly 0.5: 100x100 vs 100x50 sharing the top half.
        let dets = vec![
            det(ObjectClass::DOG, 0.9, 0.0, 0.0, 100.0, 100.0),
            det(ObjectClass::DOG, 0.8, 0.0, 0.0, 100.0, 50.0),
        ];
        assert_eq!(suppress(dets, 0.5).len(), 1);
    }

    #[test]
    fn ties_break_by_input_order() {
        let dets = vec![
            det(ObjectClass::BUS, 0.8, 0.0, 0.0, 100.0, 100.0),
            det(ObjectClass::BUS, 0.8, 5.0, 0.0, 100.0, 100.0),
        ];
        let kept = suppress(dets, DEFAULT_IOU_THRESHOLD);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].bbox.x, 0.0);
    }

    #[test]
    fn suppression_is_idempotent() {
        let dets = vec![
            det(ObjectClass::PERSON, 0.9, 0.0, 0.0, 100.0, 100.0),
            det(ObjectClass::PERSON, 0.85, 20.0, 0.0, 100.0, 100.0),
            det(ObjectClass::PERSON, 0.7, 60.0, 0.0, 100.0, 100.0),
            det(ObjectClass::CAR, 0.6, 0.0, 0.0, 100.0, 100.0),
            det(ObjectClass::CAR, 0.95, 400.0, 400.0, 80.0, 80.0),
        ];
        let once = suppress(dets, DEFAULT_IOU_THRESHOLD);
        let twice = suppress(once.clone(), DEFAULT_IOU_THRESHOLD);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(suppress(Vec::new(), DEFAULT_IOU_THRESHOLD).is_empty());
    }
}
