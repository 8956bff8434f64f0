//! Spoken summary of a frame's detections.

use crate::classes::DangerTier;
use crate::detect::Detection;

pub const NO_OBSTACLES: &str = "No obstacles detected.";

/// One sentence-group per tier: critical first, then high, and only when
/// neither is present a plain listing of everything else.
pub fn describe(detections: &[Detection]) -> String {
    if detections.is_empty() {
        return NO_OBSTACLES.to_string();
    }

    let critical: Vec<&Detection> = detections
        .iter()
        .filter(|d| d.tier() == DangerTier::Critical)
        .collect();
    let high: Vec<&Detection> = detections
        .iter()
        .filter(|d| d.tier() == DangerTier::High)
        .collect();

    let mut parts = Vec::new();
    if !critical.is_empty() {
        parts.push(format!("Warning! {} directly ahead!", list_objects(&critical)));
    }
    if !high.is_empty() {
        parts.push(format!("Caution: {} nearby.", list_objects(&high)));
    }
    if parts.is_empty() {
        let others: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.tier() < DangerTier::High)
            .collect();
        parts.push(format!("Detected: {}.", list_objects(&others)));
    }
    parts.join(" ")
}

/// "a dog", "2 cars and a dog", "a dog, a car, and a bicycle".
pub fn list_objects(detections: &[&Detection]) -> String {
    let mut groups: Vec<(&'static str, usize)> = Vec::new();
    for detection in detections {
        let label = detection.label();
        match groups.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => groups.push((label, 1)),
        }
    }

    let items: Vec<String> = groups
        .into_iter()
        .map(|(label, count)| {
            if count > 1 {
                format!("{} {}s", count, label)
            } else {
                format!("a {}", label)
            }
        })
        .collect();

    match items.as_slice() {
        [] => "nothing".to_string(),
        [only] => only.clone(),
        [first, second] => format!("{} and {}", first, second),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ObjectClass;
    use crate::detect::Position;
    use crate::geometry::BoundingBox;

    fn det(label: &str, tier: DangerTier) -> Detection {
        let class = ObjectClass::from_label(label).unwrap();
        let mut d = Detection::new(
            class,
            0.9,
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            Position::Left,
        );
        d.danger_tier = Some(tier);
        d
    }

    #[test]
    fn empty_frame() {
        assert_eq!(describe(&[]), "No obstacles detected.");
    }

    #[test]
    fn pluralizes_and_joins_two_groups() {
        let dets = vec![
            det("car", DangerTier::Medium),
            det("car", DangerTier::Medium),
            det("dog", DangerTier::Medium),
        ];
        assert_eq!(describe(&dets), "Detected: 2 cars and a dog.");
    }

    #[test]
    fn oxford_comma_for_three_groups() {
        let dets = vec![
            det("dog", DangerTier::Low),
            det("car", DangerTier::Low),
            det("bicycle", DangerTier::Low),
        ];
        assert_eq!(describe(&dets), "Detected: a dog, a car, and a bicycle.");
    }

    #[test]
    fn critical_and_high_groups_hide_the_rest() {
        let dets = vec![
            det("person", DangerTier::Medium),
            det("truck", DangerTier::Critical),
            det("car", DangerTier::High),
            det("bus", DangerTier::High),
        ];
        assert_eq!(
            describe(&dets),
            "Warning! a truck directly ahead! Caution: a car and a bus nearby."
        );
    }

    #[test]
    fn high_only() {
        let dets = vec![det("car", DangerTier::High), det("car", DangerTier::High)];
        assert_eq!(describe(&dets), "Caution: 2 cars nearby.");
    }
}
