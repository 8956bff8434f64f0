//! Closed class vocabulary.
//!
//! The detector is trained on the 80 COCO classes. Each class carries the
//! safety policy the rest of the kernel needs:
//! - `label`: the spoken/display name
//! - `base_tier`: danger tier before spatial escalation
//! - `high_priority`: always reported, regardless of size
//!
//! The table is built once at compile time; lookups are by index.

use serde::Serialize;
use std::fmt;

/// Ordered severity of a detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DangerTier {
    Low,
    Medium,
    High,
    Critical,
}

impl DangerTier {
    /// One step up, saturating at `Critical`.
    pub fn escalate(self) -> Self {
        match self {
            DangerTier::Low => DangerTier::Medium,
            DangerTier::Medium => DangerTier::High,
            DangerTier::High | DangerTier::Critical => DangerTier::Critical,
        }
    }
}

struct ClassInfo {
    label: &'static str,
    base_tier: DangerTier,
    high_priority: bool,
}

const fn low(label: &'static str) -> ClassInfo {
    ClassInfo {
        label,
        base_tier: DangerTier::Low,
        high_priority: false,
    }
}

const fn class(label: &'static str, base_tier: DangerTier, high_priority: bool) -> ClassInfo {
    ClassInfo {
        label,
        base_tier,
        high_priority,
    }
}

pub const CLASS_COUNT: usize = 80;

static CLASSES: [ClassInfo; CLASS_COUNT] = [
    class("person", DangerTier::Medium, true),
    class("bicycle", DangerTier::Medium, true),
    class("car", DangerTier::High, true),
    class("motorcycle", DangerTier::Medium, true),
    low("airplane"),
    class("bus", DangerTier::High, true),
    low("train"),
    class("truck", DangerTier::High, true),
    low("boat"),
    low("traffic light"),
    low("fire hydrant"),
    low("stop sign"),
    low("parking meter"),
    low("bench"),
    low("bird"),
    low("cat"),
    class("dog", DangerTier::Medium, false),
    low("horse"),
    low("sheep"),
    low("cow"),
    low("elephant"),
    low("bear"),
    low("zebra"),
    low("giraffe"),
    low("backpack"),
    low("umbrella"),
    low("handbag"),
    low("tie"),
    low("suitcase"),
    low("frisbee"),
    low("skis"),
    low("snowboard"),
    low("sports ball"),
    low("kite"),
    low("baseball bat"),
    low("baseball glove"),
    low("skateboard"),
    low("surfboard"),
    low("tennis racket"),
    low("bottle"),
    low("wine glass"),
    low("cup"),
    low("fork"),
    low("knife"),
    low("spoon"),
    low("bowl"),
    low("banana"),
    low("apple"),
    low("sandwich"),
    low("orange"),
    low("broccoli"),
    low("carrot"),
    low("hot dog"),
    low("pizza"),
    low("donut"),
    low("cake"),
    low("chair"),
    low("couch"),
    low("potted plant"),
    low("bed"),
    low("dining table"),
    low("toilet"),
    low("tv"),
    low("laptop"),
    low("mouse"),
    low("remote"),
    low("keyboard"),
    low("cell phone"),
    low("microwave"),
    low("oven"),
    low("toaster"),
    low("sink"),
    low("refrigerator"),
    low("book"),
    low("clock"),
    low("vase"),
    low("scissors"),
    low("teddy bear"),
    low("hair drier"),
    low("toothbrush"),
];

/// A class from the fixed vocabulary. Always a valid table index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectClass(u8);

impl ObjectClass {
    pub const PERSON: ObjectClass = ObjectClass(0);
    pub const BICYCLE: ObjectClass = ObjectClass(1);
    pub const CAR: ObjectClass = ObjectClass(2);
    pub const MOTORCYCLE: ObjectClass = ObjectClass(3);
    pub const BUS: ObjectClass = ObjectClass(5);
    pub const TRUCK: ObjectClass = ObjectClass(7);
    pub const DOG: ObjectClass = ObjectClass(16);

    pub fn from_index(index: usize) -> Option<Self> {
        if index < CLASS_COUNT {
            Some(ObjectClass(index as u8))
        } else {
            None
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        CLASSES
            .iter()
            .position(|info| info.label.eq_ignore_ascii_case(label))
            .map(|index| ObjectClass(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn label(self) -> &'static str {
        self.info().label
    }

    pub fn base_tier(self) -> DangerTier {
        self.info().base_tier
    }

    /// Safety-relevant classes that are reported at any size.
    pub fn is_high_priority(self) -> bool {
        self.info().high_priority
    }

    fn info(self) -> &'static ClassInfo {
        &CLASSES[self.index()]
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
