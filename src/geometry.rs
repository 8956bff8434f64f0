//! Axis-aligned box math.
//!
//! Boxes live in the original frame's pixel space (not normalized). All
//! functions here are pure and never produce NaN or infinity for finite input.

use serde::Serialize;

/// Corner-format bounding box in frame pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Build a box, clamping negative extents to zero.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn center(&self) -> (f32, f32) {
        (self.center_x(), self.center_y())
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        iou(self, other)
    }
}

pub fn area(b: &BoundingBox) -> f32 {
    b.area()
}

pub fn center_x(b: &BoundingBox) -> f32 {
    b.center_x()
}

/// Intersection over union.
///
/// Returns `0.0` for disjoint boxes and whenever the union is not positive.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = a.right().min(b.right());
    let bottom = a.bottom().min(b.bottom());

    let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 && intersection > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
