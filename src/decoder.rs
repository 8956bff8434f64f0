//! Detector output decoding.
//!
//! Converts the raw `[1, 4 + C, N]` output of a YOLO-style detector into
//! candidate [`Detection`]s in original-frame pixel space. Candidates are not
//! yet suppressed or classified.

use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};
use thiserror::Error;

use crate::classes::{ObjectClass, CLASS_COUNT};
use crate::detect::{Detection, Position};
use crate::geometry::BoundingBox;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_INPUT_SIZE: u32 = 640;
/// Objects covering more than this fraction of the frame are always kept.
pub const DEFAULT_RELEVANCE_AREA_FRACTION: f32 = 0.1;

const BOX_ROWS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("output tensor has {0} dimensions, expected 2 or 3")]
    Rank(usize),
    #[error("output batch size is {0}, expected 1")]
    Batch(usize),
    #[error("output has {rows} rows, expected {expected} (4 box rows + {classes} classes)")]
    ClassCount {
        rows: usize,
        expected: usize,
        classes: usize,
    },
}

#[derive(Clone, Debug)]
pub struct OutputDecoder {
    confidence_threshold: f32,
    input_size: u32,
    relevance_area_fraction: f32,
}

impl OutputDecoder {
    pub fn new(confidence_threshold: f32, input_size: u32) -> Self {
        Self {
            confidence_threshold,
            input_size,
            relevance_area_fraction: DEFAULT_RELEVANCE_AREA_FRACTION,
        }
    }

    pub fn with_relevance_area_fraction(mut self, fraction: f32) -> Self {
        self.relevance_area_fraction = fraction;
        self
    }

    /// Decode, treating a malformed tensor as "no detections".
    pub fn decode(&self, output: ArrayViewD<'_, f32>, width: u32, height: u32) -> Vec<Detection> {
        match self.try_decode(output, width, height) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("decoder: discarding frame output: {}", err);
                Vec::new()
            }
        }
    }

    pub fn try_decode(
        &self,
        output: ArrayViewD<'_, f32>,
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, DecodeError> {
        let rows = anchor_rows(output)?;
        if width == 0 || height == 0 || self.input_size == 0 {
            return Ok(Vec::new());
        }

        let frame_w = width as f32;
        let frame_h = height as f32;
        let scale_x = frame_w / self.input_size as f32;
        let scale_y = frame_h / self.input_size as f32;
        let min_relevant_area = frame_w * frame_h * self.relevance_area_fraction;

        let mut detections = Vec::new();
        for anchor in rows.axis_iter(Axis(1)) {
            let (best_index, best_score) = anchor
                .iter()
                .skip(BOX_ROWS)
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (index, &score)| {
                    if score > best.1 {
                        (index, score)
                    } else {
                        best
                    }
                });
            if best_score < self.confidence_threshold {
                continue;
            }
            let Some(class) = ObjectClass::from_index(best_index) else {
                continue;
            };

            let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
            if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
                continue;
            }
            let bbox = BoundingBox::new(
                (cx - w / 2.0) * scale_x,
                (cy - h / 2.0) * scale_y,
                w * scale_x,
                h * scale_y,
            );
            let position = Position::from_normalized_x(bbox.center_x() / frame_w);

            if class.is_high_priority() || bbox.area() > min_relevant_area {
                detections.push(Detection::new(
                    class,
                    best_score.min(1.0),
                    bbox,
                    position,
                ));
            }
        }

        Ok(detections)
    }
}

impl Default for OutputDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_SIZE)
    }
}

/// Validate the output shape and view it as `[4 + C, N]`.
fn anchor_rows(output: ArrayViewD<'_, f32>) -> Result<ArrayView2<'_, f32>, DecodeError> {
    let ndim = output.ndim();
    let rows = match ndim {
        2 => output.into_dimensionality::<Ix2>(),
        3 => {
            let batch = output.shape()[0];
            if batch != 1 {
                return Err(DecodeError::Batch(batch));
            }
            output.index_axis_move(Axis(0), 0).into_dimensionality::<Ix2>()
        }
        n => return Err(DecodeError::Rank(n)),
    }
    .map_err(|_| DecodeError::Rank(ndim))?;

    let expected = BOX_ROWS + CLASS_COUNT;
    if rows.nrows() != expected {
        return Err(DecodeError::ClassCount {
            rows: rows.nrows(),
            expected,
            classes: CLASS_COUNT,
        });
    }
    Ok(rows)
}
