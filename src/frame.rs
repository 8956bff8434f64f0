//! Camera frames and model input preparation.
//!
//! - `RgbaFrame`: one frame as delivered by the camera (4 bytes per pixel,
//!   RGB plus an unused alpha/padding byte).
//! - `preprocess`: resample a frame into the model's `[1, 3, S, S]` input.
//!
//! The frame source is an external collaborator and may deliver buffers that
//! are shorter than `width * height * 4`. Preprocessing is bounds-checked per
//! pixel: a source pixel outside the buffer contributes nothing (stays 0)
//! instead of faulting.

use ndarray::Array4;
use std::time::Instant;

pub const BYTES_PER_PIXEL: usize = 4;

/// One RGBA camera frame.
#[derive(Clone, Debug)]
pub struct RgbaFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    captured_at: Instant,
}

impl RgbaFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    /// Bytes a complete frame of this size would hold.
    pub fn expected_len(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(BYTES_PER_PIXEL)
    }

    /// True when the buffer is shorter than the stated dimensions.
    pub fn is_truncated(&self) -> bool {
        self.data.len() < self.expected_len()
    }

    pub fn age(&self) -> std::time::Duration {
        self.captured_at.elapsed()
    }
}

/// Nearest-neighbour resample of RGBA bytes into a normalized
/// `[1, 3, size, size]` RGB tensor.
pub fn preprocess(pixels: &[u8], width: u32, height: u32, size: u32) -> Array4<f32> {
    let size = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    if width == 0 || height == 0 || size == 0 {
        return tensor;
    }

    let src_w = width as usize;
    let scale_x = width as f32 / size as f32;
    let scale_y = height as f32 / size as f32;

    for y in 0..size {
        let src_y = (y as f32 * scale_y) as usize;
        for x in 0..size {
            let src_x = (x as f32 * scale_x) as usize;
            let Some(idx) = src_y
                .checked_mul(src_w)
                .and_then(|row| row.checked_add(src_x))
                .and_then(|p| p.checked_mul(BYTES_PER_PIXEL))
            else {
                continue;
            };
            if idx + 2 >= pixels.len() {
                continue;
            }
            for channel in 0..3 {
                tensor[[0, channel, y, x]] = pixels[idx + channel] as f32 / 255.0;
            }
        }
    }

    tensor
}
