//! Frame sources.
//!
//! Real camera acquisition lives outside this crate. The daemon and tests use
//! `SyntheticSource`, which produces RGBA frames with a slowly shifting
//! pattern.

use anyhow::{anyhow, Result};

use crate::frame::{RgbaFrame, BYTES_PER_PIXEL};

pub trait FrameSource {
    fn next_frame(&mut self) -> Result<RgbaFrame>;

    fn is_healthy(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "synthetic frame size {}x{} must be non-zero",
                config.width,
                config.height
            ));
        }
        Ok(Self {
            config,
            frame_count: 0,
        })
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<RgbaFrame> {
        self.frame_count += 1;
        let pixel_count = (self.config.width as usize) * (self.config.height as usize);
        let mut data = vec![0u8; pixel_count * BYTES_PER_PIXEL];
        for (i, px) in data.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let shade = ((i as u64 + self.frame_count) % 256) as u8;
            px[0] = shade;
            px[1] = shade.wrapping_mul(3);
            px[2] = shade.wrapping_add(128);
            px[3] = 255;
        }
        Ok(RgbaFrame::new(data, self.config.width, self.config.height))
    }
}
