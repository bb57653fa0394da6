//! Audio/Video side of retrohost-core.
//!
//! This module implements the "core pushes, host pools, controller drains" model.
//!
//! - Video: the core calls the video refresh callback with a pointer into its own memory. The
//!   bridge copies `height * pitch` bytes into the current [`VideoFrameBuffer`] slot.
//!
//! - Audio: the core calls the sample / batch callbacks with interleaved stereo `i16`. The bridge
//!   appends into the current [`AudioFrameBuffer`] slot until it holds one video frame's worth.
//!
//! After `retro_run` returns, the adapter pops every full slot and emits it.
//!
//! Notes / limitations (current):
//! - We always copy out of core memory (no zero-copy framebuffers).
//! - Pixel format is tracked but not converted.

mod audio;
mod pool;
mod video;

pub use audio::{AudioFrameBuffer, AudioStream};
pub use pool::{FramePool, FrameSlot, POOL_CAPACITY, SlotState};
pub use video::{VideoFrameBuffer, VideoStream};

use crate::abi::{PixelFormat, SystemAvInfo};

/// Frame and sample rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    pub fps: f64,
    pub sample_rate: f64,
}

/// Output dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    /// Display aspect ratio; `<= 0` means "use base_width / base_height".
    pub aspect_ratio: f32,
}

impl Geometry {
    /// Aspect ratio with the ABI's fallback applied.
    pub fn effective_aspect_ratio(&self) -> f32 {
        if self.aspect_ratio > 0.0 {
            self.aspect_ratio
        } else if self.base_height != 0 {
            self.base_width as f32 / self.base_height as f32
        } else {
            1.0
        }
    }
}

/// Everything negotiated on entry into `Ready`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AvInfo {
    pub timing: Timing,
    pub geometry: Geometry,
    pub pixel_format: PixelFormat,
}

impl AvInfo {
    pub fn from_raw(raw: &SystemAvInfo, pixel_format: PixelFormat) -> Self {
        Self {
            timing: Timing {
                fps: raw.timing.fps,
                sample_rate: raw.timing.sample_rate,
            },
            geometry: Geometry {
                base_width: raw.geometry.base_width,
                base_height: raw.geometry.base_height,
                max_width: raw.geometry.max_width,
                max_height: raw.geometry.max_height,
                aspect_ratio: raw.geometry.aspect_ratio,
            },
            pixel_format,
        }
    }
}
