use super::pool::{FramePool, FrameSlot};
use crate::abi::PixelFormat;

/// A copied video frame, in the core's negotiated pixel format.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoFrameBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row of `data`.
    pub pitch: usize,
    pub pixel_format: PixelFormat,
}

impl VideoFrameBuffer {
    /// Size of a `height` x `pitch` frame in bytes, saturating.
    pub fn byte_len_for(height: u32, pitch: usize) -> usize {
        (height as usize).saturating_mul(pitch)
    }
}

impl FrameSlot for VideoFrameBuffer {
    fn clear(&mut self) {
        self.data.clear();
        self.width = 0;
        self.height = 0;
        self.pitch = 0;
    }
}

/// Video side of the bridge: one slot per refresh.
#[derive(Debug, Default)]
pub struct VideoStream {
    pool: FramePool<VideoFrameBuffer>,
    pixel_format: PixelFormat,
}

impl VideoStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn set_pixel_format(&mut self, format: PixelFormat) {
        self.pixel_format = format;
    }

    /// Copy a frame into the next slot and complete it.
    ///
    /// `data` must hold at least `height * pitch` bytes; shorter input is rejected.
    pub fn push_frame(&mut self, data: &[u8], width: u32, height: u32, pitch: usize) -> bool {
        let len = VideoFrameBuffer::byte_len_for(height, pitch);
        if data.len() < len {
            log::warn!(
                "video frame {width}x{height} (pitch {pitch}) needs {len} bytes, got {}",
                data.len()
            );
            return false;
        }

        let pixel_format = self.pixel_format;
        let slot = self.pool.filling();
        slot.data.extend_from_slice(&data[..len]);
        slot.width = width;
        slot.height = height;
        slot.pitch = pitch;
        slot.pixel_format = pixel_format;
        self.pool.commit();
        true
    }

    pub fn pool(&self) -> &FramePool<VideoFrameBuffer> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut FramePool<VideoFrameBuffer> {
        &mut self.pool
    }
}
