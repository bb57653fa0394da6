use super::pool::{FramePool, FrameSlot};

/// Fallback timing used before the core reports its own (NTSC-ish 60 fps at 44.1 kHz).
const DEFAULT_FRAMES_PER_SLOT: usize = 735;

/// Upper bound on stereo frames per slot: one second at 384 kHz.
const MAX_FRAMES_PER_SLOT: usize = 384_000;

/// One video frame's worth of interleaved stereo `i16` samples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioFrameBuffer {
    pub samples: Vec<i16>,
}

impl AudioFrameBuffer {
    /// Number of stereo frames held.
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Size in bytes of the held samples.
    pub fn byte_len(&self) -> usize {
        self.samples.len().saturating_mul(std::mem::size_of::<i16>())
    }
}

impl FrameSlot for AudioFrameBuffer {
    fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Audio side of the bridge: chops the core's sample stream into per-frame slots.
///
/// Cores hand over audio in arbitrary batch sizes; a slot is full once it holds the number of
/// samples one video frame lasts (`sample_rate / fps`, rounded up).
#[derive(Debug)]
pub struct AudioStream {
    pool: FramePool<AudioFrameBuffer>,
    /// Interleaved samples per slot.
    quota: usize,
}

impl Default for AudioStream {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioStream {
    pub fn new() -> Self {
        Self {
            pool: FramePool::new(),
            quota: DEFAULT_FRAMES_PER_SLOT * 2,
        }
    }

    /// Size slots from the core's timing. Ignores nonsensical values.
    pub fn set_timing(&mut self, sample_rate: f64, fps: f64) {
        let ratio = (sample_rate / fps).ceil();
        if !(sample_rate > 0.0 && fps > 0.0 && ratio.is_finite())
            || ratio > MAX_FRAMES_PER_SLOT as f64
        {
            log::warn!("ignoring audio timing {sample_rate} Hz @ {fps} fps");
            return;
        }
        let frames = (ratio as usize).max(1);
        match frames.checked_mul(2) {
            Some(quota) => self.quota = quota,
            None => log::warn!("ignoring audio timing {sample_rate} Hz @ {fps} fps"),
        }
    }

    /// Interleaved samples per full slot.
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Append interleaved stereo samples. Returns the number of stereo frames consumed, which is
    /// always all of them.
    pub fn push_interleaved(&mut self, mut samples: &[i16]) -> usize {
        let frames = samples.len() / 2;
        while !samples.is_empty() {
            let slot = self.pool.filling();
            let room = self.quota.saturating_sub(slot.samples.len());
            let take = room.min(samples.len());
            slot.samples.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if slot.samples.len() >= self.quota {
                self.pool.commit();
            }
        }
        frames
    }

    pub fn push_sample(&mut self, left: i16, right: i16) {
        self.push_interleaved(&[left, right]);
    }

    pub fn pool(&self) -> &FramePool<AudioFrameBuffer> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut FramePool<AudioFrameBuffer> {
        &mut self.pool
    }
}
