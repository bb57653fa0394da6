//! Fixed-capacity frame pools.
//!
//! A pool is a ring of slots shared by one producer (the bridge, during `retro_run`) and one
//! consumer (the adapter, after `retro_run` returns). Both sides run on the same thread and
//! never overlap, so the pool needs no locking of its own.
//!
//! Capacity bounds how far emission may lag production. When the consumer falls a whole ring
//! behind, the producer overwrites the oldest full slot and counts a dropped frame; the ABI has
//! no way to push back on the core.

/// Slots per stream. At 60 fps one slot per frame is roughly half a second of output.
pub const POOL_CAPACITY: usize = 30;

/// Lifecycle of a slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlotState {
    /// Available for reuse.
    Free,
    /// Owned by the producer, being written.
    Filling,
    /// Complete, waiting for emission.
    Full,
}

/// Contents of a pool slot.
pub trait FrameSlot: Default {
    /// Forget previous contents, keeping allocations.
    fn clear(&mut self);
}

#[derive(Debug)]
struct Slot<T> {
    state: SlotState,
    frame: T,
}

/// Ring of [`POOL_CAPACITY`] (or a custom number of) slots.
#[derive(Debug)]
pub struct FramePool<T> {
    slots: Box<[Slot<T>]>,
    /// Slot being filled, or the next one to fill.
    write: usize,
    /// Oldest full slot.
    read: usize,
    full: usize,
    dropped: u64,
}

impl<T: FrameSlot> Default for FramePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FrameSlot> FramePool<T> {
    pub fn new() -> Self {
        Self::with_capacity(POOL_CAPACITY)
    }

    /// A pool with `capacity` slots (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity.max(1))
            .map(|_| Slot {
                state: SlotState::Free,
                frame: T::default(),
            })
            .collect();
        Self {
            slots,
            write: 0,
            read: 0,
            full: 0,
            dropped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn write_index(&self) -> usize {
        self.write
    }

    pub fn read_index(&self) -> usize {
        self.read
    }

    /// Number of slots waiting for emission.
    pub fn full_len(&self) -> usize {
        self.full
    }

    /// Frames overwritten before they were emitted.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// The slot currently being produced into, claiming it if needed.
    ///
    /// Claiming a slot that is still full means the consumer is a whole ring behind: the
    /// oldest frame is discarded.
    pub fn filling(&mut self) -> &mut T {
        let idx = self.write;
        match self.slots[idx].state {
            SlotState::Filling => {}
            SlotState::Full => {
                self.dropped += 1;
                self.full -= 1;
                self.read = self.next(self.read);
                log::trace!("frame pool overrun, overwrote slot {idx}");
                self.claim(idx);
            }
            SlotState::Free => self.claim(idx),
        }
        &mut self.slots[idx].frame
    }

    /// Whether a partially produced slot exists.
    pub fn is_filling(&self) -> bool {
        self.slots[self.write].state == SlotState::Filling
    }

    /// Mark the slot being produced as full and move on to the next one.
    ///
    /// No-op when nothing is being produced.
    pub fn commit(&mut self) {
        let idx = self.write;
        if self.slots[idx].state != SlotState::Filling {
            return;
        }
        self.slots[idx].state = SlotState::Full;
        self.full += 1;
        self.write = self.next(idx);
    }

    /// Take the oldest full slot, freeing it.
    ///
    /// The returned frame stays readable until the pool is mutated again.
    pub fn pop_full(&mut self) -> Option<&T> {
        if self.full == 0 {
            return None;
        }
        let idx = self.read;
        debug_assert_eq!(self.slots[idx].state, SlotState::Full);
        self.slots[idx].state = SlotState::Free;
        self.full -= 1;
        self.read = self.next(idx);
        Some(&self.slots[idx].frame)
    }

    /// Bounds-checked slot inspection.
    pub fn slot(&self, index: usize) -> Option<(SlotState, &T)> {
        self.slots.get(index).map(|s| (s.state, &s.frame))
    }

    /// Free every slot and reset the indices and counters.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.state = SlotState::Free;
            slot.frame.clear();
        }
        self.write = 0;
        self.read = 0;
        self.full = 0;
        self.dropped = 0;
    }

    fn claim(&mut self, idx: usize) {
        let slot = &mut self.slots[idx];
        slot.frame.clear();
        slot.state = SlotState::Filling;
    }

    fn next(&self, idx: usize) -> usize {
        (idx + 1) % self.slots.len()
    }
}
