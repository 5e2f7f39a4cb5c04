//! Lock-free SPSC sample ring between the sampling timer and the streaming task.
//!
//! This is the only state shared with interrupt/timer context.
//!
//! # Architecture
//!
//! ```text
//! Sampling timer ──push()──▶ SampleRing ──drain()──▶ Streaming task
//!  (timer context)          (lock-free)              (filter + send)
//! ```
//!
//! # Rules
//!
//! - Producer writes only `write_idx` and the slot it points at
//! - Consumer writes only `read_idx` (and the eviction counter)
//! - `push` never blocks, never allocates, never fails
//! - Overrun evicts the oldest unread samples; the consumer notices and skips
//!
//! Each slot packs the sample with the low 16 bits of the index that wrote it.
//! A reader that finds a foreign tag knows the producer lapped it mid-copy and
//! drops that sample instead of returning stale or reordered data.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::{ConfigError, DeviceError};
use crate::sample::Sample;

/// Default ring size: 4096 samples.
/// At 8kHz, this is ~500ms of audio.
pub const DEFAULT_RING_CAPACITY: usize = 4096;

/// Largest capacity for which 16-bit slot tags stay unambiguous.
pub const MAX_RING_CAPACITY: usize = 1 << 15;

#[inline]
const fn pack(idx: u32, sample: Sample) -> u32 {
    ((idx & 0xFFFF) << 16) | (sample as u16 as u32)
}

#[inline]
const fn unpack(slot: u32) -> (u16, Sample) {
    ((slot >> 16) as u16, slot as u16 as i16)
}

/// Lock-free single-producer single-consumer ring of samples.
///
/// # Memory Ordering
///
/// - Producer stores the slot, then publishes `write_idx` with `Release`
/// - Consumer loads `write_idx` with `Acquire` before reading slots
/// - Slot tags detect any slot overwritten while the consumer was copying
pub struct SampleRing {
    /// Packed `(tag << 16) | sample` slots.
    slots: Box<[AtomicU32]>,

    /// Capacity - 1 (capacity is a power of two).
    mask: u32,

    /// Next write index (monotonically increasing, wraps via mask).
    write_idx: AtomicU32,

    /// Next read index (monotonically increasing, wraps via mask).
    read_idx: AtomicU32,

    /// Samples lost to overrun, counted by the consumer.
    evicted: AtomicU32,

    /// Pending request to discard everything before `discard_floor`.
    discard_pending: AtomicBool,
    discard_floor: AtomicU32,

    /// Bumped by every `discard_pending`, so consumers can drop partial chunks.
    epoch: AtomicU32,
}

impl SampleRing {
    /// Allocate a ring with room for `capacity` unread samples.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if `capacity` is not a power of two in `2..=MAX_RING_CAPACITY`
    /// - `DeviceError::Allocation` if the slots cannot be allocated
    pub fn with_capacity(capacity: usize) -> Result<Self, DeviceError> {
        if !capacity.is_power_of_two() || capacity < 2 || capacity > MAX_RING_CAPACITY {
            return Err(ConfigError::RingCapacity(capacity).into());
        }

        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity).map_err(|_| DeviceError::Allocation {
            what: "sample ring",
            bytes: capacity * core::mem::size_of::<AtomicU32>(),
        })?;
        // Tag of an empty slot never matches index 0, so nothing is readable yet.
        slots.extend((0..capacity).map(|_| AtomicU32::new(pack(u32::MAX, 0))));

        Ok(Self {
            slots: slots.into_boxed_slice(),
            mask: (capacity - 1) as u32,
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            evicted: AtomicU32::new(0),
            discard_pending: AtomicBool::new(false),
            discard_floor: AtomicU32::new(0),
            epoch: AtomicU32::new(0),
        })
    }

    /// Push one sample (producer only).
    ///
    /// # Timing
    ///
    /// O(1), two atomic stores. Never blocks, never allocates.
    #[inline]
    pub fn push(&self, sample: Sample) {
        // Only the producer writes write_idx, so Relaxed sees our own last store.
        let w = self.write_idx.load(Ordering::Relaxed);
        self.slots[(w & self.mask) as usize].store(pack(w, sample), Ordering::Relaxed);
        self.write_idx.store(w.wrapping_add(1), Ordering::Release);
    }

    /// Copy up to `out.len()` samples in arrival order (consumer only).
    ///
    /// Returns the number of samples written to the front of `out`. A short
    /// count (including zero) means not enough data has arrived yet.
    ///
    /// If the producer overran the consumer, the oldest unread samples are
    /// skipped and counted in [`evicted`](Self::evicted).
    pub fn drain(&self, out: &mut [Sample]) -> usize {
        let capacity = self.capacity() as u32;
        let mut r = self.read_idx.load(Ordering::Relaxed);

        // Apply a discard before sampling the write head, so the floor is
        // never ahead of `w`.
        if self.discard_pending.swap(false, Ordering::AcqRel) {
            let floor = self.discard_floor.load(Ordering::Acquire);
            // Only move forward; a floor behind us is already consumed.
            if (floor.wrapping_sub(r) as i32) > 0 {
                r = floor;
            }
        }
        let w = self.write_idx.load(Ordering::Acquire);

        let mut available = w.wrapping_sub(r);
        if available > capacity {
            self.add_evicted(available - capacity);
            r = w.wrapping_sub(capacity);
            available = capacity;
        }

        let wanted = (available as usize).min(out.len());
        let mut copied = 0;
        for i in 0..wanted as u32 {
            let idx = r.wrapping_add(i);
            let (tag, sample) = unpack(self.slots[(idx & self.mask) as usize].load(Ordering::Acquire));
            if tag == (idx & 0xFFFF) as u16 {
                out[copied] = sample;
                copied += 1;
            } else {
                // Lapped while copying; everything before this was evicted too.
                self.add_evicted(copied as u32 + 1);
                copied = 0;
            }
        }

        self.read_idx.store(r.wrapping_add(wanted as u32), Ordering::Release);
        copied
    }

    /// Number of unread samples, capped at capacity.
    #[inline]
    pub fn available(&self) -> usize {
        let w = self.write_idx.load(Ordering::Acquire);
        let r = self.read_idx.load(Ordering::Acquire);
        (w.wrapping_sub(r) as usize).min(self.capacity())
    }

    /// Current write head (shared read).
    #[inline]
    pub fn write_head(&self) -> u32 {
        self.write_idx.load(Ordering::Acquire)
    }

    /// Ask the consumer to drop everything written so far.
    ///
    /// Called by the input task right before the sampling timer is restarted,
    /// so a resumed stream starts clean. The consumer applies it on its next
    /// `drain`; `read_idx` keeps a single writer.
    pub fn discard_pending(&self) {
        self.discard_floor.store(self.write_head(), Ordering::Release);
        self.discard_pending.store(true, Ordering::Release);
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of discard requests so far.
    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Total samples lost to overrun since start-up.
    #[inline]
    pub fn evicted(&self) -> u32 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Ring capacity in samples.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn add_evicted(&self, n: u32) {
        self.evicted.fetch_add(n, Ordering::Relaxed);
    }
}
