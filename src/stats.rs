//! Pipeline statistics.
//!
//! Timer and interrupt code must not log. They bump counters here instead,
//! and the streaming task reports a [`StatsSnapshot`] periodically.

use core::sync::atomic::{AtomicU32, Ordering};

/// Lock-free pipeline counters. All counters only ever grow.
pub struct PipelineStats {
    /// Samples lost to ring overrun.
    evicted: AtomicU32,

    /// Microphone reads that failed (sample replaced by 0).
    read_failures: AtomicU32,

    /// Sample datagrams handed to the socket.
    chunks_sent: AtomicU32,

    /// Sample datagrams or commands the socket refused.
    send_failures: AtomicU32,

    /// Control commands delivered.
    commands_sent: AtomicU32,

    /// Inbound lines posted to the mailbox.
    messages_received: AtomicU32,

    /// Gestures lost because the latch queue was full.
    gestures_dropped: AtomicU32,

    /// Wi-Fi association attempts since boot.
    association_attempts: AtomicU32,
}

impl PipelineStats {
    pub const fn new() -> Self {
        Self {
            evicted: AtomicU32::new(0),
            read_failures: AtomicU32::new(0),
            chunks_sent: AtomicU32::new(0),
            send_failures: AtomicU32::new(0),
            commands_sent: AtomicU32::new(0),
            messages_received: AtomicU32::new(0),
            gestures_dropped: AtomicU32::new(0),
            association_attempts: AtomicU32::new(0),
        }
    }

    /// Mirror the ring's eviction total (the ring owns the real counter).
    #[inline]
    pub fn set_evicted(&self, total: u32) {
        self.evicted.store(total, Ordering::Relaxed);
    }

    /// Safe from the sampling timer callback.
    #[inline]
    pub fn read_failed(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn chunk_sent(&self) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn send_failed(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_gestures_dropped(&self, total: u32) {
        self.gestures_dropped.store(total, Ordering::Relaxed);
    }

    #[inline]
    pub fn association_attempted(&self) {
        self.association_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            evicted: self.evicted.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            gestures_dropped: self.gestures_dropped.load(Ordering::Relaxed),
            association_attempts: self.association_attempts.load(Ordering::Relaxed),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pipeline counters at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub evicted: u32,
    pub read_failures: u32,
    pub chunks_sent: u32,
    pub send_failures: u32,
    pub commands_sent: u32,
    pub messages_received: u32,
    pub gestures_dropped: u32,
    pub association_attempts: u32,
}

impl core::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "chunks={} send_fail={} cmds={} msgs={} evicted={} read_fail={} gest_drop={} assoc={}",
            self.chunks_sent,
            self.send_failures,
            self.commands_sent,
            self.messages_received,
            self.evicted,
            self.read_failures,
            self.gestures_dropped,
            self.association_attempts,
        )
    }
}
