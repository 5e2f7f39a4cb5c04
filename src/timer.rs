//! Sampling timer seam.
//!
//! The timer calls a [`SampleSource`] once per period and pushes the result
//! into the [`SampleRing`]. On the device this is an `esp_timer` periodic
//! callback (`hal::timer`); on the host, [`ThreadTimer`] emulates it.
//!
//! `start` and `stop` are idempotent: the input task calls them on every
//! menu transition without tracking what it did last time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::TimerError;
use crate::sample::Sample;
use crate::stream::SampleRing;

/// Produces one raw sample per tick (ADC read, test tone, ...).
pub trait SampleSource: Send {
    fn read(&mut self) -> Sample;
}

/// Periodic producer that feeds the ring.
pub trait SamplingTimer: Send {
    /// Start ticking. No-op if already running.
    fn start(&mut self) -> Result<(), TimerError>;

    /// Stop ticking. No-op if already stopped.
    fn stop(&mut self) -> Result<(), TimerError>;

    fn is_running(&self) -> bool;
}

/// Host timer: a thread that catches up on due ticks every millisecond.
pub struct ThreadTimer {
    ring: Arc<SampleRing>,
    source: Arc<Mutex<Box<dyn SampleSource>>>,
    period: Duration,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadTimer {
    pub fn new(ring: Arc<SampleRing>, source: Box<dyn SampleSource>, period: Duration) -> Self {
        Self {
            ring,
            source: Arc::new(Mutex::new(source)),
            period: period.max(Duration::from_micros(1)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl SamplingTimer for ThreadTimer {
    fn start(&mut self) -> Result<(), TimerError> {
        if self.worker.is_some() {
            return Ok(());
        }

        self.running.store(true, Ordering::Release);
        let ring = Arc::clone(&self.ring);
        let source = Arc::clone(&self.source);
        let running = Arc::clone(&self.running);
        let period = self.period;

        let worker = thread::Builder::new()
            .name("sampling".into())
            .spawn(move || {
                let started = Instant::now();
                let mut produced: u64 = 0;
                while running.load(Ordering::Acquire) {
                    let due = (started.elapsed().as_nanos() / period.as_nanos()) as u64;
                    if due > produced {
                        let mut source = source.lock().unwrap_or_else(|e| e.into_inner());
                        for _ in produced..due {
                            ring.push(source.read());
                        }
                        produced = due;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            })
            .map_err(|e| TimerError::Platform(e.to_string()))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TimerError> {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| TimerError::Platform("sampling thread panicked".into()))?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
