//! Periodic sampling on the ESP high-resolution timer.
//!
//! The `esp_timer` callback reads the ADC once and pushes the value into the
//! ring. It runs in the timer task, so it must stay short: no logging, no
//! allocation, no blocking.

use std::sync::Arc;
use std::time::Duration;

use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};

use crate::error::TimerError;
use crate::stream::SampleRing;
use crate::timer::{SampleSource, SamplingTimer};

/// `esp_timer` backed [`SamplingTimer`].
pub struct EspSamplingTimer {
    timer: EspTimer<'static>,
    period: Duration,
}

impl EspSamplingTimer {
    pub fn new(
        ring: Arc<SampleRing>,
        mut source: Box<dyn SampleSource>,
        period: Duration,
    ) -> Result<Self, TimerError> {
        let service = EspTaskTimerService::new().map_err(platform)?;
        let timer = service
            .timer(move || ring.push(source.read()))
            .map_err(platform)?;
        Ok(Self { timer, period })
    }
}

impl SamplingTimer for EspSamplingTimer {
    fn start(&mut self) -> Result<(), TimerError> {
        if self.is_running() {
            return Ok(());
        }
        self.timer.every(self.period).map_err(platform)
    }

    fn stop(&mut self) -> Result<(), TimerError> {
        self.timer.cancel().map(|_| ()).map_err(platform)
    }

    fn is_running(&self) -> bool {
        self.timer.is_scheduled().unwrap_or(false)
    }
}

fn platform(e: esp_idf_svc::sys::EspError) -> TimerError {
    TimerError::Platform(e.to_string())
}
