//! Microphone input on ADC1.
//!
//! One-shot reads at 11 dB attenuation, 12-bit raw values (0..=4095).

use std::sync::Arc;

use esp_idf_svc::hal::adc::attenuation::DB_11;
use esp_idf_svc::hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_svc::hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_svc::hal::adc::ADC1;
use esp_idf_svc::hal::gpio::Gpio34;
use esp_idf_svc::sys::EspError;

use crate::sample::Sample;
use crate::stats::PipelineStats;
use crate::timer::SampleSource;

/// Microphone ADC channel (GPIO34, ADC1 channel 6).
pub struct MicAdc {
    channel: AdcChannelDriver<'static, Gpio34, AdcDriver<'static, ADC1>>,
    stats: Arc<PipelineStats>,
}

impl MicAdc {
    pub fn new(adc: ADC1, pin: Gpio34, stats: Arc<PipelineStats>) -> Result<Self, EspError> {
        let driver = AdcDriver::new(adc)?;
        let config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        Ok(Self {
            channel: AdcChannelDriver::new(driver, pin, &config)?,
            stats,
        })
    }
}

impl SampleSource for MicAdc {
    /// Runs in the timer callback: a failed read yields 0 and is counted,
    /// never logged.
    fn read(&mut self) -> Sample {
        match self.channel.read_raw() {
            Ok(raw) => raw.min(4095) as Sample,
            Err(_) => {
                self.stats.read_failed();
                0
            }
        }
    }
}
