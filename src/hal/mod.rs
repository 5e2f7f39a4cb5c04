//! Hardware Abstraction Layer for the caption badge.
//!
//! Thin wrappers around ESP-IDF peripherals.
//! Business logic stays in core modules, HAL is just I/O.

pub mod adc;
pub mod buttons;
pub mod timer;
pub mod wifi;

pub use adc::MicAdc;
pub use buttons::{ButtonInputs, SCROLL_PIN, SELECT_PIN};
pub use timer::EspSamplingTimer;
pub use wifi::EspStation;
