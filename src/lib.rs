//! # RustLiveCaption
//!
//! Firmware for a wearable live-caption badge.
//!
//! ## Architecture
//!
//! Audio flows one way, text flows the other:
//! - The sampling timer pushes microphone readings into [`SampleRing`]
//! - The streaming task drains fixed-size chunks, band-pass filters them and
//!   sends each chunk as one UDP datagram
//! - Caption text arrives over TCP, lands in the single-slot [`Mailbox`] and
//!   is drawn by the display task
//! - Two buttons drive a small menu; its choices go back to the server as
//!   control commands and pause sampling while the menu is open
//!
//! Everything platform-specific sits behind a trait ([`SamplingTimer`],
//! [`WifiDriver`], [`Display`]) so the pipeline runs on the host as well.

pub mod audio;
pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod fir;
pub mod input;
pub mod link;
pub mod sample;
pub mod stats;
pub mod stream;
pub mod timer;

#[cfg(target_os = "espidf")]
pub mod hal;

pub use config::DeviceConfig;
pub use device::{Device, Peripherals, RunningDevice};
pub use display::Display;
pub use error::{ConfigError, DeviceError, LinkError, TimerError};
pub use link::{LinkManager, LinkState, Mailbox, WifiDriver};
pub use sample::Sample;
pub use stats::PipelineStats;
pub use stream::SampleRing;
pub use timer::{SampleSource, SamplingTimer};
