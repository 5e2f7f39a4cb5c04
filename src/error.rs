//! Error types.
//!
//! Only [`DeviceError`] aborts anything (start-up). Every other error is
//! logged by the task that hit it and the task keeps running.

use std::io;

use thiserror::Error;

/// Configuration and settings validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("unsupported font size: {0}")]
    UnsupportedFontSize(u8),

    #[error("option list is empty")]
    EmptyOptions,

    #[error("ring capacity {0} must be a power of two in 2..=32768")]
    RingCapacity(usize),

    #[error("ring capacity {capacity} must exceed chunk size {chunk}")]
    RingTooSmall { capacity: usize, chunk: usize },

    #[error("chunk size must be non-zero")]
    ZeroChunk,

    #[error("sample rate must be non-zero")]
    ZeroSampleRate,

    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    #[error("SSID is empty")]
    EmptySsid,
}

/// Network link errors (task context, never fatal).
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link not connected")]
    NotConnected,

    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("wifi driver: {0}")]
    Driver(String),
}

/// Sampling timer errors.
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timer platform error: {0}")]
    Platform(String),
}

/// Fatal start-up errors. The device does not start its tasks.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot allocate {what} ({bytes} bytes)")]
    Allocation { what: &'static str, bytes: usize },

    #[error("sampling timer: {0}")]
    Timer(#[from] TimerError),

    #[error("link: {0}")]
    Link(#[from] LinkError),

    #[error("cannot spawn {0} task: {1}")]
    Spawn(&'static str, io::Error),

    #[error("platform init: {0}")]
    Platform(String),
}
