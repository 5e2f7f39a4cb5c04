//! Module: config
//!
//! Purpose: Start-up configuration for the live-caption device.
//!
//! Architecture:
//! - `DeviceConfig`: every tunable, built once and shared by `Arc`
//! - Defaults come from build-time env (`CAPTION_SSID`, `CAPTION_PASSWORD`,
//!   `CAPTION_SERVER`) and fall back to the bench network
//! - `nvs`: optional overrides read from flash on the device
//! - Immutable after `Device::new`; nothing writes it at runtime
//!
//! Safety: Safe. No unsafe blocks.

pub mod nvs;

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::ConfigError;
use crate::stream::{DEFAULT_RING_CAPACITY, MAX_RING_CAPACITY};

/// Build-time default SSID.
pub const DEFAULT_SSID: &str = match option_env!("CAPTION_SSID") {
    Some(ssid) => ssid,
    None => "NETGEAR41",
};

/// Build-time default password (`None` = open network).
pub const DEFAULT_PASSWORD: Option<&str> = option_env!("CAPTION_PASSWORD");

/// Build-time default companion server address.
pub const DEFAULT_SERVER: &str = match option_env!("CAPTION_SERVER") {
    Some(server) => server,
    None => "192.168.1.5",
};

/// Languages offered by the menu.
pub const DEFAULT_LANGUAGES: [&str; 7] =
    ["English", "Spanish", "Hindi", "Mandarin", "Arabic", "French", "Portugues"];

/// Font sizes offered by the menu.
pub const DEFAULT_FONT_SIZES: [u8; 5] = [8, 12, 16, 20, 24];

/// Button gesture timing.
///
/// Thresholds are configurable; nothing in the input path hard-codes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureConfig {
    /// Press held at least this long resolves as a long press.
    pub long_press_us: u64,
    /// Edges closer than this to the last accepted edge are ignored.
    pub debounce_us: u64,
}

impl GestureConfig {
    pub const fn new() -> Self {
        Self {
            long_press_us: 1_000_000,
            debounce_us: 50_000,
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Device configuration, immutable after start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Companion server IP address (text, validated by [`validate`](Self::validate)).
    pub server: String,
    /// Server port receiving sample datagrams.
    pub sample_port: u16,
    /// Local port the inbound text listener accepts on.
    pub inbound_port: u16,
    /// Server port receiving control commands.
    pub command_port: u16,
    /// Local port the sample socket is bound to (0 = ephemeral).
    pub local_sample_port: u16,

    pub ssid: String,
    pub password: Option<String>,

    /// Sampling rate in Hz; the timer period is `1 / sample_rate_hz`.
    pub sample_rate_hz: u32,
    /// Samples per outbound datagram.
    pub chunk_size: usize,
    /// Ring capacity in samples (power of two, larger than `chunk_size`).
    pub ring_capacity: usize,

    /// Consecutive association failures before the link gives up.
    pub max_retries: u32,
    /// Inbound connection idle limit.
    pub receive_timeout: Duration,
    /// Upper bound on a single socket write.
    pub send_timeout: Duration,
    /// Upper bound on the command connection handshake.
    pub connect_timeout: Duration,
    /// How often the streaming task logs pipeline counters.
    pub stats_interval: Duration,

    pub gesture: GestureConfig,

    pub languages: Vec<String>,
    pub font_sizes: Vec<u8>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            sample_port: 8080,
            inbound_port: 8081,
            command_port: 8088,
            local_sample_port: 8080,
            ssid: DEFAULT_SSID.to_string(),
            password: DEFAULT_PASSWORD.map(str::to_string),
            sample_rate_hz: 8000,
            chunk_size: 1024,
            ring_capacity: DEFAULT_RING_CAPACITY,
            max_retries: 5,
            receive_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(2),
            stats_interval: Duration::from_secs(10),
            gesture: GestureConfig::new(),
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            font_sizes: DEFAULT_FONT_SIZES.to_vec(),
        }
    }
}

impl DeviceConfig {
    /// Check every constraint the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_ip()?;
        if self.ssid.is_empty() {
            return Err(ConfigError::EmptySsid);
        }
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunk);
        }
        if !self.ring_capacity.is_power_of_two()
            || self.ring_capacity < 2
            || self.ring_capacity > MAX_RING_CAPACITY
        {
            return Err(ConfigError::RingCapacity(self.ring_capacity));
        }
        if self.ring_capacity <= self.chunk_size {
            return Err(ConfigError::RingTooSmall {
                capacity: self.ring_capacity,
                chunk: self.chunk_size,
            });
        }
        if self.languages.is_empty() || self.font_sizes.is_empty() {
            return Err(ConfigError::EmptyOptions);
        }
        Ok(())
    }

    /// Parsed server address.
    pub fn server_ip(&self) -> Result<IpAddr, ConfigError> {
        self.server
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.server.clone()))
    }

    /// Destination for sample datagrams.
    pub fn sample_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.server_ip()?, self.sample_port))
    }

    /// Destination for control commands.
    pub fn command_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.server_ip()?, self.command_port))
    }

    /// Sampling timer period (125 µs at 8 kHz).
    pub fn sample_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.sample_rate_hz.max(1)))
    }
}
