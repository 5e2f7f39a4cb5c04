//! Module: link
//!
//! Purpose: Wi-Fi link lifecycle and the three network channels.
//!
//! Architecture:
//! - The Wi-Fi driver posts [`LinkEvent`] values into an mpsc channel
//! - One link task owns the receiver and calls [`LinkManager::handle_event`]
//! - The state machine itself is pure ([`state`]); this module performs its
//!   actions: association attempts, opening/closing the sample socket,
//!   starting the inbound listener, waking connectivity waiters
//! - Send paths check an atomic "link up" flag; no lock is held during I/O
//!
//! Safety: Safe. No unsafe blocks.

pub mod inbound;
pub mod loopback;
pub mod mailbox;
pub mod outbound;
pub mod state;

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::config::DeviceConfig;
use crate::error::{ConfigError, LinkError};
use crate::stats::PipelineStats;

pub use inbound::{InboundListener, LineAssembler};
pub use loopback::LoopbackWifi;
pub use mailbox::{Mailbox, MAX_MESSAGE_LEN};
pub use outbound::{CommandChannel, SampleChannel};
pub use state::{LinkAction, LinkEvent, LinkState, LinkStateMachine};

/// How often the link task checks its stop flag while idle.
const EVENT_POLL: Duration = Duration::from_millis(100);

/// Network details reported once the link is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ssid: String,
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub rssi_dbm: Option<i8>,
}

impl fmt::Display for NetworkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ssid={} ip={} gw={} mask={}",
            self.ssid, self.ip, self.gateway, self.netmask
        )?;
        if let Some(rssi) = self.rssi_dbm {
            write!(f, " rssi={}dBm", rssi)?;
        }
        Ok(())
    }
}

/// Radio driver seam. The ESP-IDF station and the host loopback implement it.
pub trait WifiDriver: Send {
    /// Bring the radio up and route its events into `events`.
    fn start(&mut self, events: Sender<LinkEvent>) -> Result<(), LinkError>;

    /// Issue one association attempt. The outcome arrives later as
    /// `Associated`, `AssociationFailed` or `LinkLost`.
    fn associate(&mut self) -> Result<(), LinkError>;

    /// Details of the current association, if any.
    fn network_info(&self) -> Option<NetworkInfo>;
}

/// One-shot marker for a disconnect the driver asked for itself.
///
/// Drivers arm it before tearing down a stale association so the resulting
/// radio event is not reported as a lost link.
#[derive(Debug, Default)]
pub struct ExpectedDisconnect(AtomicBool);

impl ExpectedDisconnect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn disarm(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Map a station disconnect to the event the link task should see.
    pub fn on_disconnected(&self) -> Option<LinkEvent> {
        if self.0.swap(false, Ordering::AcqRel) {
            None
        } else {
            Some(LinkEvent::LinkLost)
        }
    }
}

/// Owns the link state machine and the network channels.
pub struct LinkManager {
    machine: Mutex<LinkStateMachine>,
    changed: Condvar,
    link_up: AtomicBool,
    samples: SampleChannel,
    commands: CommandChannel,
    inbound_port: u16,
    receive_timeout: Duration,
    listener_started: AtomicBool,
    mailbox: Arc<Mailbox>,
    stats: Arc<PipelineStats>,
}

impl LinkManager {
    pub fn new(
        config: &DeviceConfig,
        mailbox: Arc<Mailbox>,
        stats: Arc<PipelineStats>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            machine: Mutex::new(LinkStateMachine::new(config.max_retries)),
            changed: Condvar::new(),
            link_up: AtomicBool::new(false),
            samples: SampleChannel::new(
                config.sample_addr()?,
                config.local_sample_port,
                config.send_timeout,
            ),
            commands: CommandChannel::new(
                config.command_addr()?,
                config.connect_timeout,
                config.send_timeout,
            ),
            inbound_port: config.inbound_port,
            receive_timeout: config.receive_timeout,
            listener_started: AtomicBool::new(false),
            mailbox,
            stats,
        })
    }

    pub fn state(&self) -> LinkState {
        self.machine().state()
    }

    pub fn retry_count(&self) -> u32 {
        self.machine().retry_count()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.link_up.load(Ordering::Acquire)
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    /// Apply one event and carry out the resulting actions.
    ///
    /// An association attempt the driver rejects synchronously is fed back
    /// as `AssociationFailed`, so it counts against the retry budget.
    pub fn handle_event(&self, event: LinkEvent, driver: &mut dyn WifiDriver) {
        let mut next = Some(event);

        while let Some(event) = next.take() {
            let (before, action, after, retries) = {
                let mut machine = self.machine();
                let before = machine.state();
                let action = machine.handle(event);
                (before, action, machine.state(), machine.retry_count())
            };

            if before != after {
                info!(target: "link", "{:?} -> {:?} on {:?} (retries {})", before, after, event, retries);
            } else {
                debug!(target: "link", "{:?} ignored in {:?}", event, before);
            }

            if before == LinkState::Connected && after != LinkState::Connected {
                self.go_offline();
            }

            match action {
                LinkAction::None => {}
                LinkAction::Associate => {
                    self.stats.association_attempted();
                    if let Err(e) = driver.associate() {
                        warn!(target: "link", "Association attempt failed: {}", e);
                        next = Some(LinkEvent::AssociationFailed);
                    }
                }
                LinkAction::Online => self.go_online(driver),
                LinkAction::GiveUp => {
                    error!(target: "link", "Wi-Fi failed after {} attempts, giving up until reset", retries);
                }
            }

            if before != after {
                self.changed.notify_all();
            }
        }
    }

    /// Event loop for the link task.
    ///
    /// Returns when `stop` is set or every sender is gone.
    pub fn run_events(
        &self,
        events: Receiver<LinkEvent>,
        driver: &mut dyn WifiDriver,
        stop: &AtomicBool,
    ) {
        while !stop.load(Ordering::Acquire) {
            match events.recv_timeout(EVENT_POLL) {
                Ok(event) => self.handle_event(event, driver),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(target: "link", "Link event channel closed");
                    break;
                }
            }
        }
    }

    /// Block until `Connected`, `Failed` or `timeout`.
    ///
    /// Returns `true` only if the link is up.
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        let guard = self.machine();
        let result = self.changed.wait_timeout_while(guard, timeout, |m| {
            !matches!(m.state(), LinkState::Connected | LinkState::Failed)
        });
        let guard = match result {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        };
        guard.state() == LinkState::Connected
    }

    /// Send one sample datagram, best effort.
    ///
    /// Returns `false` if the link is down or the socket refused it.
    pub fn send_samples(&self, payload: &[u8]) -> bool {
        if !self.is_connected() {
            return false;
        }
        match self.samples.send(payload) {
            Ok(_) => {
                self.stats.chunk_sent();
                true
            }
            Err(e) => {
                self.stats.send_failed();
                warn!(target: "link", "UDP send failed: {}", e);
                false
            }
        }
    }

    /// Send one control command, best effort. Never waits for a reply.
    pub fn send_command(&self, text: &str) -> bool {
        if !self.is_connected() {
            debug!(target: "link", "Command dropped, link down: {}", text);
            return false;
        }
        match self.commands.send(text) {
            Ok(()) => {
                self.stats.command_sent();
                info!(target: "link", "Command sent: {}", text);
                true
            }
            Err(e) => {
                self.stats.send_failed();
                warn!(target: "link", "Command to {} failed: {}", self.commands.dest(), e);
                false
            }
        }
    }

    fn go_online(&self, driver: &mut dyn WifiDriver) {
        match driver.network_info() {
            Some(info) => info!(target: "link", "Wi-Fi connected: {}", info),
            None => info!(target: "link", "Wi-Fi connected"),
        }

        match self.samples.open() {
            Ok(local) => info!(target: "link", "Sending from {} to {}", local, self.samples.dest()),
            Err(e) => error!(target: "link", "Cannot open sample socket: {}", e),
        }
        self.link_up.store(true, Ordering::Release);
        self.start_listener();
    }

    fn go_offline(&self) {
        self.link_up.store(false, Ordering::Release);
        self.samples.close();
        warn!(target: "link", "Wi-Fi link lost");
    }

    /// Start the inbound listener once. A failed bind is retried on the
    /// next connect.
    fn start_listener(&self) {
        if self.listener_started.swap(true, Ordering::AcqRel) {
            return;
        }

        let listener = match InboundListener::bind(self.inbound_port, self.receive_timeout) {
            Ok(listener) => listener,
            Err(e) => {
                error!(target: "link", "Failed to bind inbound port {}: {}", self.inbound_port, e);
                self.listener_started.store(false, Ordering::Release);
                return;
            }
        };

        let mailbox = Arc::clone(&self.mailbox);
        let stats = Arc::clone(&self.stats);
        let spawned = thread::Builder::new()
            .name("inbound".into())
            .stack_size(crate::device::TASK_STACK)
            .spawn(move || listener.run(&mailbox, &stats));
        if let Err(e) = spawned {
            error!(target: "link", "Cannot spawn inbound listener: {}", e);
            self.listener_started.store(false, Ordering::Release);
        }
    }

    fn machine(&self) -> MutexGuard<'_, LinkStateMachine> {
        self.machine.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_disconnect_swallows_one_event() {
        let expected = ExpectedDisconnect::new();
        assert_eq!(expected.on_disconnected(), Some(LinkEvent::LinkLost));

        expected.arm();
        assert_eq!(expected.on_disconnected(), None);
        assert_eq!(expected.on_disconnected(), Some(LinkEvent::LinkLost));

        expected.arm();
        expected.disarm();
        assert_eq!(expected.on_disconnected(), Some(LinkEvent::LinkLost));
    }
}
