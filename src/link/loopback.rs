//! Host stand-in for the Wi-Fi station.
//!
//! Associations "succeed" immediately on the loopback interface, after an
//! optional number of scripted failures. Used by the host simulation binary
//! and by tests.

use std::net::Ipv4Addr;
use std::sync::mpsc::Sender;

use super::{LinkEvent, NetworkInfo, WifiDriver};
use crate::error::LinkError;

pub struct LoopbackWifi {
    events: Option<Sender<LinkEvent>>,
    failures_left: u32,
    attempts: u32,
    associated: bool,
}

impl LoopbackWifi {
    /// Every association succeeds.
    pub fn new() -> Self {
        Self::failing(0)
    }

    /// The first `failures` associations fail (`u32::MAX` = never succeed).
    pub fn failing(failures: u32) -> Self {
        Self {
            events: None,
            failures_left: failures,
            attempts: 0,
            associated: false,
        }
    }

    /// Association attempts seen so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn post(&self, event: LinkEvent) -> Result<(), LinkError> {
        let events = self.events.as_ref().ok_or(LinkError::NotConnected)?;
        events
            .send(event)
            .map_err(|_| LinkError::Driver("event channel closed".into()))
    }
}

impl Default for LoopbackWifi {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiDriver for LoopbackWifi {
    fn start(&mut self, events: Sender<LinkEvent>) -> Result<(), LinkError> {
        self.events = Some(events);
        Ok(())
    }

    fn associate(&mut self) -> Result<(), LinkError> {
        self.attempts = self.attempts.saturating_add(1);
        if self.failures_left > 0 {
            if self.failures_left != u32::MAX {
                self.failures_left -= 1;
            }
            return self.post(LinkEvent::AssociationFailed);
        }
        self.associated = true;
        self.post(LinkEvent::Associated)
    }

    fn network_info(&self) -> Option<NetworkInfo> {
        self.associated.then(|| NetworkInfo {
            ssid: "loopback".into(),
            ip: Ipv4Addr::LOCALHOST,
            gateway: Ipv4Addr::LOCALHOST,
            netmask: Ipv4Addr::new(255, 0, 0, 0),
            rssi_dbm: None,
        })
    }
}
