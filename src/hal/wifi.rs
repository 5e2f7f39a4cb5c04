//! ESP-IDF Wi-Fi station.
//!
//! Radio and IP events from the system event loop are translated into
//! [`LinkEvent`]s; the link task decides what to do with them.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::{self, EspError};
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent};
use log::{info, warn};

use crate::config::DeviceConfig;
use crate::error::LinkError;
use crate::link::{ExpectedDisconnect, LinkEvent, NetworkInfo, WifiDriver};

/// Station-mode radio.
pub struct EspStation {
    wifi: EspWifi<'static>,
    sysloop: EspSystemEventLoop,
    ssid: String,
    subscriptions: Vec<EspSubscription<'static, System>>,
    expected_disconnect: Arc<ExpectedDisconnect>,
}

impl EspStation {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &DeviceConfig,
    ) -> Result<Self, LinkError> {
        let mut wifi = EspWifi::new(modem, sysloop.clone(), nvs).map_err(driver)?;

        let client = ClientConfiguration {
            ssid: config
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| LinkError::Driver(format!("SSID too long: {}", config.ssid)))?,
            password: config
                .password
                .as_deref()
                .unwrap_or("")
                .try_into()
                .map_err(|_| LinkError::Driver("password too long".into()))?,
            auth_method: if config.password.is_some() {
                AuthMethod::WPA2Personal
            } else {
                AuthMethod::None
            },
            ..Default::default()
        };
        wifi.set_configuration(&Configuration::Client(client))
            .map_err(driver)?;

        Ok(Self {
            wifi,
            sysloop,
            ssid: config.ssid.clone(),
            subscriptions: Vec::new(),
            expected_disconnect: Arc::new(ExpectedDisconnect::new()),
        })
    }
}

impl WifiDriver for EspStation {
    fn start(&mut self, events: Sender<LinkEvent>) -> Result<(), LinkError> {
        let radio_events = events.clone();
        let expected = Arc::clone(&self.expected_disconnect);
        let radio = self
            .sysloop
            .subscribe::<WifiEvent, _>(move |event| {
                if matches!(event, WifiEvent::StaDisconnected { .. }) {
                    if let Some(event) = expected.on_disconnected() {
                        let _ = radio_events.send(event);
                    }
                }
            })
            .map_err(driver)?;

        let ip = self
            .sysloop
            .subscribe::<IpEvent, _>(move |event| {
                if matches!(event, IpEvent::DhcpIpAssigned { .. }) {
                    let _ = events.send(LinkEvent::Associated);
                }
            })
            .map_err(driver)?;

        self.subscriptions = vec![radio, ip];
        self.wifi.start().map_err(driver)?;
        info!(target: "link", "Wi-Fi station started, SSID {}", self.ssid);
        Ok(())
    }

    fn associate(&mut self) -> Result<(), LinkError> {
        // A stale association blocks connect(); drop it first. Its
        // disconnect event belongs to the old attempt.
        if self.wifi.is_connected().unwrap_or(false) {
            self.expected_disconnect.arm();
            if let Err(e) = self.wifi.disconnect() {
                self.expected_disconnect.disarm();
                warn!(target: "link", "Disconnect before retry failed: {}", e);
            }
        }
        self.wifi.connect().map_err(driver)
    }

    fn network_info(&self) -> Option<NetworkInfo> {
        let ip_info = self.wifi.sta_netif().get_ip_info().ok()?;

        let mut record = sys::wifi_ap_record_t::default();
        let rssi_dbm = unsafe { sys::esp_wifi_sta_get_ap_info(&mut record) == sys::ESP_OK as i32 }
            .then_some(record.rssi);

        Some(NetworkInfo {
            ssid: self.ssid.clone(),
            ip: ip_info.ip,
            gateway: ip_info.subnet.gateway,
            netmask: Ipv4Addr::from(ip_info.subnet.mask),
            rssi_dbm,
        })
    }
}

fn driver(e: EspError) -> LinkError {
    LinkError::Driver(e.to_string())
}
