//! WiFi station adapter (external collaborator).
//!
//! Boot-time association plus a cheap reconnect poll the main loop calls
//! once per iteration. The core never sees WiFi state — a dropped link
//! just means no new connections arrive at the listener.
//!
//! Host builds get a no-op stand-in so the rest of the system runs
//! unmodified in simulation.

use log::info;

use crate::config::WifiConfig;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub use esp_impl::WifiAdapter;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
mod esp_impl {
    use anyhow::{bail, Result};
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};
    use log::{info, warn};

    use crate::config::WifiConfig;

    /// Station-mode WiFi with retrying boot connect and reconnect polling.
    pub struct WifiAdapter {
        wifi: BlockingWifi<EspWifi<'static>>,
        reconnect_delay_ms: u32,
        last_attempt_ms: u64,
    }

    impl WifiAdapter {
        pub fn new(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: EspDefaultNvsPartition,
            cfg: &WifiConfig,
        ) -> Result<Self> {
            if cfg.ssid.is_empty() {
                bail!("WiFi SSID not configured");
            }
            let mut wifi = BlockingWifi::wrap(
                EspWifi::new(modem, sysloop.clone(), Some(nvs))?,
                sysloop,
            )?;
            wifi.set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: cfg.ssid.as_str().try_into().unwrap_or_default(),
                password: cfg.password.as_str().try_into().unwrap_or_default(),
                ..Default::default()
            }))?;
            Ok(Self {
                wifi,
                reconnect_delay_ms: u32::from(cfg.reconnect_delay_secs) * 1000,
                last_attempt_ms: 0,
            })
        }

        /// Associate at boot, retrying up to the configured attempt count.
        pub fn connect(&mut self, max_attempts: u8) -> Result<()> {
            self.wifi.start()?;
            for attempt in 1..=max_attempts {
                info!("WiFi connect attempt {attempt}/{max_attempts}");
                if self.wifi.connect().is_ok() && self.wifi.wait_netif_up().is_ok() {
                    if let Ok(ip_info) = self.wifi.wifi().sta_netif().get_ip_info() {
                        info!("WiFi connected, IP {}", ip_info.ip);
                    }
                    return Ok(());
                }
                warn!("WiFi connect attempt {attempt} failed");
            }
            bail!("WiFi association failed after {max_attempts} attempts")
        }

        /// Cheap per-iteration reconnect check.
        pub fn poll(&mut self, now_ms: u64) {
            if self.wifi.is_connected().unwrap_or(false) {
                return;
            }
            if now_ms.saturating_sub(self.last_attempt_ms) < u64::from(self.reconnect_delay_ms) {
                return;
            }
            self.last_attempt_ms = now_ms;
            warn!("WiFi disconnected, attempting reconnection");
            let _ = self.wifi.connect();
        }
    }
}

/// No-op WiFi stand-in for host builds.
#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub struct WifiAdapter;

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
impl WifiAdapter {
    pub fn new(_cfg: &WifiConfig) -> Self {
        info!("wifi(sim): adapter stubbed on host");
        Self
    }

    pub fn connect(&mut self, _max_attempts: u8) -> anyhow::Result<()> {
        Ok(())
    }

    pub fn poll(&mut self, _now_ms: u64) {}
}
