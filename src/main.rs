//! Relayguard firmware — main entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │                                                               │
//! │  RelayDriver     LogEventSink    NvsStatsStore   Monotonic    │
//! │  (RelayPort)     (EventSink)     (StatsStore)    Clock        │
//! │  WifiAdapter     TcpAcceptor                                  │
//! │                                                               │
//! │  ──────────────── Port Trait Boundary ─────────────────       │
//! │                                                               │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │ RelayController · SecurityManager · HttpDispatcher      │  │
//! │  │ (single-threaded cooperative loop, tick-first)          │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! One logical thread of control: the loop below is the only place any
//! mutable state is touched, so there are no locks anywhere in the system.
#![deny(unused_must_use)]

use anyhow::{bail, Context, Result};
use log::{info, warn};

use relayguard::adapters::log_sink::LogEventSink;
use relayguard::adapters::time::MonotonicClock;
use relayguard::adapters::wifi::WifiAdapter;
use relayguard::app::events::AppEvent;
use relayguard::app::ports::{Clock, EventSink, StatsStore};
use relayguard::config::SystemConfig;
use relayguard::http::server::HttpDispatcher;
use relayguard::http::transport::TcpAcceptor;
use relayguard::relay::RelayController;
use relayguard::security::SecurityManager;

/// Idle pacing for the cooperative loop. Short enough that the safety
/// timers' overshoot (one iteration) is negligible next to the coarsest
/// 1 s timer granularity.
const LOOP_PAUSE_MS: u64 = 10;

fn main() -> Result<()> {
    // ── 1. Platform bootstrap ─────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }

    info!("relayguard v{} starting", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration: load once, validate fail-fast ───────
    let config = load_config();
    config
        .validate()
        .map_err(|msg| anyhow::anyhow!(msg))
        .context("invalid configuration")?;
    info!(
        "relay on GPIO{} (active_low={}), safety timeout {}s, max on-time {}s",
        config.relay.pin,
        config.relay.active_low,
        config.relay.safety_timeout_secs,
        config.relay.max_on_time_secs
    );

    let clock = MonotonicClock::new();
    let mut sink = LogEventSink::new();

    // ── 3. Relay hardware + restored counters ─────────────────
    let mut stats_store = make_stats_store()?;
    let mut gpio = make_relay_driver(&config)?;
    let mut relay = RelayController::new(&config.relay, stats_store.load());
    relay
        .init(&mut gpio, config.relay.initial_state, clock.now_millis())
        .map_err(|e| anyhow::anyhow!("relay init failed: {e}"))?;

    // ── 4. Network up ─────────────────────────────────────────
    let mut wifi = make_wifi(&config)?;
    wifi.connect(config.wifi.max_connect_attempts)?;

    let listener = match TcpAcceptor::bind(config.server.port) {
        Ok(l) => l,
        Err(_) => bail!("failed to bind port {}", config.server.port),
    };
    info!("web server listening on port {}", config.server.port);

    // ── 5. Security manager + dispatcher ──────────────────────
    let boot_ms = clock.now_millis();
    let security = SecurityManager::from_config(&config);
    let mut dispatcher = HttpDispatcher::new(listener, config.clone(), security, boot_ms);

    sink.emit(&AppEvent::Started {
        relay_on: relay.is_on(),
    });
    info!("system ready, entering dispatch loop");

    // ── 6. Cooperative dispatch loop ──────────────────────────
    loop {
        let now = clock.now_millis();

        dispatcher.poll_iteration(&mut relay, &mut gpio, &mut sink, now);

        // Counters flush on ON→OFF edges; failures are logged and retried
        // next iteration.
        let _ = relay.persist_if_dirty(&mut stats_store);

        wifi.poll(now);

        sleep_ms(LOOP_PAUSE_MS);
    }
}

// ── Construction helpers (platform-split) ─────────────────────

fn load_config() -> SystemConfig {
    // The JSON document lives on flash next to the firmware; a missing or
    // unreadable file means factory defaults.
    match std::fs::read_to_string("/spiffs/config.json") {
        Ok(raw) => match SystemConfig::from_json(&raw) {
            Ok(cfg) => {
                info!("configuration loaded from /spiffs/config.json");
                cfg
            }
            Err(msg) => {
                warn!("config.json rejected ({msg}), using defaults");
                SystemConfig::default()
            }
        },
        Err(_) => {
            info!("no config.json found, using defaults");
            SystemConfig::default()
        }
    }
}

#[cfg(all(target_os = "espidf", feature = "espidf"))]
fn make_stats_store() -> Result<impl StatsStore> {
    relayguard::adapters::nvs::NvsStatsStore::new()
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
fn make_stats_store() -> Result<impl StatsStore> {
    Ok(relayguard::adapters::nvs::MemStatsStore::new())
}

#[cfg(all(target_os = "espidf", feature = "espidf"))]
fn make_relay_driver(
    config: &SystemConfig,
) -> Result<impl relayguard::app::ports::RelayPort> {
    relayguard::adapters::hardware::esp_relay_driver(&config.relay)
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
fn make_relay_driver(
    config: &SystemConfig,
) -> Result<impl relayguard::app::ports::RelayPort> {
    use relayguard::adapters::hardware::{RelayDriver, SimPin};
    Ok(RelayDriver::new(SimPin::default(), &config.relay))
}

#[cfg(all(target_os = "espidf", feature = "espidf"))]
fn make_wifi(config: &SystemConfig) -> Result<WifiAdapter> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    WifiAdapter::new(peripherals.modem, sysloop, nvs, &config.wifi)
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
fn make_wifi(config: &SystemConfig) -> Result<WifiAdapter> {
    Ok(WifiAdapter::new(&config.wifi))
}

fn sleep_ms(ms: u64) {
    std::thread::sleep(std::time::Duration::from_millis(ms));
}
