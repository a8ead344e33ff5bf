//! Persistent counter storage.
//!
//! The relay's usage counters are the only state that survives reboot
//! (everything else is reconstructed at boot). They are serialized with
//! `postcard` into a single small blob:
//!
//! - **ESP-IDF** — stored in an NVS namespace.
//! - **host** — an in-memory store for tests and simulation.
//!
//! A missing or corrupt blob is not an error: `load` returns `None` and
//! the controller starts from zeroed counters.

use log::warn;

use crate::app::ports::{StatsStore, StorageError};
use crate::relay::RelayStats;

/// Upper bound on the serialized counter blob.
const STATS_BLOB_MAX: usize = 64;

// ---------------------------------------------------------------------------
// In-memory store (host builds, tests)
// ---------------------------------------------------------------------------

/// Volatile stand-in for NVS on non-device targets.
#[derive(Default)]
pub struct MemStatsStore {
    blob: Option<Vec<u8>>,
}

impl MemStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsStore for MemStatsStore {
    fn load(&self) -> Option<RelayStats> {
        let blob = self.blob.as_ref()?;
        match postcard::from_bytes(blob) {
            Ok(stats) => Some(stats),
            Err(_) => {
                warn!("stored relay statistics corrupt, starting fresh");
                None
            }
        }
    }

    fn save(&mut self, stats: &RelayStats) -> Result<(), StorageError> {
        let blob = postcard::to_allocvec(stats).map_err(|_| StorageError::IoError)?;
        self.blob = Some(blob);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NVS store (device)
// ---------------------------------------------------------------------------

#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub use esp_impl::NvsStatsStore;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
mod esp_impl {
    use super::{StatsStore, StorageError, RelayStats, STATS_BLOB_MAX};
    use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
    use log::warn;

    const NAMESPACE: &str = "relayguard";
    const KEY: &str = "relay_stats";

    /// Counter persistence backed by the default NVS partition.
    pub struct NvsStatsStore {
        nvs: EspNvs<NvsDefault>,
    }

    impl NvsStatsStore {
        pub fn new() -> anyhow::Result<Self> {
            let partition = EspNvsPartition::<NvsDefault>::take()?;
            let nvs = EspNvs::new(partition, NAMESPACE, true)?;
            Ok(Self { nvs })
        }
    }

    impl StatsStore for NvsStatsStore {
        fn load(&self) -> Option<RelayStats> {
            let mut buf = [0u8; STATS_BLOB_MAX];
            let blob = self.nvs.get_blob(KEY, &mut buf).ok().flatten()?;
            match postcard::from_bytes(blob) {
                Ok(stats) => Some(stats),
                Err(_) => {
                    warn!("stored relay statistics corrupt, starting fresh");
                    None
                }
            }
        }

        fn save(&mut self, stats: &RelayStats) -> Result<(), StorageError> {
            let mut buf = [0u8; STATS_BLOB_MAX];
            let blob =
                postcard::to_slice(stats, &mut buf).map_err(|_| StorageError::IoError)?;
            self.nvs.set_blob(KEY, blob).map_err(|_| StorageError::Full)
        }
    }
}
