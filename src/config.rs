//! Runtime settings.
//!
//! Resolved once at startup and passed into the services; request handling never
//! reads the environment.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StorageError;
use crate::schedule::time_window::{TimeWindowResolver, DEFAULT_SHIFT_MINUTES};
use crate::store::{AppointmentStore, CsvBackend, MemoryBackend, StorageBackend};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SCHEDULES_CSV: &str = "data/schedules.csv";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to open appointment store: {0}")]
    Store(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub store: StoreKind,
    pub schedules_csv: PathBuf,
    pub default_shift_minutes: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            store: StoreKind::Csv,
            schedules_csv: PathBuf::from(DEFAULT_SCHEDULES_CSV),
            default_shift_minutes: DEFAULT_SHIFT_MINUTES,
        }
    }
}

impl Settings {
    /// Reads `SCHEDULER_PORT`, `SCHEDULER_STORE`, `SCHEDULES_CSV` and `DEFAULT_SHIFT_MINUTES`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(port) = lookup("SCHEDULER_PORT") {
            settings.port = port.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    name: "SCHEDULER_PORT",
                    value: port.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        if let Some(store) = lookup("SCHEDULER_STORE") {
            settings.store = match store.trim().to_lowercase().as_str() {
                "memory" => StoreKind::Memory,
                "csv" => StoreKind::Csv,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "SCHEDULER_STORE",
                        value: store,
                        reason: "expected memory or csv".into(),
                    })
                }
            };
        }

        if let Some(path) = lookup("SCHEDULES_CSV").filter(|p| !p.trim().is_empty()) {
            settings.schedules_csv = PathBuf::from(path.trim());
        }

        if let Some(minutes) = lookup("DEFAULT_SHIFT_MINUTES") {
            let parsed: i64 = minutes.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    name: "DEFAULT_SHIFT_MINUTES",
                    value: minutes.clone(),
                    reason: e.to_string(),
                }
            })?;
            if !(1..=24 * 60).contains(&parsed) {
                return Err(ConfigError::InvalidValue {
                    name: "DEFAULT_SHIFT_MINUTES",
                    value: minutes,
                    reason: "must be between 1 and 1440".into(),
                });
            }
            settings.default_shift_minutes = parsed;
        }

        Ok(settings)
    }

    pub fn resolver(&self) -> TimeWindowResolver {
        TimeWindowResolver::new(self.default_shift_minutes)
    }

    /// Opens the configured backend and wraps it in an `AppointmentStore`
    pub fn open_store(&self) -> Result<AppointmentStore, ConfigError> {
        let backend: Arc<dyn StorageBackend> = match self.store {
            StoreKind::Memory => Arc::new(MemoryBackend::new()),
            StoreKind::Csv => Arc::new(CsvBackend::open(&self.schedules_csv)?),
        };
        Ok(AppointmentStore::new(backend, self.resolver()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        assert_eq!(settings(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn reads_every_variable() {
        let s = settings(&[
            ("SCHEDULER_PORT", "9090"),
            ("SCHEDULER_STORE", "Memory"),
            ("SCHEDULES_CSV", "/tmp/shifts.csv"),
            ("DEFAULT_SHIFT_MINUTES", "90"),
        ])
        .unwrap();
        assert_eq!(s.port, 9090);
        assert_eq!(s.store, StoreKind::Memory);
        assert_eq!(s.schedules_csv, PathBuf::from("/tmp/shifts.csv"));
        assert_eq!(s.default_shift_minutes, 90);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(settings(&[("SCHEDULER_PORT", "eighty")]).is_err());
        assert!(settings(&[("SCHEDULER_STORE", "postgres")]).is_err());
        assert!(settings(&[("DEFAULT_SHIFT_MINUTES", "0")]).is_err());
        assert!(settings(&[("DEFAULT_SHIFT_MINUTES", "2000")]).is_err());
    }

    #[test]
    fn memory_store_opens_without_disk() {
        let store = settings(&[("SCHEDULER_STORE", "memory")])
            .unwrap()
            .open_store()
            .unwrap();
        assert!(store
            .list(&crate::schedule::types::AppointmentFilter::default())
            .unwrap()
            .is_empty());
    }
}
