use std::collections::HashMap;
use std::sync::RwLock;

use super::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::schedule::types::{Appointment, AppointmentFilter};

/// Process-local storage, used by tests and the `memory` store setting
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, Appointment>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Appointment>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|a| (a.id.clone(), a)).collect()),
        }
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("memory store lock poisoned".into())
}

impl StorageBackend for MemoryBackend {
    fn insert(&self, appointment: &Appointment) -> StorageResult<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        if records.contains_key(&appointment.id) {
            return Err(StorageError::DuplicateId(appointment.id.clone()));
        }
        records.insert(appointment.id.clone(), appointment.clone());
        Ok(())
    }

    fn replace(&self, appointment: &Appointment) -> StorageResult<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        match records.get_mut(&appointment.id) {
            Some(existing) => {
                *existing = appointment.clone();
                Ok(())
            }
            None => Err(StorageError::MissingId(appointment.id.clone())),
        }
    }

    fn get(&self, id: &str) -> StorageResult<Option<Appointment>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(id).cloned())
    }

    fn list(&self, filter: &AppointmentFilter) -> StorageResult<Vec<Appointment>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.values().filter(|a| filter.matches(a)).cloned().collect())
    }
}
