use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One mutex per staff email, created on first use.
///
/// Held across conflict check and write so that two commits for the same staff
/// member cannot both pass the check.
#[derive(Debug, Default)]
pub struct StaffLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StaffLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock handle for `staff_email`; call `lock()` on it to serialize.
    pub fn slot(&self, staff_email: &str) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(staff_email.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Locks a slot. The guarded value is `()`, so a poisoned lock is safe to reuse.
pub fn hold(slot: &Mutex<()>) -> MutexGuard<'_, ()> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
