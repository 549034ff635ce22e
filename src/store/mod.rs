//! Appointment persistence.
//!
//! [`StorageBackend`] is the raw record store. [`AppointmentStore`] wraps one and
//! enforces the scheduling invariants at write time: every record resolves to a
//! valid interval, and no staff member holds two overlapping active appointments.

pub mod csv_file;
pub mod locks;
pub mod memory;

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::{SchedulingError, SchedulingResult, StorageError, StorageResult};
use crate::form::AppointmentPatch;
use crate::schedule::conflict::ConflictDetector;
use crate::schedule::time_window::TimeWindowResolver;
use crate::schedule::types::{Appointment, AppointmentFilter, Conflict, Interval};

pub use csv_file::CsvBackend;
pub use locks::StaffLocks;
pub use memory::MemoryBackend;

pub trait StorageBackend: Send + Sync {
    fn insert(&self, appointment: &Appointment) -> StorageResult<()>;
    fn replace(&self, appointment: &Appointment) -> StorageResult<()>;
    fn get(&self, id: &str) -> StorageResult<Option<Appointment>>;
    fn list(&self, filter: &AppointmentFilter) -> StorageResult<Vec<Appointment>>;
}

impl StorageError {
    /// Faults worth a second attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Io(_) | StorageError::Csv(_) | StorageError::Unavailable(_)
        )
    }
}

/// Runs a backend call, retrying a transient fault once
fn with_retry<T, F>(operation: &str, mut call: F) -> SchedulingResult<T>
where
    F: FnMut() -> StorageResult<T>,
{
    match call() {
        Ok(value) => Ok(value),
        Err(first) if first.is_transient() => {
            warn!(operation, error = %first, "storage call failed, retrying once");
            call().map_err(|second| {
                error!(operation, error = %second, "storage call failed after retry");
                SchedulingError::Internal(second)
            })
        }
        Err(e) => {
            error!(operation, error = %e, "storage call failed");
            Err(SchedulingError::Internal(e))
        }
    }
}

pub struct AppointmentStore {
    backend: Arc<dyn StorageBackend>,
    locks: StaffLocks,
    resolver: TimeWindowResolver,
    detector: ConflictDetector,
}

impl AppointmentStore {
    pub fn new(backend: Arc<dyn StorageBackend>, resolver: TimeWindowResolver) -> Self {
        Self {
            backend,
            locks: StaffLocks::new(),
            resolver,
            detector: ConflictDetector::new(resolver),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), TimeWindowResolver::default())
    }

    pub fn resolver(&self) -> &TimeWindowResolver {
        &self.resolver
    }

    /// Persists a new appointment after checking it against the staff member's active shifts.
    pub fn create(&self, appointment: Appointment) -> SchedulingResult<Appointment> {
        let interval = self.resolver.resolve_new_appointment(&appointment)?;

        let slot = self.locks.slot(&appointment.staff_email);
        let _guard = locks::hold(&slot);

        if appointment.status.is_active() {
            self.ensure_free(&appointment.staff_email, interval, None)?;
        }
        with_retry("insert", || self.backend.insert(&appointment))?;

        info!(
            appointment_id = %appointment.id,
            staff = %appointment.staff_email,
            status = %appointment.status,
            start = %interval.start,
            end = %interval.end,
            "appointment created"
        );
        Ok(appointment)
    }

    /// Applies `patch` to appointment `id`.
    ///
    /// Interval changes are re-resolved from the merged fields and re-checked against
    /// the staff member's other active shifts before `check` runs. `check` sees the
    /// stored record and the candidate, and may adjust the candidate or reject it.
    pub fn update<F>(
        &self,
        id: &str,
        patch: &AppointmentPatch,
        check: F,
    ) -> SchedulingResult<Appointment>
    where
        F: FnOnce(&Appointment, &mut Appointment) -> SchedulingResult<()>,
    {
        let staff_email = self.get(id)?.staff_email;
        let slot = self.locks.slot(&staff_email);
        let _guard = locks::hold(&slot);

        // Re-read under the lock; the unlocked read only told us which lock to take
        let current = self.get(id)?;
        let mut candidate = current.clone();

        if patch.changes_interval() {
            if current.status.is_terminal() {
                return Err(SchedulingError::validation(format!(
                    "appointment {} is {} and can no longer be rescheduled",
                    current.id, current.status
                )));
            }
            let resolved = self.resolver.resolve(&patch.merged_time_fields(&current))?;
            candidate.date = resolved.date;
            candidate.set_time_window(resolved.window);
            self.ensure_free(&current.staff_email, resolved.interval, Some(&current.id))?;
        }
        patch.apply_details(&mut candidate);

        check(&current, &mut candidate)?;

        candidate.updated_at = Utc::now();
        with_retry("replace", || self.backend.replace(&candidate))?;

        info!(
            appointment_id = %candidate.id,
            staff = %candidate.staff_email,
            from = %current.status,
            to = %candidate.status,
            "appointment updated"
        );
        Ok(candidate)
    }

    pub fn get(&self, id: &str) -> SchedulingResult<Appointment> {
        with_retry("get", || self.backend.get(id))?
            .ok_or_else(|| SchedulingError::NotFound(id.to_string()))
    }

    /// Matching appointments ordered by date, start time and id
    pub fn list(&self, filter: &AppointmentFilter) -> SchedulingResult<Vec<Appointment>> {
        let mut appointments = with_retry("list", || self.backend.list(filter))?;
        appointments.sort_by_cached_key(|appt| {
            let start = self.resolver.resolve_appointment(appt).ok().map(|i| i.start);
            (appt.date, start, appt.id.clone())
        });
        Ok(appointments)
    }

    /// Active appointments of `staff_email` overlapping `interval`. Takes no lock.
    pub fn find_conflicts(
        &self,
        staff_email: &str,
        interval: Interval,
        exclude_id: Option<&str>,
    ) -> SchedulingResult<Vec<Conflict>> {
        let existing = with_retry("list", || {
            self.backend.list(&AppointmentFilter::for_staff(staff_email))
        })?;
        self.detector
            .find_conflicts(&existing, staff_email, interval, exclude_id)
    }

    fn ensure_free(
        &self,
        staff_email: &str,
        interval: Interval,
        exclude_id: Option<&str>,
    ) -> SchedulingResult<()> {
        let conflicts = self.find_conflicts(staff_email, interval, exclude_id)?;
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(SchedulingError::Conflict(conflicts))
        }
    }
}
