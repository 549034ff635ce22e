use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, instrument};

use super::status::{actor_for, Actor, StatusStateMachine};
use super::time_window::TimeFields;
use super::types::{
    normalize_email, Appointment, AppointmentFilter, AppointmentStatus, Conflict, Principal, Role,
};
use crate::error::{SchedulingError, SchedulingResult};
use crate::form::submission::non_empty;
use crate::form::{validate_draft, validate_patch, AppointmentDraft, AppointmentPatch};
use crate::store::AppointmentStore;

/// Dashboard counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleStats {
    pub total_appointments: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_staff: BTreeMap<String, usize>,
}

/// The only entry point that mutates appointments
#[derive(Clone)]
pub struct SchedulingService {
    store: Arc<AppointmentStore>,
    machine: StatusStateMachine,
}

impl SchedulingService {
    pub fn new(store: Arc<AppointmentStore>) -> Self {
        Self {
            store,
            machine: StatusStateMachine::new(),
        }
    }

    pub fn store(&self) -> &AppointmentStore {
        &self.store
    }

    /// Books a shift on behalf of a staff member. Admin only; starts as `scheduled`.
    #[instrument(skip(self, draft), fields(by = %principal.email))]
    pub fn create_appointment(
        &self,
        principal: &Principal,
        draft: AppointmentDraft,
    ) -> SchedulingResult<Appointment> {
        if !principal.is_admin() {
            return Err(SchedulingError::unauthorized("only admins can book appointments"));
        }
        let manager = Some(principal.email.clone());
        let appointment = self.build(draft, AppointmentStatus::Scheduled, manager)?;
        self.store.create(appointment)
    }

    /// Staff member asks for a shift for themself; starts as `requested`.
    #[instrument(skip(self, draft), fields(by = %principal.email))]
    pub fn request_shift(
        &self,
        principal: &Principal,
        mut draft: AppointmentDraft,
    ) -> SchedulingResult<Appointment> {
        if principal.role != Role::Staff {
            return Err(SchedulingError::unauthorized("only staff can request shifts"));
        }
        let requested_for = normalize_email(&draft.staff_email);
        if !requested_for.is_empty() && requested_for != principal.email {
            return Err(SchedulingError::unauthorized(
                "staff can only request shifts for themselves",
            ));
        }
        draft.staff_email = principal.email.clone();
        let appointment = self.build(draft, AppointmentStatus::Requested, None)?;
        self.store.create(appointment)
    }

    /// Reschedules, edits or moves the status of an appointment.
    ///
    /// The interval is validated and conflict-checked before the status change is.
    #[instrument(skip(self, patch), fields(by = %principal.email))]
    pub fn update_appointment(
        &self,
        principal: &Principal,
        id: &str,
        patch: AppointmentPatch,
    ) -> SchedulingResult<Appointment> {
        let existing = self.store.get(id)?;
        let actor = actor_for(principal.role, principal.owns(&existing)).ok_or_else(|| {
            SchedulingError::unauthorized(format!(
                "{} may not modify appointment {}",
                principal.email, id
            ))
        })?;
        validate_patch(&patch)?;

        let machine = self.machine;
        let approver = principal.email.clone();
        self.store.update(id, &patch, |current, candidate| {
            let Some(target) = patch.status.filter(|s| *s != current.status) else {
                return Ok(());
            };
            machine.validate(current.status, target, actor)?;
            candidate.status = target;
            if actor == Actor::Admin && current.status == AppointmentStatus::Requested {
                candidate.manager_email = Some(approver);
            }
            Ok(())
        })
    }

    /// Advisory overlap check for live feedback. Never locks or writes.
    pub fn check_conflicts(
        &self,
        staff_email: &str,
        fields: &TimeFields,
    ) -> SchedulingResult<Vec<Conflict>> {
        self.advisory_check(staff_email, fields, None)
    }

    /// Like `check_conflicts`, skipping the appointment being rescheduled
    pub fn check_conflicts_excluding(
        &self,
        staff_email: &str,
        fields: &TimeFields,
        exclude_id: &str,
    ) -> SchedulingResult<Vec<Conflict>> {
        self.advisory_check(staff_email, fields, Some(exclude_id))
    }

    /// Role-scoped listing: admins see everything, staff only their own shifts.
    pub fn list_appointments(
        &self,
        principal: &Principal,
        filter: AppointmentFilter,
    ) -> SchedulingResult<Vec<Appointment>> {
        let filter = self.scope(principal, filter)?;
        self.store.list(&filter)
    }

    pub fn get_appointment(
        &self,
        principal: &Principal,
        id: &str,
    ) -> SchedulingResult<Appointment> {
        let appointment = self.store.get(id)?;
        match principal.role {
            Role::Admin => Ok(appointment),
            Role::Staff if principal.owns(&appointment) => Ok(appointment),
            _ => Err(SchedulingError::unauthorized(format!(
                "{} may not view appointment {}",
                principal.email, id
            ))),
        }
    }

    /// Status targets the principal could move this appointment to
    pub fn allowed_transitions(
        &self,
        principal: &Principal,
        appointment: &Appointment,
    ) -> Vec<AppointmentStatus> {
        actor_for(principal.role, principal.owns(appointment))
            .map(|actor| self.machine.allowed_targets(appointment.status, actor).to_vec())
            .unwrap_or_default()
    }

    pub fn stats(&self, principal: &Principal) -> SchedulingResult<ScheduleStats> {
        if !principal.is_admin() {
            return Err(SchedulingError::unauthorized("only admins can view schedule stats"));
        }
        let appointments = self.store.list(&AppointmentFilter::default())?;
        let mut stats = ScheduleStats {
            total_appointments: appointments.len(),
            ..ScheduleStats::default()
        };
        for status in AppointmentStatus::ALL {
            stats.by_status.insert(status.to_string(), 0);
        }
        for appt in &appointments {
            *stats.by_status.entry(appt.status.to_string()).or_insert(0) += 1;
            *stats.by_staff.entry(appt.staff_email.clone()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    fn advisory_check(
        &self,
        staff_email: &str,
        fields: &TimeFields,
        exclude_id: Option<&str>,
    ) -> SchedulingResult<Vec<Conflict>> {
        let staff_email = normalize_email(staff_email);
        if staff_email.is_empty() {
            return Err(SchedulingError::validation("staff_email is required"));
        }
        let resolved = self.store.resolver().resolve(fields)?;
        self.store.find_conflicts(&staff_email, resolved.interval, exclude_id)
    }

    fn scope(
        &self,
        principal: &Principal,
        mut filter: AppointmentFilter,
    ) -> SchedulingResult<AppointmentFilter> {
        filter.staff_email = filter.staff_email.map(|e| normalize_email(&e));
        match principal.role {
            Role::Admin => Ok(filter),
            Role::Staff => {
                if filter
                    .staff_email
                    .as_ref()
                    .is_some_and(|email| *email != principal.email)
                {
                    return Err(SchedulingError::unauthorized(
                        "staff can only list their own appointments",
                    ));
                }
                filter.staff_email = Some(principal.email.clone());
                Ok(filter)
            }
            Role::Customer => Err(SchedulingError::unauthorized(
                "customers have no access to staff schedules",
            )),
        }
    }

    fn build(
        &self,
        draft: AppointmentDraft,
        status: AppointmentStatus,
        manager_email: Option<String>,
    ) -> SchedulingResult<Appointment> {
        validate_draft(&draft)?;
        let resolved = self.store.resolver().resolve(&draft.time_fields())?;
        let now = Utc::now();

        let mut appointment = Appointment {
            id: new_appointment_id(),
            staff_email: normalize_email(&draft.staff_email),
            manager_email,
            date: resolved.date,
            time_slot: None,
            start_time: None,
            end_time: None,
            location: draft.location.as_deref().and_then(non_empty),
            shift_type: draft.shift_type.as_deref().and_then(non_empty),
            priority: draft.priority.unwrap_or_default(),
            notes: draft.notes.as_deref().and_then(non_empty),
            status,
            created_at: now,
            updated_at: now,
        };
        appointment.set_time_window(resolved.window);
        debug!(
            appointment_id = %appointment.id,
            start = %resolved.interval.start,
            "draft resolved"
        );
        Ok(appointment)
    }
}

/// `APT<unix millis><6 random digits>`
fn new_appointment_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("APT{}{:06}", Utc::now().timestamp_millis(), suffix)
}
