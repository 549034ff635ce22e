use tracing::{debug, error};

use super::time_window::TimeWindowResolver;
use super::types::{normalize_email, Appointment, Conflict, Interval};
use crate::error::{SchedulingError, SchedulingResult, StorageError};

/// Finds a staff member's active appointments that overlap a candidate interval.
///
/// Commit-time checks run this under the staff member's lock; the advisory check
/// runs it on an unlocked snapshot. Both use the same overlap rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector {
    resolver: TimeWindowResolver,
}

impl ConflictDetector {
    pub fn new(resolver: TimeWindowResolver) -> Self {
        Self { resolver }
    }

    /// Returns the conflicts ordered by start time, then by id.
    ///
    /// Records that are terminal, belong to another staff member, or match
    /// `exclude_id` are skipped. An active record of this staff member that cannot
    /// be placed in time fails the whole check, since it may hold the slot.
    pub fn find_conflicts<'a, I>(
        &self,
        existing: I,
        staff_email: &str,
        candidate: Interval,
        exclude_id: Option<&str>,
    ) -> SchedulingResult<Vec<Conflict>>
    where
        I: IntoIterator<Item = &'a Appointment>,
    {
        let staff_email = normalize_email(staff_email);
        let mut conflicts = Vec::new();

        for appt in existing {
            if appt.staff_email != staff_email
                || !appt.status.is_active()
                || exclude_id.is_some_and(|id| appt.id == id)
            {
                continue;
            }
            let interval = self.resolver.resolve_appointment(appt).map_err(|e| {
                error!(
                    appointment_id = %appt.id,
                    error = %e,
                    "stored appointment has no usable time"
                );
                SchedulingError::Internal(StorageError::CorruptRow {
                    id: appt.id.clone(),
                    reason: e.to_string(),
                })
            })?;
            if interval.overlaps(&candidate) {
                conflicts.push(Conflict::new(appt, interval));
            }
        }

        conflicts.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.appointment_id.cmp(&b.appointment_id))
        });

        if !conflicts.is_empty() {
            debug!(
                staff = %staff_email,
                start = %candidate.start,
                end = %candidate.end,
                count = conflicts.len(),
                "candidate interval overlaps existing appointments"
            );
        }
        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::{AppointmentStatus, Priority};
    use chrono::{NaiveDate, NaiveDateTime, Utc};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 10)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    fn shift(
        id: &str,
        staff: &str,
        start: (u32, u32),
        end: (u32, u32),
        status: AppointmentStatus,
    ) -> Appointment {
        Appointment {
            id: id.to_string(),
            staff_email: staff.to_string(),
            manager_email: Some("admin@foodtruck.com".into()),
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            time_slot: None,
            start_time: Some(at(start.0, start.1)),
            end_time: Some(at(end.0, end.1)),
            location: None,
            shift_type: None,
            priority: Priority::Normal,
            notes: None,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn labelled(id: &str, staff: &str, label: &str) -> Appointment {
        let mut appt = shift(id, staff, (0, 0), (0, 1), AppointmentStatus::Scheduled);
        appt.start_time = None;
        appt.end_time = None;
        appt.time_slot = Some(label.to_string());
        appt
    }

    fn window(start: (u32, u32), end: (u32, u32)) -> Interval {
        Interval {
            start: at(start.0, start.1),
            end: at(end.0, end.1),
        }
    }

    fn check(
        existing: &[Appointment],
        candidate: Interval,
        exclude: Option<&str>,
    ) -> Vec<Conflict> {
        ConflictDetector::default()
            .find_conflicts(existing, STAFF, candidate, exclude)
            .unwrap()
    }

    const STAFF: &str = "staff1@foodtruck.com";

    #[test]
    fn touching_boundary_is_not_a_conflict() {
        let existing = vec![shift("APT1", STAFF, (9, 0), (11, 0), AppointmentStatus::Scheduled)];
        assert!(check(&existing, window((11, 0), (13, 0)), None).is_empty());
    }

    #[test]
    fn overlap_is_reported_with_times() {
        let existing = vec![shift("APT1", STAFF, (9, 0), (11, 0), AppointmentStatus::Confirmed)];
        let conflicts = check(&existing, window((10, 0), (12, 0)), None);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].appointment_id, "APT1");
        assert_eq!(conflicts[0].interval(), window((9, 0), (11, 0)));
    }

    #[test]
    fn terminal_statuses_never_conflict() {
        let existing = vec![
            shift("APT1", STAFF, (9, 0), (11, 0), AppointmentStatus::Completed),
            shift("APT2", STAFF, (9, 0), (11, 0), AppointmentStatus::Cancelled),
            shift("APT3", STAFF, (9, 0), (11, 0), AppointmentStatus::Denied),
            shift("APT4", STAFF, (9, 0), (11, 0), AppointmentStatus::Requested),
        ];
        let conflicts = check(&existing, window((9, 0), (11, 0)), None);
        let ids: Vec<_> = conflicts.iter().map(|c| c.appointment_id.as_str()).collect();
        assert_eq!(ids, vec!["APT4"]);
    }

    #[test]
    fn other_staff_and_excluded_id_are_ignored() {
        let existing = vec![
            shift("APT1", "staff2@foodtruck.com", (9, 0), (11, 0), AppointmentStatus::Scheduled),
            shift("APT2", STAFF, (9, 0), (11, 0), AppointmentStatus::Scheduled),
        ];
        assert!(check(&existing, window((9, 30), (10, 0)), Some("APT2")).is_empty());
    }

    #[test]
    fn conflicts_are_ordered_by_start() {
        let existing = vec![
            shift("APT9", STAFF, (12, 0), (14, 0), AppointmentStatus::Scheduled),
            labelled("APT5", STAFF, "9:00 AM"),
            shift("APT7", STAFF, (11, 0), (12, 0), AppointmentStatus::Confirmed),
        ];
        let conflicts = ConflictDetector::default()
            .find_conflicts(&existing, "Staff1@FoodTruck.com", window((8, 0), (18, 0)), None)
            .unwrap();
        let ids: Vec<_> = conflicts.iter().map(|c| c.appointment_id.as_str()).collect();
        assert_eq!(ids, vec!["APT5", "APT7", "APT9"]);
        assert_eq!(conflicts[0].interval(), window((9, 0), (11, 0)));
    }

    #[test]
    fn unresolvable_active_row_fails_the_check() {
        let existing = vec![labelled("APT1", STAFF, "noonish")];
        let result = ConflictDetector::default().find_conflicts(
            &existing,
            STAFF,
            window((0, 0), (23, 0)),
            None,
        );
        match result {
            Err(SchedulingError::Internal(StorageError::CorruptRow { id, .. })) => {
                assert_eq!(id, "APT1")
            }
            other => panic!("expected corrupt row error, got {:?}", other),
        }
    }

    #[test]
    fn unresolvable_inactive_or_excluded_rows_are_ignored() {
        let mut cancelled = labelled("APT1", STAFF, "noonish");
        cancelled.status = AppointmentStatus::Cancelled;
        let existing = vec![cancelled, labelled("APT2", STAFF, "noonish")];
        assert!(check(&existing, window((0, 0), (23, 0)), Some("APT2")).is_empty());
    }

    #[test]
    fn label_longer_than_the_day_still_blocks() {
        let existing = vec![labelled("APT1", STAFF, "9:30 PM")];
        let conflicts = ConflictDetector::new(TimeWindowResolver::new(180))
            .find_conflicts(&existing, STAFF, window((21, 45), (22, 30)), None)
            .unwrap();
        assert_eq!(conflicts.len(), 1);
    }
}
