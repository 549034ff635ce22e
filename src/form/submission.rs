use serde::{Deserialize, Serialize};

use crate::error::{SchedulingError, SchedulingResult};
use crate::schedule::time_window::TimeFields;
use crate::schedule::types::{normalize_email, Appointment, AppointmentStatus, Priority};

const MAX_TEXT_LEN: usize = 500;

/// A fully formed shift submitted for booking or request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentDraft {
    #[serde(default)]
    pub staff_email: String,
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub shift_type: Option<String>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
}

impl AppointmentDraft {
    pub fn time_fields(&self) -> TimeFields {
        TimeFields {
            date: self.date.clone(),
            time_slot: self.time_slot.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
        }
    }
}

/// Partial update of an existing appointment. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentPatch {
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub shift_type: Option<String>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentPatch {
    pub fn status(status: AppointmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn reschedule(fields: TimeFields) -> Self {
        Self {
            date: fields.date,
            time_slot: fields.time_slot,
            start_time: fields.start_time,
            end_time: fields.end_time,
            ..Self::default()
        }
    }

    pub fn changes_interval(&self) -> bool {
        self.patched_time_fields().touches_interval()
    }

    fn patched_time_fields(&self) -> TimeFields {
        TimeFields {
            date: self.date.clone(),
            time_slot: self.time_slot.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
        }
    }

    /// Time fields after applying this patch on top of `current`.
    ///
    /// A new label replaces an explicit pair and vice versa. When only the date moves,
    /// the stored representation is carried over to the new day.
    pub fn merged_time_fields(&self, current: &Appointment) -> TimeFields {
        let date = self.date.clone().or_else(|| Some(current.date.format("%Y-%m-%d").to_string()));

        if self.start_time.is_some() || self.end_time.is_some() {
            return TimeFields {
                date,
                time_slot: None,
                start_time: self.start_time.clone(),
                end_time: self.end_time.clone(),
            };
        }
        if self.time_slot.is_some() {
            return TimeFields {
                date,
                time_slot: self.time_slot.clone(),
                start_time: None,
                end_time: None,
            };
        }

        let clock =
            |ts: Option<chrono::NaiveDateTime>| ts.map(|t| t.format("%H:%M:%S").to_string());
        TimeFields {
            date,
            time_slot: current.time_slot.clone(),
            start_time: clock(current.start_time),
            end_time: clock(current.end_time),
        }
    }

    /// Copies descriptive fields onto `appointment`
    pub fn apply_details(&self, appointment: &mut Appointment) {
        if let Some(location) = &self.location {
            appointment.location = non_empty(location);
        }
        if let Some(shift_type) = &self.shift_type {
            appointment.shift_type = non_empty(shift_type);
        }
        if let Some(priority) = self.priority {
            appointment.priority = priority;
        }
        if let Some(notes) = &self.notes {
            appointment.notes = non_empty(notes);
        }
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Validates the non-time fields of a draft
pub fn validate_draft(draft: &AppointmentDraft) -> SchedulingResult<()> {
    let email = normalize_email(&draft.staff_email);
    if email.is_empty() {
        return Err(SchedulingError::validation("staff_email is required"));
    }
    if !looks_like_email(&email) {
        return Err(SchedulingError::validation(format!(
            "staff_email {:?} is not an email address",
            draft.staff_email
        )));
    }
    validate_text_fields(&[
        ("location", &draft.location),
        ("shift_type", &draft.shift_type),
        ("notes", &draft.notes),
    ])
}

/// Validates the descriptive fields of a patch
pub fn validate_patch(patch: &AppointmentPatch) -> SchedulingResult<()> {
    validate_text_fields(&[
        ("location", &patch.location),
        ("shift_type", &patch.shift_type),
        ("notes", &patch.notes),
    ])
}

fn validate_text_fields(fields: &[(&str, &Option<String>)]) -> SchedulingResult<()> {
    for (name, value) in fields {
        if let Some(value) = value {
            if value.chars().count() > MAX_TEXT_LEN {
                return Err(SchedulingError::validation(format!(
                    "{} must be at most {} characters",
                    name, MAX_TEXT_LEN
                )));
            }
        }
    }
    Ok(())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn draft(email: &str) -> AppointmentDraft {
        AppointmentDraft {
            staff_email: email.to_string(),
            date: Some("2024-01-10".into()),
            time_slot: Some("9:00 AM".into()),
            ..AppointmentDraft::default()
        }
    }

    fn stored() -> Appointment {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        Appointment {
            id: "APT1".into(),
            staff_email: "staff1@foodtruck.com".into(),
            manager_email: None,
            date,
            time_slot: None,
            start_time: date.and_hms_opt(9, 0, 0),
            end_time: date.and_hms_opt(11, 0, 0),
            location: Some("Downtown".into()),
            shift_type: None,
            priority: Priority::Normal,
            notes: None,
            status: AppointmentStatus::Scheduled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn draft_requires_a_staff_email() {
        assert!(validate_draft(&draft("staff1@foodtruck.com")).is_ok());
        assert!(matches!(validate_draft(&draft("  ")), Err(SchedulingError::Validation(_))));
        assert!(matches!(validate_draft(&draft("staff one")), Err(SchedulingError::Validation(_))));
    }

    #[test]
    fn long_notes_are_rejected() {
        let mut d = draft("staff1@foodtruck.com");
        d.notes = Some("x".repeat(MAX_TEXT_LEN + 1));
        assert!(matches!(validate_draft(&d), Err(SchedulingError::Validation(_))));
    }

    #[test]
    fn date_only_patch_keeps_explicit_times() {
        let patch = AppointmentPatch {
            date: Some("2024-01-12".into()),
            ..AppointmentPatch::default()
        };
        let fields = patch.merged_time_fields(&stored());
        assert_eq!(fields.date.as_deref(), Some("2024-01-12"));
        assert_eq!(fields.start_time.as_deref(), Some("09:00:00"));
        assert_eq!(fields.end_time.as_deref(), Some("11:00:00"));
        assert!(patch.changes_interval());
    }

    #[test]
    fn label_patch_replaces_explicit_pair() {
        let patch = AppointmentPatch {
            time_slot: Some("1:00 PM".into()),
            ..AppointmentPatch::default()
        };
        let fields = patch.merged_time_fields(&stored());
        assert_eq!(fields.date.as_deref(), Some("2024-01-10"));
        assert_eq!(fields.time_slot.as_deref(), Some("1:00 PM"));
        assert_eq!(fields.start_time, None);
    }

    #[test]
    fn status_only_patch_does_not_touch_interval() {
        assert!(!AppointmentPatch::status(AppointmentStatus::Confirmed).changes_interval());
    }

    #[test]
    fn blank_details_clear_fields() {
        let mut appt = stored();
        AppointmentPatch {
            location: Some("  ".into()),
            notes: Some(" bring apron ".into()),
            priority: Some(Priority::High),
            ..AppointmentPatch::default()
        }
        .apply_details(&mut appt);
        assert_eq!(appt.location, None);
        assert_eq!(appt.notes.as_deref(), Some("bring apron"));
        assert_eq!(appt.priority, Priority::High);
    }
}
