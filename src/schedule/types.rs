use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Requested,
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    Denied,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Requested,
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Denied,
    ];

    /// Active appointments occupy the staff member's time and take part in conflict checks
    pub fn is_active(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Requested
                | AppointmentStatus::Scheduled
                | AppointmentStatus::Confirmed
        )
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Requested => "requested",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| format!("unknown appointment status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Role resolved by the authentication boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Customer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Customer => "customer",
        })
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "customer" => Ok(Role::Customer),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// The caller of a scheduling operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn new(email: impl AsRef<str>, role: Role) -> Self {
        Self {
            email: normalize_email(email.as_ref()),
            role,
        }
    }

    pub fn admin(email: impl AsRef<str>) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn staff(email: impl AsRef<str>) -> Self {
        Self::new(email, Role::Staff)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True when this principal is the staff member the appointment is assigned to
    pub fn owns(&self, appointment: &Appointment) -> bool {
        self.role == Role::Staff && self.email == appointment.staff_email
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonical half-open interval `[start, end)` used by conflict logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// The two ways a shift's time can be written down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeWindow {
    /// Legacy "2:30 PM" style label, lasting the default shift length
    Label(String),
    Explicit {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// A persisted shift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub staff_email: String,
    pub manager_email: Option<String>,
    pub date: NaiveDate,
    pub time_slot: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub shift_type: Option<String>,
    pub priority: Priority,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// The representation stored on this record
    pub fn time_window(&self) -> Option<TimeWindow> {
        match (self.start_time, self.end_time, &self.time_slot) {
            (Some(start), Some(end), _) => Some(TimeWindow::Explicit { start, end }),
            (_, _, Some(label)) => Some(TimeWindow::Label(label.clone())),
            _ => None,
        }
    }

    pub fn set_time_window(&mut self, window: TimeWindow) {
        match window {
            TimeWindow::Label(label) => {
                self.time_slot = Some(label);
                self.start_time = None;
                self.end_time = None;
            }
            TimeWindow::Explicit { start, end } => {
                self.time_slot = None;
                self.start_time = Some(start);
                self.end_time = Some(end);
            }
        }
    }
}

/// Filter for listing appointments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub staff_email: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn for_staff(email: impl AsRef<str>) -> Self {
        Self {
            staff_email: Some(normalize_email(email.as_ref())),
            status: None,
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.staff_email
            .as_deref()
            .map_or(true, |email| appointment.staff_email == email)
            && self.status.map_or(true, |status| appointment.status == status)
    }
}

/// One existing appointment that overlaps a candidate interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub appointment_id: String,
    pub staff_email: String,
    pub date: NaiveDate,
    pub time_slot: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
}

impl Conflict {
    pub fn new(appointment: &Appointment, interval: Interval) -> Self {
        Self {
            appointment_id: appointment.id.clone(),
            staff_email: appointment.staff_email.clone(),
            date: appointment.date,
            time_slot: appointment.time_slot.clone(),
            start_time: interval.start,
            end_time: interval.end,
            status: appointment.status,
        }
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} {}-{}",
            self.appointment_id,
            self.date,
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )?;
        if let Some(label) = &self.time_slot {
            write!(f, " ({})", label)?;
        }
        write!(f, " [{}]", self.status)
    }
}
