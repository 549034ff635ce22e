pub mod conflict;
pub mod service;
pub mod slot_utils;
pub mod status;
pub mod time_window;
pub mod types;

pub use conflict::ConflictDetector;
pub use service::{ScheduleStats, SchedulingService};
pub use slot_utils::STANDARD_TIME_SLOTS;
pub use status::StatusStateMachine;
pub use time_window::{TimeFields, TimeWindowResolver};
pub use types::{
    Appointment, AppointmentFilter, AppointmentStatus, Conflict, Interval, Principal, Priority,
    Role,
};
