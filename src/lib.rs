//! Shift scheduling for a small food truck crew: time windows, per-staff
//! conflict detection, role-gated status changes, and a JSON API over them.

pub mod config;
pub mod directory;
pub mod display;
pub mod error;
pub mod form;
pub mod schedule;
pub mod store;
pub mod web;

pub use config::Settings;
pub use error::{SchedulingError, SchedulingResult, StorageError};
pub use schedule::{Appointment, AppointmentStatus, Principal, Role, SchedulingService};
pub use store::AppointmentStore;
