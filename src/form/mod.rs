pub mod submission;

pub use submission::{validate_draft, validate_patch, AppointmentDraft, AppointmentPatch};
