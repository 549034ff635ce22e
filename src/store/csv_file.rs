use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::schedule::types::{Appointment, AppointmentFilter};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One line of `schedules.csv`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AppointmentRow {
    appointment_id: String,
    manager_email: String,
    staff_email: String,
    date: String,
    time_slot: String,
    start_time: String,
    end_time: String,
    location: String,
    shift_type: String,
    priority: String,
    staff_notes: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl From<&Appointment> for AppointmentRow {
    fn from(appt: &Appointment) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let timestamp = |v: Option<NaiveDateTime>| {
            v.map(|t| t.format(TIMESTAMP_FORMAT).to_string()).unwrap_or_default()
        };
        Self {
            appointment_id: appt.id.clone(),
            manager_email: text(&appt.manager_email),
            staff_email: appt.staff_email.clone(),
            date: appt.date.format("%Y-%m-%d").to_string(),
            time_slot: text(&appt.time_slot),
            start_time: timestamp(appt.start_time),
            end_time: timestamp(appt.end_time),
            location: text(&appt.location),
            shift_type: text(&appt.shift_type),
            priority: appt.priority.to_string(),
            staff_notes: text(&appt.notes),
            status: appt.status.to_string(),
            created_at: appt.created_at.to_rfc3339(),
            updated_at: appt.updated_at.to_rfc3339(),
        }
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StorageError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let id = row.appointment_id.trim().to_string();
        let corrupt = |reason: String| StorageError::CorruptRow {
            id: id.clone(),
            reason,
        };
        let optional = |v: String| {
            let v = v.trim().to_string();
            (!v.is_empty()).then_some(v)
        };
        let timestamp = |v: &str| -> Result<Option<NaiveDateTime>, StorageError> {
            let v = v.trim();
            if v.is_empty() {
                return Ok(None);
            }
            NaiveDateTime::parse_from_str(v, TIMESTAMP_FORMAT)
                .map(Some)
                .map_err(|e| corrupt(format!("bad timestamp {:?}: {}", v, e)))
        };
        let recorded = |v: &str| -> Result<DateTime<Utc>, StorageError> {
            DateTime::parse_from_rfc3339(v.trim())
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| corrupt(format!("bad record timestamp {:?}: {}", v, e)))
        };

        if id.is_empty() {
            return Err(corrupt("missing appointment_id".into()));
        }

        Ok(Appointment {
            date: NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d")
                .map_err(|e| corrupt(format!("bad date {:?}: {}", row.date, e)))?,
            start_time: timestamp(&row.start_time)?,
            end_time: timestamp(&row.end_time)?,
            priority: row.priority.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            created_at: recorded(&row.created_at)?,
            updated_at: recorded(&row.updated_at)?,
            staff_email: row.staff_email.trim().to_lowercase(),
            manager_email: optional(row.manager_email),
            time_slot: optional(row.time_slot),
            location: optional(row.location),
            shift_type: optional(row.shift_type),
            notes: optional(row.staff_notes),
            id,
        })
    }
}

/// Appointments persisted in a CSV file.
///
/// The whole file is read at open and kept in memory; each mutation rewrites the
/// file through a temporary sibling and a rename, and only touches the in-memory
/// copy once the rename succeeded.
#[derive(Debug)]
pub struct CsvBackend {
    path: PathBuf,
    records: RwLock<HashMap<String, Appointment>>,
}

impl CsvBackend {
    /// Opens `path`, creating it with a header row if it does not exist
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            load_appointments(&path)?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            write_appointments(&path, std::iter::empty())?;
            info!(path = %path.display(), "created empty schedule file");
            HashMap::new()
        };
        debug!(path = %path.display(), count = records.len(), "loaded schedule file");

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<F>(&self, change: F) -> StorageResult<()>
    where
        F: FnOnce(&mut HashMap<String, Appointment>) -> StorageResult<()>,
    {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::Unavailable("csv store lock poisoned".into()))?;
        let mut next = records.clone();
        change(&mut next)?;
        write_appointments(&self.path, next.values())?;
        *records = next;
        Ok(())
    }
}

impl StorageBackend for CsvBackend {
    fn insert(&self, appointment: &Appointment) -> StorageResult<()> {
        self.mutate(|records| {
            if records.contains_key(&appointment.id) {
                return Err(StorageError::DuplicateId(appointment.id.clone()));
            }
            records.insert(appointment.id.clone(), appointment.clone());
            Ok(())
        })
    }

    fn replace(&self, appointment: &Appointment) -> StorageResult<()> {
        self.mutate(|records| match records.get_mut(&appointment.id) {
            Some(existing) => {
                *existing = appointment.clone();
                Ok(())
            }
            None => Err(StorageError::MissingId(appointment.id.clone())),
        })
    }

    fn get(&self, id: &str) -> StorageResult<Option<Appointment>> {
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::Unavailable("csv store lock poisoned".into()))?;
        Ok(records.get(id).cloned())
    }

    fn list(&self, filter: &AppointmentFilter) -> StorageResult<Vec<Appointment>> {
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::Unavailable("csv store lock poisoned".into()))?;
        Ok(records.values().filter(|a| filter.matches(a)).cloned().collect())
    }
}

/// Reads every appointment from a schedule CSV
pub fn load_appointments<P: AsRef<Path>>(path: P) -> StorageResult<HashMap<String, Appointment>> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::Headers).from_path(path)?;
    let mut records = HashMap::new();
    for row in reader.deserialize::<AppointmentRow>() {
        let appointment = Appointment::try_from(row?)?;
        if records.contains_key(&appointment.id) {
            return Err(StorageError::DuplicateId(appointment.id));
        }
        records.insert(appointment.id.clone(), appointment);
    }
    Ok(records)
}

fn write_appointments<'a, I>(path: &Path, appointments: I) -> StorageResult<()>
where
    I: IntoIterator<Item = &'a Appointment>,
{
    let mut rows: Vec<AppointmentRow> = appointments
        .into_iter()
        .map(AppointmentRow::from)
        .collect();
    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.appointment_id.cmp(&b.appointment_id))
    });

    let tmp_path = path.with_extension("csv.tmp");
    {
        let file = File::create(&tmp_path)?;
        // Header is written by hand so that an empty file still carries it
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record([
            "appointment_id",
            "manager_email",
            "staff_email",
            "date",
            "time_slot",
            "start_time",
            "end_time",
            "location",
            "shift_type",
            "priority",
            "staff_notes",
            "status",
            "created_at",
            "updated_at",
        ])?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
