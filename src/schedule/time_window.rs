//! Resolution of an appointment's raw time fields into one canonical interval.
//!
//! A shift is written down either as a legacy label ("2:30 PM") on a date, or as an
//! explicit start/end pair. Both collapse into a half-open [`Interval`] here so that
//! nothing downstream has to care which one the caller supplied.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};
use serde::{Deserialize, Serialize};

use super::slot_utils::{parse_clock_time, parse_time_label};
use super::types::{Appointment, Interval, TimeWindow};
use crate::error::{SchedulingError, SchedulingResult};

pub const DEFAULT_SHIFT_MINUTES: i64 = 120;

/// Raw, unparsed time fields as submitted by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFields {
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl TimeFields {
    pub fn label(date: &str, time_slot: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            time_slot: Some(time_slot.to_string()),
            ..Self::default()
        }
    }

    pub fn explicit(date: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
            ..Self::default()
        }
    }

    pub fn touches_interval(&self) -> bool {
        self.date.is_some()
            || self.time_slot.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
    }
}

/// A date plus the one time representation that survived resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub date: NaiveDate,
    pub window: TimeWindow,
    pub interval: Interval,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeWindowResolver {
    default_duration: Duration,
}

impl Default for TimeWindowResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SHIFT_MINUTES)
    }
}

impl TimeWindowResolver {
    pub fn new(default_shift_minutes: i64) -> Self {
        Self {
            default_duration: Duration::minutes(default_shift_minutes),
        }
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    /// Resolves submitted fields. The explicit pair wins over a label when both are present.
    pub fn resolve(&self, fields: &TimeFields) -> SchedulingResult<ResolvedWindow> {
        let date = parse_date(fields.date.as_deref())?;
        let start = non_blank(fields.start_time.as_deref());
        let end = non_blank(fields.end_time.as_deref());

        let window = match (start, end) {
            (Some(start), Some(end)) => TimeWindow::Explicit {
                start: parse_timestamp(start, date, "start_time")?,
                end: parse_timestamp(end, date, "end_time")?,
            },
            (None, None) => match non_blank(fields.time_slot.as_deref()) {
                Some(label) => TimeWindow::Label(label.to_string()),
                None => {
                    return Err(SchedulingError::validation(
                        "either time_slot or start_time and end_time is required",
                    ))
                }
            },
            _ => {
                return Err(SchedulingError::validation(
                    "start_time and end_time must be supplied together",
                ))
            }
        };

        let interval = self.interval_for(date, &window)?;
        Ok(ResolvedWindow {
            date,
            window,
            interval,
        })
    }

    /// Interval of an appointment about to be written. Held to the same rules as `resolve`.
    pub fn resolve_new_appointment(&self, appointment: &Appointment) -> SchedulingResult<Interval> {
        self.interval_for(appointment.date, &stored_window(appointment)?)
    }

    /// Canonical interval of an already stored appointment.
    ///
    /// A stored label whose default length no longer fits its day (the default was
    /// raised after it was booked) runs until midnight instead of failing.
    pub fn resolve_appointment(&self, appointment: &Appointment) -> SchedulingResult<Interval> {
        let window = stored_window(appointment)?;
        match &window {
            TimeWindow::Label(label) => {
                let start = appointment.date.and_time(label_start(label)?);
                let midnight = appointment.date.and_time(NaiveTime::MIN) + Duration::days(1);
                Ok(Interval {
                    start,
                    end: (start + self.default_duration).min(midnight),
                })
            }
            TimeWindow::Explicit { .. } => self.interval_for(appointment.date, &window),
        }
    }

    fn interval_for(&self, date: NaiveDate, window: &TimeWindow) -> SchedulingResult<Interval> {
        let interval = match window {
            TimeWindow::Label(label) => {
                let start = date.and_time(label_start(label)?);
                Interval {
                    start,
                    end: start + self.default_duration,
                }
            }
            TimeWindow::Explicit { start, end } => Interval {
                start: *start,
                end: *end,
            },
        };

        if interval.start >= interval.end {
            return Err(SchedulingError::validation(format!(
                "start {} must be before end {}",
                interval.start, interval.end
            )));
        }
        if interval.start.date() != date || interval.end.date() != date {
            return Err(SchedulingError::validation(format!(
                "shift {} - {} does not fit within {}",
                interval.start.format("%H:%M"),
                interval.end.format("%Y-%m-%d %H:%M"),
                date
            )));
        }
        Ok(interval)
    }
}

fn stored_window(appointment: &Appointment) -> SchedulingResult<TimeWindow> {
    appointment.time_window().ok_or_else(|| {
        SchedulingError::validation(format!(
            "appointment {} has no time_slot or start/end pair",
            appointment.id
        ))
    })
}

fn label_start(label: &str) -> SchedulingResult<NaiveTime> {
    parse_time_label(label).ok_or_else(|| {
        SchedulingError::validation(format!("time_slot {:?} is not in h:mm AM/PM form", label))
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(value: Option<&str>) -> SchedulingResult<NaiveDate> {
    let value = non_blank(value).ok_or_else(|| SchedulingError::validation("date is required"))?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        SchedulingError::validation(format!("date {:?} is not in YYYY-MM-DD form", value))
    })
}

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Full timestamps must fall on `date`; bare clock times are placed on it.
/// Sub-second precision is dropped so the stored value matches what was checked.
fn parse_timestamp(value: &str, date: NaiveDate, field: &str) -> SchedulingResult<NaiveDateTime> {
    let parsed = TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|ts| ts.naive_local())
        });

    match parsed {
        Some(timestamp) if timestamp.date() != date => Err(SchedulingError::validation(format!(
            "{} {} is not on {}",
            field, value, date
        ))),
        Some(timestamp) => Ok(timestamp.trunc_subsecs(0)),
        None => parse_clock_time(value)
            .map(|time: NaiveTime| date.and_time(time))
            .ok_or_else(|| {
                SchedulingError::validation(format!("{} {:?} is not a valid time", field, value))
            }),
    }
}
