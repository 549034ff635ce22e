use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;

use crate::directory::StaffDirectory;
use crate::schedule::slot_utils::format_time_label;
use crate::schedule::time_window::TimeWindowResolver;
use crate::schedule::types::{Appointment, Conflict};

/// Formats a staff member with their email, e.g. "Staff1 <staff1@foodtruck.com>"
pub fn format_staff_name(directory: &StaffDirectory, email: &str) -> String {
    let name = directory.display_name(email);
    if name == email {
        email.to_string()
    } else {
        format!("{} <{}>", name, email)
    }
}

/// "2:30 PM - 4:30 PM", or the raw fields if the record cannot be resolved
pub fn format_shift_time(resolver: &TimeWindowResolver, appointment: &Appointment) -> String {
    match resolver.resolve_appointment(appointment) {
        Ok(interval) => format!(
            "{} - {}",
            format_time_label(interval.start.time()),
            format_time_label(interval.end.time())
        ),
        Err(_) => appointment
            .time_slot
            .clone()
            .unwrap_or_else(|| "[no time]".to_string()),
    }
}

/// One line per conflicting appointment, for error messages and UI hints
pub fn describe_conflicts(conflicts: &[Conflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|c| {
            format!(
                "Already booked {} on {} from {} to {} ({})",
                c.appointment_id,
                c.date.format("%a %b %-d"),
                format_time_label(c.start_time.time()),
                format_time_label(c.end_time.time()),
                c.status
            )
        })
        .collect()
}

/// Renders appointments grouped by date
pub fn render_roster(
    appointments: &[Appointment],
    directory: &StaffDirectory,
    resolver: &TimeWindowResolver,
) -> String {
    let mut by_date: BTreeMap<NaiveDate, Vec<&Appointment>> = BTreeMap::new();
    for appt in appointments {
        by_date.entry(appt.date).or_default().push(appt);
    }

    let mut out = String::new();
    if by_date.is_empty() {
        out.push_str("No appointments scheduled\n");
        return out;
    }

    for (date, day) in by_date {
        out.push_str(&format!("** {} **\n", date.format("%A, %B %-d, %Y")));
        for appt in day {
            let manager = appt.manager_email.as_deref().unwrap_or("-");
            out.push_str(&format!(
                "  {} {} [{}] (manager: {})",
                format_shift_time(resolver, appt),
                format_staff_name(directory, &appt.staff_email),
                appt.status,
                manager
            ));
            if let Some(location) = &appt.location {
                out.push_str(&format!(" @ {}", location));
            }
            out.push('\n');
        }
    }
    out
}

pub fn print_roster(
    appointments: &[Appointment],
    directory: &StaffDirectory,
    resolver: &TimeWindowResolver,
) {
    println!("\n=== Staff Roster ===");
    println!("Total appointments: {}", appointments.len());
    print!("{}", render_roster(appointments, directory, resolver));
}

pub fn write_roster_to_file<P: AsRef<Path>>(
    path: P,
    appointments: &[Appointment],
    directory: &StaffDirectory,
    resolver: &TimeWindowResolver,
) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(render_roster(appointments, directory, resolver).as_bytes())?;
    Ok(())
}
