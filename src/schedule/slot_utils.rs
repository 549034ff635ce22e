use chrono::NaiveTime;

/// Bookable labels offered by the shift picker, hourly from opening to close
pub const STANDARD_TIME_SLOTS: [&str; 9] = [
    "9:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "1:00 PM", "2:00 PM", "3:00 PM", "4:00 PM",
    "5:00 PM",
];

/// Parses a label such as "2:30 PM" into a time of day.
/// "12:00 PM" is noon and "12:00 AM" is midnight.
pub fn parse_time_label(label: &str) -> Option<NaiveTime> {
    let trimmed = label.trim();

    // Meridiem is the last two characters, optionally separated by a space
    let (split, _) = trimmed.char_indices().rev().nth(1)?;
    let (clock, meridiem) = trimmed.split_at(split);
    let is_pm = match meridiem.to_ascii_uppercase().as_str() {
        "AM" => false,
        "PM" => true,
        _ => return None,
    };

    let (hours, minutes) = clock.trim_end().split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.chars().all(|c| c.is_ascii_digit()) || !minutes.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if !(1..=12).contains(&hours) || minutes >= 60 {
        return None;
    }

    let hour24 = match (hours, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    NaiveTime::from_hms_opt(hour24, minutes, 0)
}

/// Formats a time of day as a label, the inverse of `parse_time_label`
pub fn format_time_label(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Parses "HH:MM" or "HH:MM:SS" (24-hour clock)
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parses_afternoon_label() {
        assert_eq!(parse_time_label("2:30 PM"), Some(hm(14, 30)));
        assert_eq!(parse_time_label("02:30 pm"), Some(hm(14, 30)));
        assert_eq!(parse_time_label("2:30PM"), Some(hm(14, 30)));
    }

    #[test]
    fn twelve_o_clock_edges() {
        assert_eq!(parse_time_label("12:00 PM"), Some(hm(12, 0)));
        assert_eq!(parse_time_label("12:00 AM"), Some(hm(0, 0)));
        assert_eq!(parse_time_label("12:45 AM"), Some(hm(0, 45)));
    }

    #[test]
    fn rejects_malformed_labels() {
        let labels = [
            "", "PM", "14:30", "13:00 PM", "0:30 AM", "2:3 PM", "2:60 PM", "two PM", "2:30 XM",
        ];
        for label in labels {
            assert_eq!(parse_time_label(label), None, "label {:?}", label);
        }
    }

    #[test]
    fn multibyte_tails_are_rejected() {
        for label in ["9€", "2:30 P€", "2:30 €M", "€€", "12:00 ＰＭ"] {
            assert_eq!(parse_time_label(label), None, "label {:?}", label);
        }
    }

    #[test]
    fn standard_slots_round_trip() {
        for label in STANDARD_TIME_SLOTS {
            let time = parse_time_label(label).unwrap();
            assert_eq!(format_time_label(time), label);
        }
    }

    #[test]
    fn clock_times_accept_optional_seconds() {
        assert_eq!(parse_clock_time("09:15"), Some(hm(9, 15)));
        assert_eq!(parse_clock_time("09:15:00"), Some(hm(9, 15)));
        assert_eq!(parse_clock_time("9am"), None);
    }
}
