//! Write-time shape checks for weekly templates, exceptions and preferences.

use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::SchedulingError;
use crate::models::{DaySchedule, Preferences, SlotDefinition};

pub const SESSION_DURATION_MINUTES: RangeInclusive<u32> = 30..=120;
pub const BREAK_DURATION_MINUTES: RangeInclusive<u32> = 5..=30;
pub const MAX_DAILY_HOURS: RangeInclusive<u32> = 1..=12;

/// `HH:MM`, 24-hour clock.
static TIME_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[01]\d|2[0-3]):[0-5]\d$").unwrap());

pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, SchedulingError> {
    if !TIME_OF_DAY.is_match(value) {
        return Err(SchedulingError::validation(format!(
            "time '{value}' is not in HH:MM 24-hour format"
        )));
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| SchedulingError::validation(format!("time '{value}': {e}")))
}

/// Parse both ends of a slot and require `start < end`.
pub fn slot_bounds(slot: &SlotDefinition) -> Result<(NaiveTime, NaiveTime), SchedulingError> {
    let start = parse_time_of_day(&slot.start_time)?;
    let end = parse_time_of_day(&slot.end_time)?;
    if start >= end {
        return Err(SchedulingError::validation(format!(
            "slot {}-{} must start before it ends",
            slot.start_time, slot.end_time
        )));
    }
    Ok((start, end))
}

pub fn validate_slots(slots: &[SlotDefinition]) -> Result<(), SchedulingError> {
    slots.iter().try_for_each(|slot| slot_bounds(slot).map(|_| ()))
}

pub fn validate_weekly_schedule(days: &[DaySchedule]) -> Result<(), SchedulingError> {
    for day in days {
        validate_slots(&day.slots).map_err(|e| match e {
            SchedulingError::Validation(msg) => {
                SchedulingError::Validation(format!("{}: {msg}", day.day))
            }
            other => other,
        })?;
    }
    Ok(())
}

fn check_range(field: &str, value: u32, range: &RangeInclusive<u32>) -> Result<(), SchedulingError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(SchedulingError::validation(format!(
            "{field} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

pub fn validate_preferences(prefs: &Preferences) -> Result<(), SchedulingError> {
    check_range(
        "session_duration_minutes",
        prefs.session_duration_minutes,
        &SESSION_DURATION_MINUTES,
    )?;
    check_range(
        "break_duration_minutes",
        prefs.break_duration_minutes,
        &BREAK_DURATION_MINUTES,
    )?;
    check_range("max_daily_hours", prefs.max_daily_hours, &MAX_DAILY_HOURS)?;
    parse_timezone(&prefs.timezone)?;
    Ok(())
}

pub fn parse_timezone(name: &str) -> Result<Tz, SchedulingError> {
    Tz::from_str(name)
        .map_err(|_| SchedulingError::validation(format!("unknown timezone '{name}'")))
}

/// Parse an ISO `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, SchedulingError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| SchedulingError::validation(format!("'{value}' is not a YYYY-MM-DD date")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayOfWeek, SessionType};

    fn slot(start: &str, end: &str) -> SlotDefinition {
        SlotDefinition {
            start_time: start.into(),
            end_time: end.into(),
            is_available: true,
            session_type: SessionType::Online,
        }
    }

    #[test]
    fn accepts_well_formed_times() {
        assert_eq!(
            parse_time_of_day("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert!(parse_time_of_day("23:59").is_ok());
        assert!(parse_time_of_day("00:00").is_ok());
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["9:30", "24:00", "12:60", "12-30", "", "12:30:00"] {
            assert!(parse_time_of_day(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn slot_must_start_before_end() {
        assert!(slot_bounds(&slot("09:00", "17:00")).is_ok());
        assert!(slot_bounds(&slot("17:00", "09:00")).is_err());
        assert!(slot_bounds(&slot("10:00", "10:00")).is_err());
    }

    #[test]
    fn weekly_schedule_error_names_the_day() {
        let days = vec![DaySchedule {
            day: DayOfWeek::Tuesday,
            slots: vec![slot("11:00", "10:00")],
        }];
        let err = validate_weekly_schedule(&days).unwrap_err();
        assert!(err.to_string().contains("tuesday"));
    }

    #[test]
    fn preferences_ranges_enforced() {
        assert!(validate_preferences(&Preferences::default()).is_ok());

        let short_session = Preferences {
            session_duration_minutes: 20,
            ..Preferences::default()
        };
        assert!(validate_preferences(&short_session).is_err());

        let long_break = Preferences {
            break_duration_minutes: 45,
            ..Preferences::default()
        };
        assert!(validate_preferences(&long_break).is_err());

        let too_many_hours = Preferences {
            max_daily_hours: 13,
            ..Preferences::default()
        };
        assert!(validate_preferences(&too_many_hours).is_err());
    }

    #[test]
    fn timezone_must_be_iana() {
        assert!(parse_timezone("Europe/Berlin").is_ok());
        let prefs = Preferences {
            timezone: "Mars/Olympus".into(),
            ..Preferences::default()
        };
        assert!(validate_preferences(&prefs).is_err());
    }

    #[test]
    fn iso_dates() {
        assert_eq!(
            parse_iso_date("2024-01-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert!(parse_iso_date("01/01/2024").is_err());
        assert!(parse_iso_date("2024-02-30").is_err());
    }
}
