//! Recurrence expansion: concrete occurrences of an event inside a window.
//!
//! Occurrences keep the event's local wall-clock start in its own timezone,
//! so a weekly 09:00 session stays at 09:00 across DST changes.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;

use super::interval::TimeInterval;
use crate::availability::local_instant;
use crate::models::{CalendarEvent, EventOccurrence, Recurrence, RecurrenceType};

/// Upper bound on occurrences generated per event per query.
pub const MAX_OCCURRENCES: usize = 1000;

fn occurrence(event: &CalendarEvent, start: DateTime<Utc>, end: DateTime<Utc>) -> EventOccurrence {
    EventOccurrence {
        event_id: event.id.clone(),
        title: event.title.clone(),
        event_type: event.event_type,
        start,
        end,
    }
}

/// Every occurrence of `event` overlapping `window`, in start order.
pub fn occurrences(event: &CalendarEvent, window: &TimeInterval) -> Vec<EventOccurrence> {
    let base = TimeInterval {
        start: event.start,
        end: event.end,
    };
    let Some(rule) = &event.recurrence else {
        return if base.overlaps(window) {
            vec![occurrence(event, event.start, event.end)]
        } else {
            Vec::new()
        };
    };

    let tz = Tz::from_str(&event.timezone).unwrap_or(Tz::UTC);
    let local_start = event.start.with_timezone(&tz);
    let first = local_start.date_naive();
    let time = local_start.time();
    let duration = event.end - event.start;

    // Earliest date whose occurrence can still reach into the window.
    let from = (window.start - duration).with_timezone(&tz).date_naive() - Duration::days(1);
    let mut until = window.end.with_timezone(&tz).date_naive() + Duration::days(1);
    if let Some(end_date) = rule.end_date {
        until = until.min(end_date);
    }

    candidate_dates(rule, first, from, until)
        .into_iter()
        .filter(|date| !rule.exclusion_dates.contains(date))
        .filter_map(|date| {
            let start = local_instant(&tz, date, time);
            let end = start + duration;
            (start < window.end && end > window.start).then(|| occurrence(event, start, end))
        })
        .collect()
}

/// Dates the rule produces in `[max(first, from), until]`, bounded by
/// `MAX_OCCURRENCES`.
fn candidate_dates(rule: &Recurrence, first: NaiveDate, from: NaiveDate, until: NaiveDate) -> Vec<NaiveDate> {
    let interval = i64::from(rule.interval.max(1));
    let mut dates = Vec::new();

    match rule.recurrence_type {
        RecurrenceType::Daily => {
            let skip = if from > first { (from - first).num_days() / interval } else { 0 };
            let mut date = first + Duration::days(skip * interval);
            while date <= until && dates.len() < MAX_OCCURRENCES {
                dates.push(date);
                date = date + Duration::days(interval);
            }
        }
        RecurrenceType::Weekly => {
            let mut weekdays: Vec<i64> = rule
                .days_of_week
                .iter()
                .map(|d| i64::from(d.number()) - 1)
                .collect();
            if weekdays.is_empty() {
                weekdays.push(i64::from(first.weekday().num_days_from_monday()));
            }
            weekdays.sort_unstable();
            weekdays.dedup();

            let anchor = first - Duration::days(i64::from(first.weekday().num_days_from_monday()));
            let period = 7 * interval;
            let skip = if from > anchor { (from - anchor).num_days() / period } else { 0 };
            let mut week = anchor + Duration::days(skip * period);
            while week <= until && dates.len() < MAX_OCCURRENCES {
                for offset in &weekdays {
                    let date = week + Duration::days(*offset);
                    if date >= first && date <= until && dates.len() < MAX_OCCURRENCES {
                        dates.push(date);
                    }
                }
                week = week + Duration::days(period);
            }
        }
        RecurrenceType::Monthly => {
            let months_to_from = if from > first {
                (from.year() - first.year()) * 12 + from.month() as i32 - first.month() as i32
            } else {
                0
            };
            let step = rule.interval.max(1);
            let mut k = (months_to_from.max(0) as u32 / step).saturating_sub(1) * step;
            loop {
                let Some(date) = first.checked_add_months(Months::new(k)) else {
                    break;
                };
                if date > until || dates.len() >= MAX_OCCURRENCES {
                    break;
                }
                // Months without this day of month are skipped, not clamped.
                if date.day() == first.day() {
                    dates.push(date);
                }
                k += step;
            }
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayOfWeek, EventType, Visibility};
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn event(start: DateTime<Utc>, end: DateTime<Utc>, recurrence: Option<Recurrence>) -> CalendarEvent {
        CalendarEvent {
            id: "e-1".into(),
            user_id: "u-1".into(),
            event_type: EventType::Appointment,
            title: "Session".into(),
            description: None,
            start,
            end,
            timezone: "UTC".into(),
            recurrence,
            location: None,
            visibility: Visibility::Private,
            reminders: vec![],
            appointment_id: None,
            created_at: start,
            updated_at: start,
        }
    }

    fn rule(kind: RecurrenceType, interval: u32) -> Recurrence {
        Recurrence {
            recurrence_type: kind,
            interval,
            end_date: None,
            days_of_week: vec![],
            exclusion_dates: vec![],
        }
    }

    fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeInterval {
        TimeInterval::new(start, end).unwrap()
    }

    fn starts(found: &[EventOccurrence]) -> Vec<DateTime<Utc>> {
        found.iter().map(|o| o.start).collect()
    }

    #[test]
    fn single_event_inside_and_outside_window() {
        let e = event(utc(2024, 1, 1, 10), utc(2024, 1, 1, 11), None);
        assert_eq!(occurrences(&e, &window(utc(2024, 1, 1, 0), utc(2024, 1, 2, 0))).len(), 1);
        assert!(occurrences(&e, &window(utc(2024, 1, 1, 11), utc(2024, 1, 1, 12))).is_empty());
    }

    #[test]
    fn daily_every_other_day_with_exclusion() {
        let mut r = rule(RecurrenceType::Daily, 2);
        r.exclusion_dates = vec![NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()];
        let e = event(utc(2024, 1, 1, 10), utc(2024, 1, 1, 11), Some(r));
        let found = occurrences(&e, &window(utc(2024, 1, 1, 0), utc(2024, 1, 8, 0)));
        assert_eq!(
            starts(&found),
            vec![utc(2024, 1, 1, 10), utc(2024, 1, 3, 10), utc(2024, 1, 7, 10)]
        );
    }

    #[test]
    fn weekly_on_selected_days_until_end_date() {
        let mut r = rule(RecurrenceType::Weekly, 1);
        r.days_of_week = vec![DayOfWeek::Wednesday, DayOfWeek::Monday];
        r.end_date = Some(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        // 2024-01-01 is a Monday.
        let e = event(utc(2024, 1, 1, 9), utc(2024, 1, 1, 10), Some(r));
        let found = occurrences(&e, &window(utc(2024, 1, 1, 0), utc(2024, 2, 1, 0)));
        assert_eq!(
            starts(&found),
            vec![utc(2024, 1, 1, 9), utc(2024, 1, 3, 9), utc(2024, 1, 8, 9), utc(2024, 1, 10, 9)]
        );
    }

    #[test]
    fn weekly_skips_ahead_to_distant_window() {
        let e = event(
            utc(2020, 1, 6, 9),
            utc(2020, 1, 6, 10),
            Some(rule(RecurrenceType::Weekly, 1)),
        );
        // Far more than MAX_OCCURRENCES days later, still a Monday.
        let found = occurrences(&e, &window(utc(2024, 1, 1, 0), utc(2024, 1, 2, 0)));
        assert_eq!(starts(&found), vec![utc(2024, 1, 1, 9)]);
    }

    #[test]
    fn monthly_skips_short_months() {
        let e = event(
            utc(2024, 1, 31, 12),
            utc(2024, 1, 31, 13),
            Some(rule(RecurrenceType::Monthly, 1)),
        );
        let found = occurrences(&e, &window(utc(2024, 1, 1, 0), utc(2024, 6, 1, 0)));
        assert_eq!(
            starts(&found),
            vec![utc(2024, 1, 31, 12), utc(2024, 3, 31, 12), utc(2024, 5, 31, 12)]
        );
    }

    #[test]
    fn local_time_kept_across_dst() {
        // 2024-03-25 09:00 Berlin (UTC+1); DST starts 2024-03-31.
        let mut e = event(
            utc(2024, 3, 25, 8),
            utc(2024, 3, 25, 9),
            Some(rule(RecurrenceType::Weekly, 1)),
        );
        e.timezone = "Europe/Berlin".into();
        let found = occurrences(&e, &window(utc(2024, 4, 1, 0), utc(2024, 4, 2, 0)));
        // 09:00 Berlin in summer time is 07:00 UTC.
        assert_eq!(starts(&found), vec![utc(2024, 4, 1, 7)]);
    }
}
