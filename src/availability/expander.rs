//! Slot expansion — turns a weekly template plus exceptions into concrete
//! dated slots for an inclusive date range.
//!
//! Per date: the weekday's schedule applies unless an exception exists for
//! that date (`unavailable` blocks the day, `modified` swaps in its own slot
//! list). Only `is_available` slots survive. Within a date slots are sorted
//! by start time; overlapping slots of the same session type are merged,
//! touching ones are kept apart.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use super::validation::{parse_timezone, slot_bounds};
use crate::calendar::TimeInterval;
use crate::error::SchedulingError;
use crate::models::{AvailableSlot, DayOfWeek, ExceptionType, SessionType, SlotDefinition, WeeklyTemplate};

const TIME_FORMAT: &str = "%H:%M";

/// A resolved slot before formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: NaiveTime,
    end: NaiveTime,
    session_type: SessionType,
}

/// Expand `[start, end]` (inclusive, ascending) into available slots.
pub fn expand_slots(
    template: &WeeklyTemplate,
    start: NaiveDate,
    end: NaiveDate,
    max_days: u32,
) -> Result<Vec<AvailableSlot>, SchedulingError> {
    if start > end {
        return Err(SchedulingError::validation(format!(
            "range start {start} is after end {end}"
        )));
    }
    let days = (end - start).num_days() + 1;
    if days > i64::from(max_days) {
        return Err(SchedulingError::validation(format!(
            "range of {days} days exceeds the {max_days}-day limit"
        )));
    }

    let tz = parse_timezone(&template.preferences.timezone)?;
    let mut slots = Vec::new();
    for date in start.iter_days().take(days as usize) {
        let source = slots_for_date(template, date);
        for window in resolve_windows(source)? {
            // Slots swallowed by a DST gap cover no real time that day.
            if local_instant(&tz, date, window.start) >= local_instant(&tz, date, window.end) {
                tracing::debug!(%date, start = %window.start, end = %window.end, "Dropping slot inside DST gap");
                continue;
            }
            slots.push(AvailableSlot {
                date,
                start_time: window.start.format(TIME_FORMAT).to_string(),
                end_time: window.end.format(TIME_FORMAT).to_string(),
                session_type: window.session_type,
            });
        }
    }
    Ok(slots)
}

/// The slot list that governs `date`, after exception precedence.
fn slots_for_date(template: &WeeklyTemplate, date: NaiveDate) -> &[SlotDefinition] {
    match template.exception_on(date) {
        Some(exception) => match exception.exception_type {
            ExceptionType::Unavailable => &[],
            ExceptionType::Modified => exception.slots.as_slice(),
        },
        None => template
            .day_schedule(DayOfWeek::from(date.weekday()))
            .map(|day| day.slots.as_slice())
            .unwrap_or(&[]),
    }
}

/// Keep available slots, merge overlaps per session type, sort by time.
fn resolve_windows(source: &[SlotDefinition]) -> Result<Vec<Window>, SchedulingError> {
    let mut merged: Vec<Window> = Vec::new();

    for session_type in [SessionType::Online, SessionType::InPerson, SessionType::Both] {
        let mut windows = Vec::new();
        for slot in source
            .iter()
            .filter(|s| s.is_available && s.session_type == session_type)
        {
            let (start, end) = slot_bounds(slot)?;
            windows.push(Window {
                start,
                end,
                session_type,
            });
        }
        windows.sort_by_key(|w| (w.start, w.end));

        let mut current: Option<Window> = None;
        for window in windows {
            if let Some(open) = current.as_mut() {
                if window.start < open.end {
                    open.end = open.end.max(window.end);
                    continue;
                }
            }
            if let Some(done) = current.replace(window) {
                merged.push(done);
            }
        }
        merged.extend(current);
    }

    merged.sort_by_key(|w| (w.start, w.end));
    Ok(merged)
}

/// Resolve a therapist-local wall-clock time to an instant. Ambiguous
/// times (DST fall-back) take the earlier instant; times inside a DST gap
/// move forward by the gap.
pub fn local_instant(tz: &Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

/// The instant range a slot covers in the therapist's timezone, or `None`
/// when the wall-clock range does not exist that day (DST gap).
pub fn slot_interval(tz: &Tz, slot: &AvailableSlot) -> Result<Option<TimeInterval>, SchedulingError> {
    let start = NaiveTime::parse_from_str(&slot.start_time, TIME_FORMAT)
        .map_err(|e| SchedulingError::validation(format!("slot start: {e}")))?;
    let end = NaiveTime::parse_from_str(&slot.end_time, TIME_FORMAT)
        .map_err(|e| SchedulingError::validation(format!("slot end: {e}")))?;
    let start = local_instant(tz, slot.date, start);
    let end = local_instant(tz, slot.date, end);
    if start >= end {
        return Ok(None);
    }
    TimeInterval::new(start, end).map(Some)
}

fn ceil_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    let floored = floor_to_minute(instant);
    if floored == instant {
        instant
    } else {
        floored + Duration::minutes(1)
    }
}

fn floor_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_nanosecond(0)
        .and_then(|dt| dt.with_second(0))
        .unwrap_or(instant)
}

/// Remove booked time from slots. A partially booked slot is split into its
/// free remainders, rounded inward to whole minutes; fully booked slots
/// disappear.
pub fn subtract_booked(
    slots: Vec<AvailableSlot>,
    tz: &Tz,
    busy: &[TimeInterval],
) -> Result<Vec<AvailableSlot>, SchedulingError> {
    if busy.is_empty() {
        return Ok(slots);
    }

    let mut free = Vec::with_capacity(slots.len());
    for slot in slots {
        let Some(interval) = slot_interval(tz, &slot)? else {
            tracing::debug!(date = %slot.date, start = %slot.start_time, "Skipping slot with no real time");
            continue;
        };
        if !busy.iter().any(|b| b.overlaps(&interval)) {
            free.push(slot);
            continue;
        }
        for piece in interval.subtract(busy) {
            let start = ceil_to_minute(piece.start);
            let end = floor_to_minute(piece.end);
            if start >= end {
                continue;
            }
            free.push(AvailableSlot {
                date: slot.date,
                start_time: start.with_timezone(tz).format(TIME_FORMAT).to_string(),
                end_time: end.with_timezone(tz).format(TIME_FORMAT).to_string(),
                session_type: slot.session_type,
            });
        }
    }
    Ok(free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvailabilityException, DaySchedule, Preferences};

    fn slot(start: &str, end: &str, session_type: SessionType) -> SlotDefinition {
        SlotDefinition {
            start_time: start.into(),
            end_time: end.into(),
            is_available: true,
            session_type,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn template(days: Vec<DaySchedule>, exceptions: Vec<AvailabilityException>) -> WeeklyTemplate {
        WeeklyTemplate {
            therapist_id: "t-1".into(),
            weekly_schedule: days,
            preferences: Preferences::default(),
            exceptions,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn mondays_nine_to_five() -> Vec<DaySchedule> {
        vec![DaySchedule {
            day: DayOfWeek::Monday,
            slots: vec![slot("09:00", "17:00", SessionType::Online)],
        }]
    }

    fn times(slots: &[AvailableSlot]) -> Vec<(NaiveDate, &str, &str)> {
        slots
            .iter()
            .map(|s| (s.date, s.start_time.as_str(), s.end_time.as_str()))
            .collect()
    }

    #[test]
    fn single_day_range_is_inclusive() {
        // 2024-01-01 is a Monday.
        let t = template(mondays_nine_to_five(), vec![]);
        let slots = expand_slots(&t, date(2024, 1, 1), date(2024, 1, 1), 366).unwrap();
        assert_eq!(times(&slots), vec![(date(2024, 1, 1), "09:00", "17:00")]);
    }

    #[test]
    fn unavailable_exception_blocks_only_its_date() {
        let t = template(
            mondays_nine_to_five(),
            vec![AvailabilityException {
                date: date(2024, 1, 8),
                exception_type: ExceptionType::Unavailable,
                slots: vec![],
                reason: None,
            }],
        );
        let slots = expand_slots(&t, date(2024, 1, 1), date(2024, 1, 21), 366).unwrap();
        assert_eq!(
            times(&slots),
            vec![
                (date(2024, 1, 1), "09:00", "17:00"),
                (date(2024, 1, 15), "09:00", "17:00"),
            ]
        );
    }

    #[test]
    fn modified_exception_replaces_not_merges() {
        let t = template(
            mondays_nine_to_five(),
            vec![AvailabilityException {
                date: date(2024, 1, 8),
                exception_type: ExceptionType::Modified,
                slots: vec![slot("13:00", "14:00", SessionType::InPerson)],
                reason: None,
            }],
        );
        let slots = expand_slots(&t, date(2024, 1, 8), date(2024, 1, 8), 366).unwrap();
        assert_eq!(times(&slots), vec![(date(2024, 1, 8), "13:00", "14:00")]);
        assert_eq!(slots[0].session_type, SessionType::InPerson);
    }

    #[test]
    fn modified_exception_applies_on_days_without_template() {
        // 2024-01-06 is a Saturday with no weekly schedule.
        let t = template(
            mondays_nine_to_five(),
            vec![AvailabilityException {
                date: date(2024, 1, 6),
                exception_type: ExceptionType::Modified,
                slots: vec![slot("10:00", "12:00", SessionType::Online)],
                reason: None,
            }],
        );
        let slots = expand_slots(&t, date(2024, 1, 6), date(2024, 1, 6), 366).unwrap();
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn disabled_slots_never_appear() {
        let mut days = mondays_nine_to_five();
        days[0].slots.push(SlotDefinition {
            start_time: "18:00".into(),
            end_time: "19:00".into(),
            is_available: false,
            session_type: SessionType::Online,
        });
        let t = template(days, vec![]);
        let slots = expand_slots(&t, date(2024, 1, 1), date(2024, 1, 7), 366).unwrap();
        assert!(slots.iter().all(|s| s.start_time != "18:00"));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn days_without_schedule_contribute_nothing() {
        let t = template(mondays_nine_to_five(), vec![]);
        let slots = expand_slots(&t, date(2024, 1, 2), date(2024, 1, 7), 366).unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn slots_sorted_and_session_type_preserved() {
        let days = vec![DaySchedule {
            day: DayOfWeek::Monday,
            slots: vec![
                slot("14:00", "15:00", SessionType::InPerson),
                slot("09:00", "10:00", SessionType::Online),
                slot("10:00", "11:00", SessionType::Online),
            ],
        }];
        let t = template(days, vec![]);
        let slots = expand_slots(&t, date(2024, 1, 1), date(2024, 1, 1), 366).unwrap();
        let d = date(2024, 1, 1);
        assert_eq!(
            times(&slots),
            vec![(d, "09:00", "10:00"), (d, "10:00", "11:00"), (d, "14:00", "15:00")]
        );
        assert_eq!(slots[2].session_type, SessionType::InPerson);
    }

    #[test]
    fn overlapping_same_type_slots_merge() {
        let days = vec![DaySchedule {
            day: DayOfWeek::Monday,
            slots: vec![
                slot("09:00", "12:00", SessionType::Online),
                slot("11:00", "13:00", SessionType::Online),
                slot("09:00", "12:00", SessionType::Online),
                slot("10:00", "11:00", SessionType::Both),
            ],
        }];
        let t = template(days, vec![]);
        let slots = expand_slots(&t, date(2024, 1, 1), date(2024, 1, 1), 366).unwrap();
        let d = date(2024, 1, 1);
        assert_eq!(times(&slots), vec![(d, "09:00", "13:00"), (d, "10:00", "11:00")]);
    }

    #[test]
    fn last_duplicate_day_entry_wins() {
        let days = vec![
            DaySchedule {
                day: DayOfWeek::Monday,
                slots: vec![slot("09:00", "10:00", SessionType::Online)],
            },
            DaySchedule {
                day: DayOfWeek::Monday,
                slots: vec![slot("15:00", "16:00", SessionType::Online)],
            },
        ];
        let t = template(days, vec![]);
        let slots = expand_slots(&t, date(2024, 1, 1), date(2024, 1, 1), 366).unwrap();
        assert_eq!(times(&slots), vec![(date(2024, 1, 1), "15:00", "16:00")]);
    }

    #[test]
    fn inverted_or_oversized_range_rejected() {
        let t = template(mondays_nine_to_five(), vec![]);
        assert!(expand_slots(&t, date(2024, 1, 2), date(2024, 1, 1), 366).is_err());
        assert!(expand_slots(&t, date(2024, 1, 1), date(2024, 1, 31), 7).is_err());
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn booked_time_is_carved_out() {
        let t = template(mondays_nine_to_five(), vec![]);
        let slots = expand_slots(&t, date(2024, 1, 1), date(2024, 1, 1), 366).unwrap();
        let busy = [TimeInterval::new(utc(2024, 1, 1, 10, 0), utc(2024, 1, 1, 11, 0)).unwrap()];
        let free = subtract_booked(slots, &Tz::UTC, &busy).unwrap();
        let d = date(2024, 1, 1);
        assert_eq!(times(&free), vec![(d, "09:00", "10:00"), (d, "11:00", "17:00")]);
    }

    #[test]
    fn booked_time_respects_therapist_timezone() {
        // Berlin is UTC+1 in January: 09:00-17:00 local is 08:00-16:00 UTC.
        let t = template(mondays_nine_to_five(), vec![]);
        let slots = expand_slots(&t, date(2024, 1, 1), date(2024, 1, 1), 366).unwrap();
        let busy = [TimeInterval::new(utc(2024, 1, 1, 8, 0), utc(2024, 1, 1, 9, 0)).unwrap()];
        let free = subtract_booked(slots, &chrono_tz::Europe::Berlin, &busy).unwrap();
        assert_eq!(times(&free), vec![(date(2024, 1, 1), "10:00", "17:00")]);
    }

    #[test]
    fn free_pieces_round_inward_to_minutes() {
        let t = template(mondays_nine_to_five(), vec![]);
        let slots = expand_slots(&t, date(2024, 1, 1), date(2024, 1, 1), 366).unwrap();
        let busy = [TimeInterval::new(
            utc(2024, 1, 1, 9, 0),
            utc(2024, 1, 1, 12, 0) + Duration::seconds(30),
        )
        .unwrap()];
        let free = subtract_booked(slots, &Tz::UTC, &busy).unwrap();
        assert_eq!(times(&free), vec![(date(2024, 1, 1), "12:01", "17:00")]);
    }

    #[test]
    fn touching_booking_leaves_slot_intact() {
        let t = template(mondays_nine_to_five(), vec![]);
        let slots = expand_slots(&t, date(2024, 1, 1), date(2024, 1, 1), 366).unwrap();
        let busy = [TimeInterval::new(utc(2024, 1, 1, 17, 0), utc(2024, 1, 1, 18, 0)).unwrap()];
        let free = subtract_booked(slots.clone(), &Tz::UTC, &busy).unwrap();
        assert_eq!(free, slots);
    }

    #[test]
    fn dst_gap_resolves_forward() {
        // 2024-03-31 02:30 does not exist in Berlin.
        let instant = local_instant(
            &chrono_tz::Europe::Berlin,
            date(2024, 3, 31),
            NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
        );
        assert_eq!(instant, utc(2024, 3, 31, 1, 30));
    }

    fn berlin_sundays(slots: Vec<SlotDefinition>) -> WeeklyTemplate {
        let mut t = template(
            vec![DaySchedule {
                day: DayOfWeek::Sunday,
                slots,
            }],
            vec![],
        );
        t.preferences.timezone = "Europe/Berlin".into();
        t
    }

    #[test]
    fn slot_inside_dst_gap_is_not_offered() {
        let t = berlin_sundays(vec![
            slot("02:00", "03:00", SessionType::Online),
            slot("09:00", "12:00", SessionType::Online),
        ]);
        let slots = expand_slots(&t, date(2024, 3, 31), date(2024, 3, 31), 366).unwrap();
        assert_eq!(times(&slots), vec![(date(2024, 3, 31), "09:00", "12:00")]);

        // The following Sunday has no gap.
        let slots = expand_slots(&t, date(2024, 4, 7), date(2024, 4, 7), 366).unwrap();
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn gap_slot_is_skipped_when_subtracting_bookings() {
        let d = date(2024, 3, 31);
        let slots = vec![
            AvailableSlot {
                date: d,
                start_time: "02:00".into(),
                end_time: "03:00".into(),
                session_type: SessionType::Online,
            },
            AvailableSlot {
                date: d,
                start_time: "09:00".into(),
                end_time: "12:00".into(),
                session_type: SessionType::Online,
            },
        ];
        // 10:00-11:00 CEST.
        let busy = [TimeInterval::new(utc(2024, 3, 31, 8, 0), utc(2024, 3, 31, 9, 0)).unwrap()];
        let free = subtract_booked(slots, &chrono_tz::Europe::Berlin, &busy).unwrap();
        assert_eq!(times(&free), vec![(d, "09:00", "10:00"), (d, "11:00", "12:00")]);
    }
}
