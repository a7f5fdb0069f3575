//! Per-user calendars: events, recurrence, overlap detection and
//! external calendar links.

mod conflict;
mod events;
mod interval;
mod recurrence;
mod sync;

pub use conflict::*;
pub use events::{
    busy_intervals, create_event, get_event, list_events, update_event, MAX_REMINDER_LEAD_MINUTES,
};
pub use interval::*;
pub use recurrence::*;
pub use sync::*;
