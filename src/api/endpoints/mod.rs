//! API endpoint handlers, one module per resource.

pub mod availability;
pub mod events;
pub mod health;
pub mod reminders;
pub mod sync;
