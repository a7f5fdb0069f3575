pub mod availability;
pub mod calendar_event;
pub mod enums;
pub mod reminder;
pub mod sync_config;

pub use availability::*;
pub use calendar_event::*;
pub use enums::*;
pub use reminder::*;
pub use sync_config::*;
