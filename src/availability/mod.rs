//! Therapist availability: weekly templates, date exceptions, slot
//! expansion and the expansion cache.

mod cache;
mod expander;
mod store;
mod validation;

pub use cache::*;
pub use expander::*;
pub use store::*;
pub use validation::*;
