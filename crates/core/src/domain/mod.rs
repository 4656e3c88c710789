// Domain Layer - Events, targets and adapter outcomes

pub mod error;
pub mod event;
pub mod outcome;
pub mod target;

// Re-exports
pub use error::AdapterError;
pub use event::{Event, EventType, EXTERNAL_SOURCE};
pub use outcome::{Outcome, SkipReason};
