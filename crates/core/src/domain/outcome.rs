// Outcome of a single adapter call

use super::error::AdapterError;
use super::event::Event;

/// Why an adapter call ended without running or reporting anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Event was produced by this adapter
    OwnEvent,
    /// Adapter does not watch this event type
    Unwatched,
    /// Adapter latched into its error state earlier
    Disabled,
    /// Target (or an enclosing network) was already dispatched
    AlreadySeen,
    NetblockScanDisabled,
    NetblockTooLarge { prefix: u8, max_prefix: u8 },
    /// Tool exited cleanly without printing anything
    EmptyOutput,
    /// Tool printed something, but nothing worth emitting
    NothingFound,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::OwnEvent => write!(f, "event from myself"),
            SkipReason::Unwatched => write!(f, "event type not watched"),
            SkipReason::Disabled => write!(f, "adapter disabled"),
            SkipReason::AlreadySeen => write!(f, "already scanned"),
            SkipReason::NetblockScanDisabled => write!(f, "netblock scanning disabled"),
            SkipReason::NetblockTooLarge { prefix, max_prefix } => {
                write!(f, "netblock /{} larger than /{}", prefix, max_prefix)
            }
            SkipReason::EmptyOutput => write!(f, "empty output"),
            SkipReason::NothingFound => write!(f, "nothing found"),
        }
    }
}

/// Terminal outcome of `ToolAdapter::process`
#[derive(Debug)]
pub enum Outcome {
    Emitted(Vec<Event>),
    Skipped(SkipReason),
    Failed(AdapterError),
}

impl Outcome {
    pub fn is_emitted(&self) -> bool {
        matches!(self, Outcome::Emitted(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Outcome::Skipped(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AdapterError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Emitted events, empty for skips and failures
    pub fn events(&self) -> &[Event] {
        match self {
            Outcome::Emitted(events) => events,
            _ => &[],
        }
    }

    pub fn into_events(self) -> Vec<Event> {
        match self {
            Outcome::Emitted(events) => events,
            _ => Vec::new(),
        }
    }
}
