// Dispatcher - fans events out to the adapters that watch them

use crate::application::adapter::ToolAdapter;
use crate::domain::{Event, Outcome};
use crate::port::EventListener;
use std::sync::Arc;
use tracing::debug;

/// Per-event tally
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub adapters: usize,
    pub emitted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Routes one event to every interested adapter, concurrently
pub struct Dispatcher {
    adapters: Vec<Arc<ToolAdapter>>,
    listener: Arc<dyn EventListener>,
}

impl Dispatcher {
    pub fn new(adapters: Vec<Arc<ToolAdapter>>, listener: Arc<dyn EventListener>) -> Self {
        Self { adapters, listener }
    }

    pub fn adapters(&self) -> &[Arc<ToolAdapter>] {
        &self.adapters
    }

    /// True if at least one adapter would look at this event
    pub fn is_watched(&self, event: &Event) -> bool {
        self.adapters.iter().any(|a| a.watches(event.event_type))
    }

    /// Process `event` on every watching adapter.
    ///
    /// Emitted events go to the listener as they come in and are also
    /// returned, so the caller can feed them back onto the bus.
    pub async fn dispatch(&self, event: &Event) -> (Vec<Event>, DispatchSummary) {
        let interested: Vec<_> = self
            .adapters
            .iter()
            .filter(|a| a.watches(event.event_type))
            .collect();

        let mut summary = DispatchSummary {
            adapters: interested.len(),
            ..DispatchSummary::default()
        };

        if interested.is_empty() {
            debug!(event_type = %event.event_type, "No adapter watches this event type");
            return (Vec::new(), summary);
        }

        let outcomes =
            futures::future::join_all(interested.iter().map(|a| a.process(event))).await;

        let mut emitted = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Emitted(events) => {
                    summary.emitted += events.len();
                    for produced in &events {
                        self.listener.notify(produced);
                    }
                    emitted.extend(events);
                }
                Outcome::Skipped(_) => summary.skipped += 1,
                Outcome::Failed(_) => summary.failed += 1,
            }
        }

        (emitted, summary)
    }
}
