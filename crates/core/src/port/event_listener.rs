// Event Listener Port
// Fire-and-forget delivery of emitted events back to the host

use crate::domain::Event;

/// Receives every event an adapter emits
pub trait EventListener: Send + Sync {
    fn notify(&self, event: &Event);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every notified event
    #[derive(Default, Clone)]
    pub struct RecordingListener {
        events: Arc<Mutex<Vec<Event>>>,
    }
    impl RecordingListener {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
        pub fn len(&self) -> usize {
            self.events.lock().unwrap().len()
        }
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }
    impl EventListener for RecordingListener {
        fn notify(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}
