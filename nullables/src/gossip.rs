//! Nullable gossip: record broadcasts without sending them.

use parking_lot::Mutex;
use weft_types::{Event, Gossip};

/// A gossip layer that records every broadcast event.
#[derive(Default)]
pub struct RecordingGossip {
    sent: Mutex<Vec<Event>>,
}

impl RecordingGossip {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events "broadcast" so far (for assertions).
    pub fn sent(&self) -> Vec<Event> {
        self.sent.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every recorded event, leaving the record empty.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Gossip for RecordingGossip {
    fn broadcast_event(&self, event: &Event) {
        self.sent.lock().push(event.clone());
    }
}
