//! Notification Gate Module
//!
//! Remembers which vehicles were already alerted. The set only grows: a
//! vehicle that leaves the radius and comes back is not alerted again until
//! the process restarts.

use std::collections::HashSet;

use tracing::debug;

#[derive(Debug, Default)]
pub struct NotificationGate {
    notified: HashSet<String>,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `id` has not been recorded yet
    pub fn should_notify(&self, id: &str) -> bool {
        !self.notified.contains(id)
    }

    /// Record `id` as alerted for the rest of the process lifetime
    pub fn mark_notified(&mut self, id: &str) {
        if self.notified.insert(id.to_string()) {
            debug!(vehicle = %id, total = self.notified.len(), "Vehicle marked as notified");
        }
    }

    pub fn len(&self) -> usize {
        self.notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notified.is_empty()
    }
}
