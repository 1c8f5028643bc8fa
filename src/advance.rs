//! Watermark advancement
//!
//! Runs once per issue after all of its events are computed. The new
//! watermark is the newest event time of that issue, never wall-clock time
//! and never the newest time found anywhere in the snapshot, so a change is
//! reported exactly once and a change newer than the watermark is never
//! skipped.

use crate::event::Event;
use crate::watermark::WatermarkStore;
use chrono::{DateTime, Utc};

/// Outcome of advancing one issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Watermark moved to this time
    Moved(DateTime<Utc>),
    /// First sighting with nothing to report; issue is now tracked from launch time
    Tracked,
    /// Nothing changed
    Unchanged,
}

/// Newest effective time among `events`
pub fn newest_event_time(events: &[Event]) -> Option<DateTime<Utc>> {
    events.iter().map(|e| e.timestamp).max()
}

/// Write the watermark for `key` from the events produced for it
pub fn advance_watermark(store: &mut WatermarkStore, key: &str, events: &[Event]) -> Advance {
    match newest_event_time(events) {
        Some(newest) => {
            store.set(key, newest);
            Advance::Moved(newest)
        }
        None if !store.state(key).is_seen() => {
            store.mark_seen(key);
            Advance::Tracked
        }
        None => Advance::Unchanged,
    }
}
