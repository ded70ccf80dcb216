use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::{Thing, Tracker};

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Puts `thing` into the tracker, replacing the first entry with the same id
/// or appending it. The thing and the tracker share one `updated` stamp.
///
/// Returns `true` when an existing entry was replaced.
pub fn merge(tracker: &mut Tracker, mut thing: Thing, now: DateTime<Utc>) -> bool {
    let stamp = timestamp(now);
    thing.updated = Some(stamp.clone());

    let replaced = match tracker.things.iter().position(|t| t.id == thing.id) {
        Some(index) => {
            tracker.things[index] = thing;
            true
        }
        None => {
            tracker.things.push(thing);
            false
        }
    };
    tracker.things_count = tracker.things.len();
    tracker.updated = Some(stamp);
    replaced
}
