use std::fs;

use camino::Utf8Path;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{Thing, Tracker};
use crate::error::TrackerError;
use crate::schema;

/// Reads `path` as JSON. Access and syntax failures are kept apart so the
/// caller can report them separately from schema violations.
pub fn read_document(path: &Utf8Path) -> Result<Value, TrackerError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|_| TrackerError::InputRead(path.to_path_buf()))?;
    serde_json::from_str(&content).map_err(|err| TrackerError::InputSyntax {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Loads a thing, reporting every shape violation at once before any value
/// check runs.
pub fn load_thing(path: &Utf8Path) -> Result<Thing, TrackerError> {
    let value = read_document(path)?;
    check(path, schema::thing_violations(&value))?;
    let thing: Thing = typed(path, value)?;
    check(path, thing.validate())?;
    Ok(thing)
}

pub fn load_tracker(path: &Utf8Path) -> Result<Tracker, TrackerError> {
    let value = read_document(path)?;
    check(path, schema::tracker_violations(&value))?;
    let tracker: Tracker = typed(path, value)?;
    check(path, tracker.validate())?;
    Ok(tracker)
}

fn typed<T: DeserializeOwned>(path: &Utf8Path, value: Value) -> Result<T, TrackerError> {
    serde_json::from_value(value).map_err(|err| TrackerError::InputSchema {
        path: path.to_path_buf(),
        violations: vec![err.to_string()],
    })
}

fn check(path: &Utf8Path, violations: Vec<String>) -> Result<(), TrackerError> {
    if violations.is_empty() {
        return Ok(());
    }
    Err(TrackerError::InputSchema {
        path: path.to_path_buf(),
        violations,
    })
}
