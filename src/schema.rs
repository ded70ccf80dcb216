//! Shape checks on raw JSON, run before typed deserialization so that every
//! wrong type, missing field and bad id is reported in one pass.

use serde_json::{Map, Value};

use crate::domain::ThingId;

pub fn thing_violations(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    thing(value, "", &mut out);
    out
}

pub fn tracker_violations(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let Some(obj) = object(value, "", &mut out) else {
        return out;
    };
    match obj.get("things") {
        None => {}
        Some(Value::Array(things)) => {
            for (i, item) in things.iter().enumerate() {
                thing(item, &format!("things[{i}]"), &mut out);
            }
        }
        Some(other) => out.push(mismatch("things", "an array", other)),
    }
    match obj.get("thingsCount") {
        None => {}
        Some(count) if count.is_u64() => {}
        Some(other) => out.push(mismatch("thingsCount", "a non-negative integer", other)),
    }
    string(obj, "", "updated", false, &mut out);
    out
}

fn thing(value: &Value, at: &str, out: &mut Vec<String>) {
    let Some(obj) = object(value, at, out) else {
        return;
    };
    string(obj, at, "id", true, out);
    if let Some(Value::String(id)) = obj.get("id") {
        if id.parse::<ThingId>().is_err() {
            out.push(format!("{}: invalid thing id {id:?}", field(at, "id")));
        }
    }
    string(obj, at, "url", true, out);
    string(obj, at, "description", false, out);
    string(obj, at, "updated", false, out);
    strings(obj, at, "licenses", out);
    strings(obj, at, "thumbnailUrls", out);
    objects(obj, at, "billOfMaterials", out, |entry, at, out| {
        string(entry, at, "url", true, out);
        string(entry, at, "mimetype", false, out);
        string(entry, at, "thumbnailUrl", false, out);
    });
    objects(obj, at, "instructions", out, |step, at, out| {
        match step.get("step") {
            Some(n) if n.as_u64().is_some_and(|n| (1..=u64::from(u32::MAX)).contains(&n)) => {}
            None | Some(Value::Null) => out.push(format!("{}: is required", field(at, "step"))),
            Some(other) => out.push(mismatch(&field(at, "step"), "a positive integer", other)),
        }
        string(step, at, "text", true, out);
        strings(step, at, "images", out);
    });
    objects(obj, at, "relationships", out, |rel, at, out| {
        string(rel, at, "type", true, out);
        string(rel, at, "url", true, out);
        string(rel, at, "title", false, out);
    });
}

fn field(at: &str, name: &str) -> String {
    if at.is_empty() {
        name.to_string()
    } else {
        format!("{at}.{name}")
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(at: &str, expected: &str, found: &Value) -> String {
    format!("{at}: expected {expected}, found {}", kind(found))
}

fn object<'a>(value: &'a Value, at: &str, out: &mut Vec<String>) -> Option<&'a Map<String, Value>> {
    match value {
        Value::Object(obj) => Some(obj),
        other => {
            let at = if at.is_empty() { "document" } else { at };
            out.push(mismatch(at, "an object", other));
            None
        }
    }
}

fn string(obj: &Map<String, Value>, at: &str, name: &str, required: bool, out: &mut Vec<String>) {
    match obj.get(name) {
        Some(Value::String(_)) => {}
        None | Some(Value::Null) if required => {
            out.push(format!("{}: is required", field(at, name)));
        }
        None | Some(Value::Null) => {}
        Some(other) => out.push(mismatch(&field(at, name), "a string", other)),
    }
}

fn strings(obj: &Map<String, Value>, at: &str, name: &str, out: &mut Vec<String>) {
    match obj.get(name) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    out.push(mismatch(&format!("{}[{i}]", field(at, name)), "a string", item));
                }
            }
        }
        Some(other) => out.push(mismatch(&field(at, name), "an array", other)),
    }
}

fn objects<F>(obj: &Map<String, Value>, at: &str, name: &str, out: &mut Vec<String>, check: F)
where
    F: Fn(&Map<String, Value>, &str, &mut Vec<String>),
{
    match obj.get(name) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                let at = format!("{}[{i}]", field(at, name));
                if let Some(entry) = object(item, &at, out) {
                    check(entry, &at, out);
                }
            }
        }
        Some(other) => out.push(mismatch(&field(at, name), "an array", other)),
    }
}
