//! Mapping header-keyed records onto locations and raw flow rows.

use flowmap_flow_models::{CountValue, Location, RawFlowRow, TimeValue};
use serde_json::Value;

/// A cell as text. Numbers and booleans are stringified; missing and null
/// cells are `None`.
fn text_field(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn coordinate(record: &Value, key: &str) -> Option<f64> {
    let value = match record.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Maps a record with `id`, `name`, `lat` and `lon` columns to a location.
///
/// The name falls back to the id. Records without an id or with a
/// non-numeric coordinate are rejected with a warning.
#[must_use]
pub fn location_from_record(record: &Value) -> Option<Location> {
    let Some(id) = text_field(record, "id").filter(|id| !id.is_empty()) else {
        log::warn!("Skipping location without id: {record}");
        return None;
    };
    let (Some(lat), Some(lon)) = (coordinate(record, "lat"), coordinate(record, "lon")) else {
        log::warn!("Skipping location {id:?} with invalid coordinates");
        return None;
    };
    let name = text_field(record, "name")
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| id.clone());

    Some(Location { id, lon, lat, name })
}

/// Every usable location in `records`, in order.
#[must_use]
pub fn locations_from_records(records: &[Value]) -> Vec<Location> {
    let locations: Vec<Location> = records.iter().filter_map(location_from_record).collect();
    let dropped = records.len() - locations.len();
    if dropped > 0 {
        log::warn!("Dropped {dropped} of {} location rows", records.len());
    }
    locations
}

/// Maps a record with `origin`, `dest`, `count` and optional `time`
/// columns to a raw flow row. No validation happens here; aggregation
/// decides what to keep.
#[must_use]
pub fn flow_row_from_record(record: &Value) -> RawFlowRow {
    let count = match record.get("count") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64().map(CountValue::Number),
        Some(Value::String(s)) => Some(CountValue::Text(s.clone())),
        Some(other) => Some(CountValue::Text(other.to_string())),
    };

    RawFlowRow {
        origin: text_field(record, "origin"),
        dest: text_field(record, "dest"),
        count,
        time: text_field(record, "time").map(TimeValue::Text),
    }
}
