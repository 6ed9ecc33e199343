//! Compact URL query string for sharing a [`FlowMapState`].
//!
//! Keys, in emission order:
//!
//! | key   | value                                                    |
//! |-------|----------------------------------------------------------|
//! | `v`   | `lat,lon,zoom,bearing,pitch` at 6/6/2/0/0 decimals       |
//! | `a`   | animation enabled (`1`/`0`)                              |
//! | `as`  | adaptive scales enabled                                  |
//! | `b`   | base map enabled                                         |
//! | `bo`  | base map opacity                                         |
//! | `c`   | clustering enabled                                       |
//! | `ca`  | clustering auto                                          |
//! | `cz`  | manual cluster zoom, if set                              |
//! | `d`   | dark mode                                                |
//! | `fe`  | fade enabled                                             |
//! | `lt`  | location totals enabled                                  |
//! | `lfm` | location filter mode                                     |
//! | `t`   | selected time range as two `%Y%m%dT%H%M%S` times, if set |
//! | `col` | color scheme key, if set                                 |
//! | `f`   | fade amount                                              |
//! | `s`   | selected location ids as one CSV row, if set             |

use std::collections::HashMap;

use chrono::NaiveDateTime;
use flowmap_flow_models::{LocationFilterMode, Timestamp};
use flowmap_layers::colors::ColorScheme;
use flowmap_state_models::{FlowMapState, ViewState};
use url::form_urlencoded;

use crate::reducer::{clamp_pitch, clamp_zoom};

const TIME_QUERY_FORMAT: &str = "%Y%m%dT%H%M%S";

/// `value` with `digits` decimals, never rendering negative zero.
fn to_fixed(value: f64, digits: usize) -> String {
    let s = format!("{value:.digits$}");
    match s.strip_prefix('-') {
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => rest.to_owned(),
        _ => s,
    }
}

const fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn format_time(t: &Timestamp) -> String {
    t.format(TIME_QUERY_FORMAT).to_string()
}

fn parse_time(s: &str) -> Option<Timestamp> {
    NaiveDateTime::parse_from_str(s.trim(), TIME_QUERY_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

/// One CSV row, quoted only where a field needs it.
fn csv_row(fields: &[String]) -> String {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    if writer.write_record(fields).is_err() {
        return fields.join(",");
    }
    let bytes = writer.into_inner().unwrap_or_default();
    String::from_utf8_lossy(&bytes)
        .trim_end_matches('\n')
        .to_owned()
}

/// First CSV row of `s`, `None` if there is none.
fn parse_csv_row(s: &str) -> Option<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(s.as_bytes());
    let record = reader.records().next()?.ok()?;
    Some(record.iter().map(str::to_owned).collect())
}

fn url_encode(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Serializes the shareable part of `state`.
#[must_use]
pub fn encode(state: &FlowMapState) -> String {
    let ViewState {
        latitude,
        longitude,
        zoom,
        bearing,
        pitch,
        ..
    } = state.viewport;
    let settings = &state.settings_state;
    let filter = &state.filter_state;

    let mut parts = vec![
        format!(
            "v={},{},{},{},{}",
            to_fixed(latitude, 6),
            to_fixed(longitude, 6),
            to_fixed(zoom, 2),
            to_fixed(bearing, 0),
            to_fixed(pitch, 0)
        ),
        format!("a={}", flag(settings.animation_enabled)),
        format!("as={}", flag(settings.adaptive_scales_enabled)),
        format!("b={}", flag(settings.base_map_enabled)),
        format!("bo={}", settings.base_map_opacity),
        format!("c={}", flag(settings.clustering_enabled)),
        format!("ca={}", flag(settings.clustering_auto)),
    ];
    if let Some(cz) = settings.manual_cluster_zoom {
        parts.push(format!("cz={cz}"));
    }
    parts.push(format!("d={}", flag(settings.dark_mode)));
    parts.push(format!("fe={}", flag(settings.fade_enabled)));
    parts.push(format!("lt={}", flag(settings.location_totals_enabled)));
    parts.push(format!("lfm={}", filter.location_filter_mode));
    if let Some((start, end)) = &filter.selected_time_range {
        parts.push(format!("t={},{}", format_time(start), format_time(end)));
    }
    if let Some(key) = &settings.color_scheme_key {
        parts.push(format!("col={}", url_encode(key)));
    }
    parts.push(format!("f={}", settings.fade_amount));
    if let Some(selected) = &filter.selected_locations {
        parts.push(format!("s={}", url_encode(&csv_row(selected))));
    }

    parts.join("&")
}

/// A finite number, `None` for anything else (including the empty string).
fn as_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn as_boolean(value: &str) -> Option<bool> {
    match value {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Patches `base` with every recognized, well-formed key in `query`.
///
/// A leading `?` is ignored. Keys that are absent, malformed, or repeated
/// leave the corresponding field of `base` as it was. A valid `v` also
/// turns off automatic viewport fitting.
#[must_use]
pub fn decode(query: &str, base: FlowMapState) -> FlowMapState {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut values: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        values
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    let param = |key: &str| match values.get(key).map(Vec::as_slice) {
        Some([value]) => Some(value.as_str()),
        _ => None,
    };

    let mut state = base;
    let settings = &mut state.settings_state;
    let filter = &mut state.filter_state;

    if let Some(row) = param("s").and_then(parse_csv_row).filter(|r| !r.is_empty()) {
        filter.selected_locations = Some(row);
    }

    if let Some(row) = param("v").and_then(parse_csv_row) {
        let nums: Vec<Option<f64>> = row.iter().map(|v| as_number(v)).collect();
        let num = |i: usize| nums.get(i).copied().flatten();
        if let (Some(latitude), Some(longitude), Some(zoom)) = (num(0), num(1), num(2)) {
            let viewport = &mut state.viewport;
            viewport.latitude = latitude;
            viewport.longitude = longitude;
            viewport.zoom = clamp_zoom(zoom);
            if let Some(bearing) = num(3) {
                viewport.bearing = bearing;
            }
            if let Some(pitch) = num(4) {
                viewport.pitch = clamp_pitch(pitch);
            }
            state.adjust_viewport_to_locations = false;
        }
    }

    let number = |key: &str| param(key).and_then(as_number);
    let boolean = |key: &str| param(key).and_then(as_boolean);

    if let Some(v) = number("bo") {
        settings.base_map_opacity = v;
    }
    if let Some(v) = number("cz") {
        settings.manual_cluster_zoom = Some(v);
    }
    if let Some(v) = number("f") {
        settings.fade_amount = v;
    }
    for (key, field) in [
        ("b", &mut settings.base_map_enabled),
        ("d", &mut settings.dark_mode),
        ("fe", &mut settings.fade_enabled),
        ("a", &mut settings.animation_enabled),
        ("as", &mut settings.adaptive_scales_enabled),
        ("c", &mut settings.clustering_enabled),
        ("ca", &mut settings.clustering_auto),
        ("lt", &mut settings.location_totals_enabled),
    ] {
        if let Some(v) = boolean(key) {
            *field = v;
        }
    }

    if let Some(mode) = param("lfm").and_then(|v| v.parse::<LocationFilterMode>().ok()) {
        filter.location_filter_mode = mode;
    }

    if let Some(t) = param("t") {
        let mut times = t.split(',').map(parse_time);
        if let (Some(Some(start)), Some(Some(end))) = (times.next(), times.next()) {
            filter.selected_time_range = Some((start, end));
        }
    }

    if let Some(key) = param("col").filter(|k| ColorScheme::is_known_key(k)) {
        settings.color_scheme_key = Some(key.to_owned());
    }

    state
}
