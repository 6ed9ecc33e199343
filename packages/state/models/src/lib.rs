#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interaction state of a flow map session and the actions that change it.
//!
//! [`FlowMapState`] is a plain serializable value. It is created once per
//! session, replaced wholesale on dataset reload, and otherwise only
//! changed by reducing an [`Action`] over it.

use flowmap_flow_models::{Flow, LocationFilterMode, Timestamp};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

pub const MIN_ZOOM_LEVEL: f64 = 0.0;
pub const MAX_ZOOM_LEVEL: f64 = 20.0;
pub const MIN_PITCH: f64 = 0.0;
pub const MAX_PITCH: f64 = 60.0;

/// Camera and viewport size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub width: f64,
    pub height: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
    pub altitude: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub min_pitch: f64,
    pub max_pitch: f64,
}

impl ViewState {
    /// A view of the given size centered on `(latitude, longitude)` with
    /// the fixed zoom and pitch bounds, no bearing and no pitch.
    #[must_use]
    pub const fn new(width: f64, height: f64, latitude: f64, longitude: f64, zoom: f64) -> Self {
        Self {
            width,
            height,
            latitude,
            longitude,
            zoom,
            bearing: 0.0,
            pitch: 0.0,
            altitude: 1.5,
            min_zoom: MIN_ZOOM_LEVEL,
            max_zoom: MAX_ZOOM_LEVEL,
            min_pitch: MIN_PITCH,
            max_pitch: MAX_PITCH,
        }
    }
}

/// Which flows are shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// `None` means no selection; an empty list is never stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_locations: Option<Vec<String>>,
    /// Half-open `[start, end)` range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_time_range: Option<(Timestamp, Timestamp)>,
    #[serde(default)]
    pub location_filter_mode: LocationFilterMode,
}

/// Display toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsState {
    pub animation_enabled: bool,
    pub fade_enabled: bool,
    pub location_totals_enabled: bool,
    pub adaptive_scales_enabled: bool,
    pub clustering_enabled: bool,
    pub clustering_auto: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_cluster_zoom: Option<f64>,
    pub dark_mode: bool,
    /// `0..=100`
    pub fade_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scheme_key: Option<String>,
    pub base_map_enabled: bool,
    /// `0..=100`
    pub base_map_opacity: f64,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            animation_enabled: false,
            fade_enabled: true,
            location_totals_enabled: true,
            adaptive_scales_enabled: true,
            clustering_enabled: true,
            clustering_auto: true,
            manual_cluster_zoom: None,
            dark_mode: true,
            fade_amount: 50.0,
            color_scheme_key: None,
            base_map_enabled: true,
            base_map_opacity: 75.0,
        }
    }
}

/// What the pointer is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(tag = "type", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Highlight {
    Location {
        #[serde(rename = "locationId")]
        location_id: String,
    },
    Flow { flow: Flow },
}

/// Screen-space box a tooltip is anchored to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TooltipTarget {
    pub left: f64,
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tooltip {
    pub target: TooltipTarget,
    pub content: String,
}

/// Full interaction state of one flow map session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMapState {
    pub filter_state: FilterState,
    pub settings_state: SettingsState,
    pub viewport: ViewState,
    /// Refit the viewport when a new location set arrives.
    pub adjust_viewport_to_locations: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<Tooltip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Highlight>,
}

impl FlowMapState {
    /// Fresh state for `viewport` with default filter and settings.
    #[must_use]
    pub fn with_viewport(viewport: ViewState) -> Self {
        Self {
            filter_state: FilterState::default(),
            settings_state: SettingsState::default(),
            viewport,
            adjust_viewport_to_locations: true,
            tooltip: None,
            highlight: None,
        }
    }
}

/// Everything that can change a [`FlowMapState`].
///
/// Serialized with a `type` tag in `SCREAMING_SNAKE_CASE` and camelCase
/// payload fields. Unrecognized tags deserialize to [`Action::Unknown`],
/// which reduces to the unchanged state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    SetViewport {
        viewport: ViewState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        adjust_viewport_to_locations: Option<bool>,
    },
    ZoomIn,
    ZoomOut,
    ResetBearingPitch,
    SetHighlight {
        #[serde(default)]
        highlight: Option<Highlight>,
    },
    SetTooltip {
        #[serde(default)]
        tooltip: Option<Tooltip>,
    },
    ClearSelection,
    SelectLocation {
        location_id: String,
        #[serde(default)]
        incremental: bool,
    },
    SetSelectedLocations {
        #[serde(default)]
        selected_locations: Option<Vec<String>>,
    },
    SetLocationFilterMode {
        mode: LocationFilterMode,
    },
    SetTimeRange {
        range: Option<(Timestamp, Timestamp)>,
    },
    SetClusteringEnabled {
        clustering_enabled: bool,
    },
    SetClusteringAuto {
        clustering_auto: bool,
    },
    SetManualClusterZoom {
        #[serde(default)]
        manual_cluster_zoom: Option<f64>,
    },
    SetAnimationEnabled {
        animation_enabled: bool,
    },
    SetLocationTotalsEnabled {
        location_totals_enabled: bool,
    },
    SetAdaptiveScalesEnabled {
        adaptive_scales_enabled: bool,
    },
    SetDarkMode {
        dark_mode: bool,
    },
    SetFadeEnabled {
        fade_enabled: bool,
    },
    SetBaseMapEnabled {
        base_map_enabled: bool,
    },
    SetFadeAmount {
        fade_amount: f64,
    },
    SetBaseMapOpacity {
        base_map_opacity: f64,
    },
    SetColorScheme {
        color_scheme_key: String,
    },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn actions_use_tagged_wire_format() {
        let action: Action = serde_json::from_value(json!({
            "type": "SELECT_LOCATION",
            "locationId": "A",
            "incremental": true,
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::SelectLocation {
                location_id: "A".to_owned(),
                incremental: true,
            }
        );
        assert_eq!(action.to_string(), "SELECT_LOCATION");
    }

    #[test]
    fn unit_actions_need_only_a_tag() {
        let action: Action = serde_json::from_value(json!({ "type": "ZOOM_IN" })).unwrap();
        assert_eq!(action, Action::ZoomIn);
    }

    #[test]
    fn unrecognized_action_type_is_unknown() {
        let action: Action = serde_json::from_value(json!({ "type": "DO_A_BARREL_ROLL" })).unwrap();
        assert_eq!(action, Action::Unknown);
    }

    #[test]
    fn highlight_tags_are_lowercase() {
        let value = serde_json::to_value(Highlight::Location {
            location_id: "A".to_owned(),
        })
        .unwrap();
        assert_eq!(value, json!({ "type": "location", "locationId": "A" }));
    }

    #[test]
    fn default_settings() {
        let settings = SettingsState::default();
        assert!(settings.dark_mode);
        assert!(settings.clustering_enabled);
        assert!(!settings.animation_enabled);
        assert!((settings.fade_amount - 50.0).abs() < f64::EPSILON);
        assert!((settings.base_map_opacity - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = FlowMapState::with_viewport(ViewState::new(800.0, 600.0, 10.0, 20.0, 3.0));
        state.filter_state.selected_locations = Some(vec!["A".to_owned()]);
        let json = serde_json::to_string(&state).unwrap();
        let back: FlowMapState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
