//! The state transition function.

use flowmap_flow_models::LocationFilterMode;
use flowmap_state_models::{
    Action, FilterState, FlowMapState, MAX_PITCH, MAX_ZOOM_LEVEL, MIN_PITCH, MIN_ZOOM_LEVEL,
    ViewState,
};

const ZOOM_STEP: f64 = 1.1;

/// Clamps zoom into `[MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL]`. NaN becomes the
/// minimum.
#[must_use]
pub fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_nan() {
        MIN_ZOOM_LEVEL
    } else {
        zoom.clamp(MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL)
    }
}

/// Clamps pitch into `[MIN_PITCH, MAX_PITCH]`. NaN becomes the minimum.
#[must_use]
pub fn clamp_pitch(pitch: f64) -> f64 {
    if pitch.is_nan() {
        MIN_PITCH
    } else {
        pitch.clamp(MIN_PITCH, MAX_PITCH)
    }
}

fn clear_selection(filter: FilterState) -> FilterState {
    FilterState {
        selected_locations: None,
        location_filter_mode: LocationFilterMode::All,
        ..filter
    }
}

/// Applies `action` to `state`, returning the next state.
///
/// Total: every action, including [`Action::Unknown`], yields a state, and
/// every resulting viewport has zoom in `[0, 20]` and pitch in `[0, 60]`.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn reduce(mut state: FlowMapState, action: Action) -> FlowMapState {
    match action {
        Action::SetViewport {
            viewport,
            adjust_viewport_to_locations,
        } => FlowMapState {
            viewport: ViewState {
                zoom: clamp_zoom(viewport.zoom),
                pitch: clamp_pitch(viewport.pitch),
                ..viewport
            },
            adjust_viewport_to_locations: if adjust_viewport_to_locations.is_some() {
                false
            } else {
                state.adjust_viewport_to_locations
            },
            tooltip: None,
            highlight: None,
            ..state
        },
        Action::ZoomIn => FlowMapState {
            viewport: ViewState {
                zoom: clamp_zoom(state.viewport.zoom * ZOOM_STEP),
                ..state.viewport
            },
            tooltip: None,
            highlight: None,
            ..state
        },
        Action::ZoomOut => FlowMapState {
            viewport: ViewState {
                zoom: clamp_zoom(state.viewport.zoom / ZOOM_STEP),
                ..state.viewport
            },
            tooltip: None,
            highlight: None,
            ..state
        },
        Action::ResetBearingPitch => FlowMapState {
            viewport: ViewState {
                bearing: 0.0,
                pitch: 0.0,
                ..state.viewport
            },
            ..state
        },
        Action::SetHighlight { highlight } => FlowMapState { highlight, ..state },
        Action::SetTooltip { tooltip } => FlowMapState { tooltip, ..state },
        Action::ClearSelection => FlowMapState {
            filter_state: clear_selection(state.filter_state),
            tooltip: None,
            highlight: None,
            ..state
        },
        Action::SelectLocation {
            location_id,
            incremental,
        } => {
            let mut filter_state = state.filter_state;
            let next = match filter_state.selected_locations.take() {
                Some(mut selected) => {
                    if let Some(idx) = selected.iter().position(|id| *id == location_id) {
                        selected.remove(idx);
                        Some(selected).filter(|s| !s.is_empty())
                    } else if incremental {
                        selected.push(location_id);
                        Some(selected)
                    } else {
                        Some(vec![location_id])
                    }
                }
                None => Some(vec![location_id]),
            };
            let filter_state = match next {
                Some(selected) => FilterState {
                    selected_locations: Some(selected),
                    ..filter_state
                },
                None => clear_selection(filter_state),
            };
            FlowMapState {
                filter_state,
                tooltip: None,
                highlight: None,
                ..state
            }
        }
        Action::SetSelectedLocations { selected_locations } => {
            let filter_state = match selected_locations.filter(|s| !s.is_empty()) {
                Some(selected) => FilterState {
                    selected_locations: Some(selected),
                    ..state.filter_state
                },
                None => clear_selection(state.filter_state),
            };
            FlowMapState {
                filter_state,
                ..state
            }
        }
        Action::SetLocationFilterMode { mode } => FlowMapState {
            filter_state: FilterState {
                location_filter_mode: mode,
                ..state.filter_state
            },
            ..state
        },
        Action::SetTimeRange { range } => FlowMapState {
            filter_state: FilterState {
                selected_time_range: range,
                ..state.filter_state
            },
            ..state
        },
        Action::SetClusteringEnabled { clustering_enabled } => {
            state.settings_state.clustering_enabled = clustering_enabled;
            state
        }
        Action::SetClusteringAuto { clustering_auto } => {
            state.settings_state.clustering_auto = clustering_auto;
            state
        }
        Action::SetManualClusterZoom {
            manual_cluster_zoom,
        } => {
            state.settings_state.manual_cluster_zoom = manual_cluster_zoom;
            state
        }
        Action::SetAnimationEnabled { animation_enabled } => {
            state.settings_state.animation_enabled = animation_enabled;
            state
        }
        Action::SetLocationTotalsEnabled {
            location_totals_enabled,
        } => {
            state.settings_state.location_totals_enabled = location_totals_enabled;
            state
        }
        Action::SetAdaptiveScalesEnabled {
            adaptive_scales_enabled,
        } => {
            state.settings_state.adaptive_scales_enabled = adaptive_scales_enabled;
            state
        }
        Action::SetDarkMode { dark_mode } => {
            state.settings_state.dark_mode = dark_mode;
            state
        }
        Action::SetFadeEnabled { fade_enabled } => {
            state.settings_state.fade_enabled = fade_enabled;
            state
        }
        Action::SetBaseMapEnabled { base_map_enabled } => {
            state.settings_state.base_map_enabled = base_map_enabled;
            state
        }
        Action::SetFadeAmount { fade_amount } => {
            state.settings_state.fade_amount = fade_amount;
            state
        }
        Action::SetBaseMapOpacity { base_map_opacity } => {
            state.settings_state.base_map_opacity = base_map_opacity;
            state
        }
        Action::SetColorScheme { color_scheme_key } => {
            state.settings_state.color_scheme_key = Some(color_scheme_key);
            state
        }
        Action::Unknown => {
            log::debug!("Ignoring unknown action");
            state
        }
    }
}
