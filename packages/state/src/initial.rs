//! The first state of a session.

use flowmap_state_models::{FilterState, FlowMapState, SettingsState, ViewState};

use crate::config::{Config, ConfigPropName, parse_bool_config_prop, parse_number_config_prop};
use crate::query::decode;
use crate::viewport::initial_viewport;

/// Settings seeded from configuration, defaults where a property is absent
/// or invalid.
#[must_use]
pub fn settings_from_config(config: &Config) -> SettingsState {
    let defaults = SettingsState::default();
    SettingsState {
        animation_enabled: parse_bool_config_prop(config.get(ConfigPropName::AnimateFlows)),
        clustering_enabled: parse_bool_config_prop(Some(
            config.get(ConfigPropName::ClusterOnZoom).unwrap_or("true"),
        )),
        dark_mode: parse_bool_config_prop(Some(
            config.get(ConfigPropName::ColorsDarkMode).unwrap_or("true"),
        )),
        fade_amount: parse_number_config_prop(
            config.get(ConfigPropName::FadeAmount),
            defaults.fade_amount,
        ),
        base_map_opacity: parse_number_config_prop(
            config.get(ConfigPropName::BaseMapOpacity),
            defaults.base_map_opacity,
        ),
        color_scheme_key: config.get(ConfigPropName::ColorsScheme).map(str::to_owned),
        ..defaults
    }
}

/// Builds the initial state from configuration, a viewport, and a URL
/// query string.
///
/// A valid `map.bbox` property replaces `viewport` with a fit of that box
/// at the same size and turns off automatic viewport fitting. The query
/// string is then decoded on top.
#[must_use]
pub fn initial_state(config: &Config, viewport: ViewState, query: &str) -> FlowMapState {
    let (viewport, adjust_viewport_to_locations) = match config.bbox() {
        Some(bbox) => (
            initial_viewport([viewport.width, viewport.height], bbox),
            false,
        ),
        None => (viewport, true),
    };

    let state = FlowMapState {
        filter_state: FilterState::default(),
        settings_state: settings_from_config(config),
        viewport,
        adjust_viewport_to_locations,
        tooltip: None,
        highlight: None,
    };

    if query.len() > 1 {
        decode(query, state)
    } else {
        state
    }
}
