//! The pipeline service owned by the worker context.
//!
//! All data lives in one [`FlowMapService`]: the loaded locations, the
//! aggregated flows, and the latest [`FlowMapState`] pushed from the
//! foreground. Every read recomputes from these on demand.

use flowmap_flow::{FlowFilter, aggregate_across_time, aggregate_flows, flow_totals};
use flowmap_flow_models::{
    DataFormat, Flow, FlowTotals, LoadingState, LoadingStatus, Location, RawFlowRow,
};
use flowmap_layers::{CircleColoring, ColorSettings, FlowMapColors, LayersData, prepare_layers_data};
use flowmap_state::viewport::DEFAULT_PADDING;
use flowmap_state::viewport_for_locations;
use flowmap_state_models::{FilterState, FlowMapState, ViewState};

/// Locations, flows and view state of one worker.
#[derive(Debug, Default)]
pub struct FlowMapService {
    locations: Option<LoadingState<Vec<Location>>>,
    flows: Option<LoadingState<Vec<Flow>>>,
    state: Option<FlowMapState>,
    circle_coloring: CircleColoring,
}

impl FlowMapService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_circle_coloring(mut self, circle_coloring: CircleColoring) -> Self {
        self.circle_coloring = circle_coloring;
        self
    }

    /// Loads the location dataset from `url`, replacing the previous one.
    ///
    /// Fetch and parse failures are logged and reported as
    /// [`LoadingStatus::Error`].
    pub async fn load_locations(&mut self, url: &str, format: DataFormat) -> LoadingStatus {
        self.locations = Some(LoadingState::Loading(take_done(&mut self.locations)));
        log::info!("Loading locations from {url} ({format})");

        let loaded = match flowmap_source::fetch_locations(url, format).await {
            Ok(locations) => {
                log::info!("Loaded {} locations", locations.len());
                LoadingState::Done(locations)
            }
            Err(e) => {
                log::error!("Failed to load locations from {url}: {e}");
                LoadingState::Error
            }
        };
        let status = loaded.status();
        self.locations = Some(loaded);
        status
    }

    /// Loads and aggregates the flow dataset from `url`, replacing the
    /// previous one.
    ///
    /// Fetch and parse failures are logged and reported as
    /// [`LoadingStatus::Error`].
    pub async fn load_flows(&mut self, url: &str, format: DataFormat) -> LoadingStatus {
        self.flows = Some(LoadingState::Loading(take_done(&mut self.flows)));
        log::info!("Loading flows from {url} ({format})");

        let loaded = match flowmap_source::fetch_flow_rows(url, format).await {
            Ok(rows) => {
                let flows = aggregate_flows(&rows);
                log::info!("Aggregated {} flow rows into {} flows", rows.len(), flows.len());
                LoadingState::Done(flows)
            }
            Err(e) => {
                log::error!("Failed to load flows from {url}: {e}");
                LoadingState::Error
            }
        };
        let status = loaded.status();
        self.flows = Some(loaded);
        status
    }

    /// Replaces the location dataset with already parsed locations.
    pub fn replace_locations(&mut self, locations: Vec<Location>) {
        self.locations = Some(LoadingState::Done(locations));
    }

    /// Replaces the flow dataset with the aggregate of `rows`.
    pub fn replace_flows(&mut self, rows: &[RawFlowRow]) {
        self.flows = Some(LoadingState::Done(aggregate_flows(rows)));
    }

    pub fn set_flow_map_state(&mut self, state: FlowMapState) {
        self.state = Some(state);
    }

    #[must_use]
    pub const fn flow_map_state(&self) -> Option<&FlowMapState> {
        self.state.as_ref()
    }

    #[must_use]
    pub fn locations_status(&self) -> Option<LoadingStatus> {
        self.locations.as_ref().map(LoadingState::status)
    }

    #[must_use]
    pub fn flows_status(&self) -> Option<LoadingStatus> {
        self.flows.as_ref().map(LoadingState::status)
    }

    fn loaded_locations(&self) -> Option<&Vec<Location>> {
        self.locations.as_ref()?.done()
    }

    fn loaded_flows(&self) -> Option<&Vec<Flow>> {
        self.flows.as_ref()?.done()
    }

    fn filter(&self) -> FlowFilter<'_> {
        let Some(FlowMapState {
            filter_state:
                FilterState {
                    selected_locations,
                    selected_time_range,
                    location_filter_mode,
                },
            ..
        }) = &self.state
        else {
            return FlowFilter::default();
        };
        FlowFilter {
            selected_locations: selected_locations.as_deref(),
            time_range: *selected_time_range,
            mode: *location_filter_mode,
        }
    }

    /// Circle and line buffers for the current data and state, `None` until
    /// both datasets are loaded.
    ///
    /// Flows are filtered by the state's selection and time range, then
    /// summed across time. Diverging colors are used when any resulting
    /// count is negative.
    #[must_use]
    pub fn get_layers_data(&self) -> Option<LayersData> {
        let locations = self.loaded_locations()?;
        let flows = self.loaded_flows()?;

        let flows = aggregate_across_time(&self.filter().apply(flows));
        let diff_mode = flows.iter().any(|f| f.count < 0.0);
        let settings = match &self.state {
            Some(state) => {
                let s = &state.settings_state;
                ColorSettings {
                    scheme_key: s.color_scheme_key.as_deref(),
                    dark_mode: s.dark_mode,
                    fade_enabled: s.fade_enabled,
                    fade_amount: s.fade_amount,
                    diff_mode,
                }
            }
            None => ColorSettings {
                diff_mode,
                ..ColorSettings::default()
            },
        };
        let colors = FlowMapColors::new(&settings);

        log::debug!(
            "Building layers for {} locations and {} flows",
            locations.len(),
            flows.len()
        );
        Some(prepare_layers_data(
            locations,
            &flows,
            &colors,
            self.circle_coloring,
        ))
    }

    /// Viewport of `[width, height]` framing every loaded location, `None`
    /// until locations are loaded.
    #[must_use]
    pub fn get_viewport_for_locations(&self, dims: [f64; 2]) -> Option<ViewState> {
        let locations = self.loaded_locations()?;
        Some(viewport_for_locations(locations, dims, DEFAULT_PADDING))
    }

    /// Filtered and unfiltered flow sums, `None` until flows are loaded.
    #[must_use]
    pub fn get_flow_totals(&self) -> Option<FlowTotals> {
        let flows = self.loaded_flows()?;
        Some(flow_totals(flows, &self.filter()))
    }

    /// Drops both datasets. The view state is kept.
    pub fn clear_data(&mut self) {
        log::debug!("Clearing loaded data");
        self.locations = None;
        self.flows = None;
    }
}

fn take_done<T>(slot: &mut Option<LoadingState<T>>) -> Option<T> {
    match slot.take() {
        Some(LoadingState::Done(data) | LoadingState::Loading(Some(data))) => Some(data),
        _ => None,
    }
}
