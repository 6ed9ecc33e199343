//! Selection and time-range filtering of aggregated flows.

use flowmap_flow_models::{Flow, FlowTotals, LocationFilterMode, Timestamp};

/// Criteria a flow must meet to be rendered and counted as "filtered".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowFilter<'a> {
    /// Selected location ids. `None` or empty means no selection.
    pub selected_locations: Option<&'a [String]>,
    /// Half-open `[start, end)` time range.
    pub time_range: Option<(Timestamp, Timestamp)>,
    /// How the selection applies to a flow's endpoints.
    pub mode: LocationFilterMode,
}

impl FlowFilter<'_> {
    /// Whether `flow` passes both the time and the location criteria.
    #[must_use]
    pub fn accepts(&self, flow: &Flow) -> bool {
        self.accepts_time(flow) && self.accepts_locations(flow)
    }

    fn accepts_time(&self, flow: &Flow) -> bool {
        let Some((start, end)) = self.time_range else {
            return true;
        };
        flow.time.is_some_and(|t| start <= t && t < end)
    }

    fn accepts_locations(&self, flow: &Flow) -> bool {
        let Some(selected) = self.selected_locations.filter(|s| !s.is_empty()) else {
            return true;
        };
        let is_selected = |id: &str| selected.iter().any(|s| s == id);

        match self.mode {
            LocationFilterMode::All => is_selected(&flow.origin) || is_selected(&flow.dest),
            LocationFilterMode::Incoming => is_selected(&flow.dest),
            LocationFilterMode::Outgoing => is_selected(&flow.origin),
            LocationFilterMode::Between => is_selected(&flow.origin) && is_selected(&flow.dest),
        }
    }

    /// Flows passing the filter, in input order.
    #[must_use]
    pub fn apply(&self, flows: &[Flow]) -> Vec<Flow> {
        flows.iter().filter(|f| self.accepts(f)).cloned().collect()
    }
}

/// Filtered and unfiltered count sums plus the overall time extent.
#[must_use]
pub fn flow_totals(flows: &[Flow], filter: &FlowFilter<'_>) -> FlowTotals {
    let mut filtered_count = 0.0;
    let mut unfiltered_count = 0.0;
    let mut time_extent: Option<(Timestamp, Timestamp)> = None;

    for flow in flows {
        unfiltered_count += flow.count;
        if filter.accepts(flow) {
            filtered_count += flow.count;
        }
        if let Some(t) = flow.time {
            time_extent = Some(match time_extent {
                None => (t, t),
                Some((lo, hi)) => (lo.min(t), hi.max(t)),
            });
        }
    }

    FlowTotals {
        filtered_count,
        unfiltered_count,
        time_extent,
    }
}
