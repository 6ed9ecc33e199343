//! Per-location incoming, outgoing, and within sums.

use std::collections::BTreeMap;

use flowmap_flow_models::{Flow, LocationTotals};

/// Three id-keyed sums derived from a flow set.
///
/// Only ids referenced by at least one flow appear; everything else reads
/// as zero. Ids that are not part of the location set are kept as-is,
/// resolving them is the buffer builder's concern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationTotalsMap {
    /// Flows ending at the location from elsewhere.
    pub incoming: BTreeMap<String, f64>,
    /// Flows leaving the location for elsewhere.
    pub outgoing: BTreeMap<String, f64>,
    /// Flows whose origin and destination are the same location.
    pub within: BTreeMap<String, f64>,
}

impl LocationTotalsMap {
    /// Totals for one location, zero where absent.
    #[must_use]
    pub fn get(&self, id: &str) -> LocationTotals {
        LocationTotals {
            incoming: self.incoming.get(id).copied().unwrap_or(0.0),
            outgoing: self.outgoing.get(id).copied().unwrap_or(0.0),
            within: self.within.get(id).copied().unwrap_or(0.0),
        }
    }

    /// `max(|incoming|, |outgoing|, |within|)` for one location.
    #[must_use]
    pub fn max_abs_total(&self, id: &str) -> f64 {
        self.get(id).max_abs()
    }
}

/// Sums flow counts into per-location totals.
#[must_use]
pub fn calc_location_totals(flows: &[Flow]) -> LocationTotalsMap {
    let mut totals = LocationTotalsMap::default();

    for flow in flows {
        if flow.origin == flow.dest {
            *totals.within.entry(flow.origin.clone()).or_insert(0.0) += flow.count;
        } else {
            *totals.outgoing.entry(flow.origin.clone()).or_insert(0.0) += flow.count;
            *totals.incoming.entry(flow.dest.clone()).or_insert(0.0) += flow.count;
        }
    }

    totals
}
