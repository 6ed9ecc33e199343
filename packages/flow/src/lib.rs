#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flow aggregation and per-location totals.
//!
//! Raw flow rows are summed into canonical [`Flow`]s with no duplicate
//! `(origin, dest, time-bucket)` triples, then reduced into per-location
//! incoming/outgoing/within sums that drive circle sizing downstream.
//!
//! [`Flow`]: flowmap_flow_models::Flow

pub mod aggregate;
pub mod filter;
pub mod time;
pub mod totals;

pub use aggregate::{aggregate_across_time, aggregate_flows};
pub use filter::{FlowFilter, flow_totals};
pub use time::parse_time;
pub use totals::{LocationTotalsMap, calc_location_totals};
