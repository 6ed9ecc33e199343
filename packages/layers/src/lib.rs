#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Render-ready data for the flow map layers.
//!
//! Turns locations and aggregated flows into typed attribute buffers for
//! two visual primitives: location circles and flow lines. Circle radius
//! and line thickness come from magnitude scales, line color from a
//! sequential (or diverging) color ramp.

pub mod buffers;
pub mod colors;
pub mod scales;

pub use buffers::{CircleColoring, LayerAttribute, LayersData, prepare_layers_data};
pub use colors::{COLOR_SCHEME_KEYS, ColorSettings, FlowMapColors, Rgba};
pub use scales::FlowScales;
