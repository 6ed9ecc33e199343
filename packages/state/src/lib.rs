#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Everything that produces or transforms a [`FlowMapState`].
//!
//! - [`reducer`]: the pure `(state, action) -> state` transition.
//! - [`query`]: the compact URL query string a state is shared through.
//! - [`config`]: the flat property bag a session is configured with.
//! - [`initial`]: builds the session's first state from config, viewport
//!   and query string.
//! - [`viewport`]: Mercator bounding-box fitting.
//!
//! [`FlowMapState`]: flowmap_state_models::FlowMapState

pub mod config;
pub mod initial;
pub mod query;
pub mod reducer;
pub mod viewport;

pub use config::{Config, ConfigError, ConfigPropName};
pub use initial::initial_state;
pub use query::{decode, encode};
pub use reducer::reduce;
pub use viewport::{default_viewport, initial_viewport, viewport_for_locations};
