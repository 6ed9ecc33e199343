#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The background side of the flow map.
//!
//! A [`FlowMapService`] holds the loaded datasets and the latest view state
//! and runs the whole pipeline on request. [`spawn_worker`] gives it a
//! thread of its own and returns a [`WorkerHandle`] whose methods are the
//! async request/response surface. [`StateSync`] sits in front of a handle
//! and throttles state pushes from the foreground.

pub mod handle;
pub mod service;
pub mod sync;

pub use handle::{WorkerError, WorkerHandle, spawn_worker};
pub use service::FlowMapService;
pub use sync::{DEFAULT_THROTTLE, StateSync};
