#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the flow map server.
//!
//! Pipeline outputs (`LayersData`, `ViewState`, `FlowTotals`,
//! `FlowMapState`) are returned as-is; only the envelopes specific to the
//! HTTP surface live here.

use flowmap_flow_models::{DataFormat, LoadingStatus};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Body of `POST /api/locations` and `POST /api/flows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    /// `http(s)://` URL or a path readable by the server.
    pub url: String,
    /// Defaults to CSV.
    #[serde(default)]
    pub format: DataFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
    pub status: LoadingStatus,
}

/// Query parameters of `GET /api/viewport`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportQueryParams {
    pub width: f64,
    pub height: f64,
}

/// `GET /api/state/query` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiQueryString {
    /// The encoded state, without a leading `?`.
    pub query: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
