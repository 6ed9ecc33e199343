#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Location, flow, and loading-state types for the flow map pipeline.
//!
//! These are the data contracts that cross every boundary in the system:
//! raw rows coming out of a row source, canonical flows coming out of
//! aggregation, and the loading statuses reported back to the foreground.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The single time type used by flows and time filters.
pub type Timestamp = DateTime<Utc>;

/// A named point on the map.
///
/// Identity is the `id`; the full set of locations is replaced atomically
/// whenever a new dataset is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Stable identifier referenced by flows.
    pub id: String,
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
    /// Display name (falls back to the id when the source has none).
    pub name: String,
}

/// A canonical, aggregated movement count between two locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    /// Origin location id.
    pub origin: String,
    /// Destination location id.
    pub dest: String,
    /// Summed count. Negative values are legal in diff mode.
    pub count: f64,
    /// Time bucket this flow belongs to, if the source rows had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Timestamp>,
}

impl Flow {
    /// Magnitude used to drive the color scale.
    #[must_use]
    pub const fn magnitude(&self) -> f64 {
        self.count
    }
}

/// A `count` cell as delivered by a row source: either already numeric or
/// still a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountValue {
    /// Numeric cell.
    Number(f64),
    /// Textual cell, coerced on use.
    Text(String),
}

impl CountValue {
    /// Coerces the cell to a finite number, returning `None` for
    /// non-numeric or non-finite values.
    #[must_use]
    pub fn as_finite(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for CountValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for CountValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// A `time` cell: a native timestamp passes through untouched, text is
/// parsed by the time parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    /// Already a timestamp.
    Timestamp(Timestamp),
    /// Unparsed text.
    Text(String),
}

impl From<&str> for TimeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Timestamp> for TimeValue {
    fn from(value: Timestamp) -> Self {
        Self::Timestamp(value)
    }
}

/// A flow row exactly as it came out of a row source, before aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFlowRow {
    /// Origin location id, if the cell was present.
    pub origin: Option<String>,
    /// Destination location id, if the cell was present.
    pub dest: Option<String>,
    /// Raw count cell.
    pub count: Option<CountValue>,
    /// Raw time cell.
    pub time: Option<TimeValue>,
}

impl RawFlowRow {
    /// Convenience constructor for the common fully-populated row.
    #[must_use]
    pub fn new(origin: &str, dest: &str, count: impl Into<CountValue>) -> Self {
        Self {
            origin: Some(origin.to_owned()),
            dest: Some(dest.to_owned()),
            count: Some(count.into()),
            time: None,
        }
    }

    /// Sets the time cell.
    #[must_use]
    pub fn with_time(mut self, time: impl Into<TimeValue>) -> Self {
        self.time = Some(time.into());
        self
    }
}

impl From<&Flow> for RawFlowRow {
    fn from(flow: &Flow) -> Self {
        Self {
            origin: Some(flow.origin.clone()),
            dest: Some(flow.dest.clone()),
            count: Some(CountValue::Number(flow.count)),
            time: flow.time.map(TimeValue::Timestamp),
        }
    }
}

/// Per-location flow sums derived from a flow set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationTotals {
    /// Sum of flows ending at the location from elsewhere.
    pub incoming: f64,
    /// Sum of flows leaving the location for elsewhere.
    pub outgoing: f64,
    /// Sum of flows starting and ending at the location.
    pub within: f64,
}

impl LocationTotals {
    /// Largest absolute total, used for symmetric circle sizing.
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.incoming
            .abs()
            .max(self.outgoing.abs())
            .max(self.within.abs())
    }
}

/// Which flows a location selection keeps.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationFilterMode {
    /// Flows touching any selected location.
    #[default]
    All,
    /// Flows ending at a selected location.
    Incoming,
    /// Flows starting at a selected location.
    Outgoing,
    /// Flows between two selected locations.
    Between,
}

/// Anything that can be drawn as a location circle: a raw location or a
/// cluster standing in for several of them.
pub trait LocationNode {
    /// Id that flows reference.
    fn id(&self) -> &str;

    /// Representative `[lon, lat]` point.
    fn centroid(&self) -> [f64; 2];
}

impl LocationNode for Location {
    fn id(&self) -> &str {
        &self.id
    }

    fn centroid(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// An aggregated stand-in for several nearby locations at low zoom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNode {
    /// Cluster id, referenced by clustered flows.
    pub id: String,
    /// Zoom level the cluster was built for.
    pub zoom: u8,
    /// Geometric centroid `[lon, lat]` of the member locations.
    pub centroid: [f64; 2],
    /// Ids of the member locations.
    pub children: Vec<String>,
}

impl ClusterNode {
    /// Builds a cluster whose centroid is the mean of its members'
    /// coordinates. An empty member list yields a centroid at `[0, 0]`.
    #[must_use]
    pub fn from_members(id: &str, zoom: u8, members: &[&Location]) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let n = members.len().max(1) as f64;
        let (lon, lat) = members
            .iter()
            .fold((0.0, 0.0), |(lon, lat), l| (lon + l.lon, lat + l.lat));

        Self {
            id: id.to_owned(),
            zoom,
            centroid: [lon / n, lat / n],
            children: members.iter().map(|l| l.id.clone()).collect(),
        }
    }
}

impl LocationNode for ClusterNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn centroid(&self) -> [f64; 2] {
        self.centroid
    }
}

/// A location circle input that is either a raw location or a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlowNode {
    /// Pre-clustered node.
    Cluster(ClusterNode),
    /// Raw location.
    Location(Location),
}

impl LocationNode for FlowNode {
    fn id(&self) -> &str {
        match self {
            Self::Cluster(c) => c.id(),
            Self::Location(l) => l.id(),
        }
    }

    fn centroid(&self) -> [f64; 2] {
        match self {
            Self::Cluster(c) => c.centroid(),
            Self::Location(l) => l.centroid(),
        }
    }
}

/// Outcome of a dataset load, as reported across the worker boundary.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadingStatus {
    /// A load is in flight.
    Loading,
    /// The load failed; details were logged.
    Error,
    /// The data is available.
    Done,
}

/// A dataset together with its loading status.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadingState<T> {
    /// In flight, possibly still holding the previous data.
    Loading(Option<T>),
    /// Failed.
    Error,
    /// Loaded.
    Done(T),
}

impl<T> LoadingState<T> {
    /// The status without the payload.
    #[must_use]
    pub const fn status(&self) -> LoadingStatus {
        match self {
            Self::Loading(_) => LoadingStatus::Loading,
            Self::Error => LoadingStatus::Error,
            Self::Done(_) => LoadingStatus::Done,
        }
    }

    /// The data, only once loading is done.
    #[must_use]
    pub const fn done(&self) -> Option<&T> {
        match self {
            Self::Done(data) => Some(data),
            _ => None,
        }
    }
}

/// Wire format of a row source.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataFormat {
    /// Comma-separated text with a header row.
    #[default]
    Csv,
    /// Google-Sheets gviz JSON payload.
    Gsheets,
}

/// Filtered and unfiltered count sums for the current flow set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTotals {
    /// Sum of counts of flows passing the current filter.
    pub filtered_count: f64,
    /// Sum of counts of all loaded flows.
    pub unfiltered_count: f64,
    /// Earliest and latest flow time, if any flow has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_extent: Option<(Timestamp, Timestamp)>,
}
