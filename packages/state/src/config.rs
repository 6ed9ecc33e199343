//! Session configuration: a flat string property bag.
//!
//! Properties come either from a TOML file (nested tables flatten to
//! dotted keys, so `[colors] scheme = "Blues"` is `colors.scheme`) or from
//! a two-column `property,value` CSV sheet. Missing or invalid values never
//! fail; readers fall back to documented defaults.

use std::collections::BTreeMap;
use std::path::Path;

use strum_macros::{AsRefStr, Display, EnumString};

use crate::viewport::{BBox, parse_bbox};

/// Errors that can occur while reading a configuration source.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV parsing failed.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// Reading the config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recognized configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
pub enum ConfigPropName {
    #[strum(serialize = "title")]
    Title,
    #[strum(serialize = "description")]
    Description,
    #[strum(serialize = "source.name")]
    SourceName,
    #[strum(serialize = "source.url")]
    SourceUrl,
    #[strum(serialize = "createdBy.name")]
    AuthorName,
    #[strum(serialize = "createdBy.url")]
    AuthorUrl,
    #[strum(serialize = "mapbox.accessToken")]
    MapboxAccessToken,
    #[strum(serialize = "mapbox.mapStyle")]
    MapboxMapStyle,
    #[strum(serialize = "map.bbox")]
    MapBbox,
    #[strum(serialize = "colors.scheme")]
    ColorsScheme,
    #[strum(serialize = "colors.darkMode")]
    ColorsDarkMode,
    #[strum(serialize = "animate.flows")]
    AnimateFlows,
    #[strum(serialize = "clustering")]
    ClusterOnZoom,
    #[strum(serialize = "flows.sheets")]
    FlowsSheets,
    #[strum(serialize = "fadeAmount")]
    FadeAmount,
    #[strum(serialize = "baseMapOpacity")]
    BaseMapOpacity,
    #[strum(serialize = "ignore.errors")]
    IgnoreErrors,
}

/// `true` for `true` / `yes` in any case, `false` otherwise.
#[must_use]
pub fn parse_bool_config_prop(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
    })
}

/// The value as a finite number, or `default`.
#[must_use]
pub fn parse_number_config_prop(value: Option<&str>, default: f64) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

/// A flat property bag keyed by [`ConfigPropName`] strings.
///
/// Unrecognized keys are kept so callers can read custom properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    props: BTreeMap<String, String>,
}

impl Config {
    /// Builds a config from key/value pairs, skipping empty values.
    #[must_use]
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let props = pairs
            .into_iter()
            .map(|(k, v)| (k.into().trim().to_owned(), v.into()))
            .filter(|(k, v)| !k.is_empty() && !v.trim().is_empty())
            .collect();
        Self { props }
    }

    /// Parses a TOML document, flattening nested tables into dotted keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document is not valid TOML.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(input)?;
        let mut pairs = Vec::new();
        flatten_toml("", &table, &mut pairs);
        Ok(Self::from_pairs(pairs))
    }

    /// Parses a `property,value` CSV with a header row.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Csv`] if a record cannot be read.
    pub fn from_properties_csv(input: &str) -> Result<Self, ConfigError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input.as_bytes());

        let mut pairs = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let (Some(key), Some(value)) = (record.get(0), record.get(1)) {
                pairs.push((key.to_owned(), value.to_owned()));
            }
        }
        Ok(Self::from_pairs(pairs))
    }

    /// Reads a config file: `.csv` as a properties sheet, anything else as
    /// TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let config = if is_csv {
            Self::from_properties_csv(&input)?
        } else {
            Self::from_toml_str(&input)?
        };
        log::info!("Loaded {} config properties from {}", config.len(), path.display());
        Ok(config)
    }

    #[must_use]
    pub fn get(&self, name: ConfigPropName) -> Option<&str> {
        self.get_raw(name.as_ref())
    }

    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.props.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Flow sheet names from the comma-separated `flows.sheets` property.
    #[must_use]
    pub fn flows_sheets(&self) -> Vec<String> {
        self.get(ConfigPropName::FlowsSheets)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The `map.bbox` property, if present and four finite numbers.
    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        let raw = self.get(ConfigPropName::MapBbox)?;
        let bbox = parse_bbox(raw);
        if bbox.is_none() {
            log::warn!("Ignoring invalid map.bbox {raw:?}");
        }
        bbox
    }
}

fn flatten_toml(prefix: &str, table: &toml::Table, out: &mut Vec<(String, String)>) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten_toml(&key, nested, out),
            toml::Value::String(s) => out.push((key, s.clone())),
            toml::Value::Array(items) => {
                let joined: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        toml::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                out.push((key, joined.join(",")));
            }
            other => out.push((key, other.to_string())),
        }
    }
}
