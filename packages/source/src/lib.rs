#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Row sources for locations and flows.
//!
//! A source is a URL (or local path) plus a [`DataFormat`]. Fetching yields
//! a list of records, each a [`serde_json::Value`] object keyed by column
//! header, which are then mapped onto [`Location`]s and [`RawFlowRow`]s.
//!
//! [`Location`]: flowmap_flow_models::Location
//! [`RawFlowRow`]: flowmap_flow_models::RawFlowRow

pub mod csv_rows;
pub mod gsheets;
pub mod records;
pub mod retry;

use std::path::Path;

use flowmap_flow_models::{DataFormat, Location, RawFlowRow};

pub use csv_rows::parse_csv_rows;
pub use gsheets::{make_sheet_query_url, parse_gsheets_json, sheet_rows};
pub use records::{flow_row_from_record, location_from_record, locations_from_records};

/// Errors that can occur while fetching or parsing a row source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV parsing failed.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading a local source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered, but not with usable rows.
    #[error("Bad response: {message}")]
    Response {
        /// Description of what went wrong.
        message: String,
    },

    /// A Google Sheets query reported an error status.
    #[error("Sheets query failed: {message}")]
    Sheets {
        /// Messages reported by the sheet, joined.
        message: String,
    },
}

/// Fetches the raw text of a source: `http(s)://` URLs over the network,
/// anything else as a local file path.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after retries or the file
/// cannot be read.
pub async fn fetch_text(url: &str) -> Result<String, SourceError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        let client = reqwest::Client::new();
        let text = retry::send_text(|| client.get(url)).await?;
        log::debug!("Downloaded {} bytes from {url}", text.len());
        Ok(text)
    } else {
        let text = tokio::fs::read_to_string(Path::new(url)).await?;
        log::debug!("Read {} bytes from {url}", text.len());
        Ok(text)
    }
}

/// Parses source text in `format` into header-keyed records.
///
/// # Errors
///
/// Returns [`SourceError`] if the text is not valid for `format`, or a
/// sheet payload reports an error status.
pub fn parse_rows(text: &str, format: DataFormat) -> Result<Vec<serde_json::Value>, SourceError> {
    match format {
        DataFormat::Csv => parse_csv_rows(text),
        DataFormat::Gsheets => {
            let response = parse_gsheets_json(text)?;
            sheet_rows(&response)
        }
    }
}

/// Fetches and parses every record of a source.
///
/// # Errors
///
/// Returns [`SourceError`] if fetching or parsing fails.
pub async fn fetch_rows(
    url: &str,
    format: DataFormat,
) -> Result<Vec<serde_json::Value>, SourceError> {
    let text = fetch_text(url).await?;
    let rows = parse_rows(&text, format)?;
    log::info!("Parsed {} {format} records from {url}", rows.len());
    Ok(rows)
}

/// Fetches a location source. Rows without usable coordinates are dropped.
///
/// # Errors
///
/// Returns [`SourceError`] if fetching or parsing fails.
pub async fn fetch_locations(url: &str, format: DataFormat) -> Result<Vec<Location>, SourceError> {
    let rows = fetch_rows(url, format).await?;
    Ok(locations_from_records(&rows))
}

/// Fetches a flow source as raw, unaggregated rows.
///
/// # Errors
///
/// Returns [`SourceError`] if fetching or parsing fails.
pub async fn fetch_flow_rows(url: &str, format: DataFormat) -> Result<Vec<RawFlowRow>, SourceError> {
    let rows = fetch_rows(url, format).await?;
    Ok(rows.iter().map(flow_row_from_record).collect())
}

#[cfg(test)]
mod tests {
    use flowmap_flow_models::CountValue;

    use super::*;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("flowmap_source_{}_{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn reads_local_csv_locations() {
        let path = temp_file(
            "locations.csv",
            "id,name,lat,lon\nA,Alpha,52.5,13.4\nB,,48.1,11.6\nC,Bad,x,1\n",
        );
        let locations = fetch_locations(path.to_str().unwrap(), DataFormat::Csv)
            .await
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].name, "Alpha");
        assert_eq!(locations[1].name, "B");
        assert!((locations[1].lon - 11.6).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn reads_local_csv_flows() {
        let path = temp_file("flows.csv", "origin,dest,count\nA,B,5\nB,A,x\n");
        let rows = fetch_flow_rows(path.to_str().unwrap(), DataFormat::Csv)
            .await
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], RawFlowRow::new("A", "B", "5"));
        assert_eq!(rows[1].count, Some(CountValue::Text("x".to_owned())));
    }

    #[tokio::test]
    async fn missing_local_file_is_an_io_error() {
        let result = fetch_rows("/nonexistent/flowmap/flows.csv", DataFormat::Csv).await;
        assert!(matches!(result, Err(SourceError::Io(_))));
    }

    #[test]
    fn parse_rows_dispatches_on_format() {
        let csv = parse_rows("a,b\n1,2\n", DataFormat::Csv).unwrap();
        assert_eq!(csv.len(), 1);

        let sheet = parse_rows(
            r#"/*O_o*/ google.visualization.Query.setResponse({"status":"ok","table":{"cols":[{"id":"A","label":"a","type":"string"}],"rows":[{"c":[{"v":"x"}]}]}});"#,
            DataFormat::Gsheets,
        )
        .unwrap();
        assert_eq!(sheet, vec![serde_json::json!({"a": "x"})]);
    }
}
