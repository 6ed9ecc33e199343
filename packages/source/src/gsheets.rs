//! Google Sheets visualization-query (`gviz`) sources.
//!
//! A sheet is queried through its `gviz/tq` endpoint, which answers with a
//! JSON object wrapped in a JavaScript callback. Cells carry a raw value
//! `v` and a formatted value `f`; date cells arrive as the literal text
//! `Date(y,m,d,h,mi,s)` with a zero-based month.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;

use crate::SourceError;

const SHEETS_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";

/// Layout dates are rewritten to, readable by the flow time parser.
const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static DATE_CELL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^Date\((\d{4}),(\d+),(\d+),(\d+),(\d+),(\d+)\)$").ok()
});

/// A `gviz` query response.
#[derive(Debug, Clone, Deserialize)]
pub struct SheetResponse {
    /// `ok`, `warning`, or `error`.
    pub status: String,
    #[serde(default)]
    pub table: Option<SheetTable>,
    #[serde(default)]
    pub errors: Vec<SheetMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetMessage {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "detailed_message")]
    pub detailed_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetTable {
    #[serde(default)]
    pub cols: Vec<SheetColumn>,
    #[serde(default)]
    pub rows: Vec<SheetRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetColumn {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetRow {
    /// Cells in column order; `None` for empty cells.
    #[serde(default, rename = "c")]
    pub cells: Vec<Option<SheetCell>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetCell {
    #[serde(default)]
    pub v: Option<serde_json::Value>,
    #[serde(default)]
    pub f: Option<String>,
}

impl SheetCell {
    /// The raw value, else the formatted one, as trimmed text.
    fn text(&self) -> Option<String> {
        let raw = match self.v.as_ref().filter(|v| !v.is_null()) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self.f.clone()?,
        };
        Some(raw.trim().to_owned())
    }
}

/// Builds the query URL for `sheet` of the spreadsheet `key`.
///
/// `OPTIONS no_format` is appended to `query` so numbers come back
/// unformatted.
#[must_use]
pub fn make_sheet_query_url(key: &str, sheet: &str, query: &str, format: &str) -> String {
    let base = format!("{SHEETS_BASE_URL}/{key}/gviz/tq?");
    let params: String = url::form_urlencoded::Serializer::new(base)
        .append_pair("tq", &format!("{query} OPTIONS no_format"))
        .append_pair("tqx", &format!("out:{format}"))
        .append_pair("sheet", sheet)
        .finish();
    params
}

/// Extracts the JSON object from a callback-wrapped `gviz` response.
///
/// # Errors
///
/// Returns [`SourceError::Response`] if the text holds no `{...}` span and
/// [`SourceError::Json`] if that span is not a valid response.
pub fn parse_gsheets_json(text: &str) -> Result<SheetResponse, SourceError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(SourceError::Response {
            message: "no JSON object in sheet response".to_owned(),
        });
    };
    if end < start {
        return Err(SourceError::Response {
            message: "no JSON object in sheet response".to_owned(),
        });
    }
    Ok(serde_json::from_str(&text[start..=end])?)
}

/// Rewrites a `Date(y,m,d,h,mi,s)` cell as `Y-M-D H:M:S`. The month in the
/// cell is zero-based.
#[must_use]
pub fn convert_date_cell(value: &str) -> Option<String> {
    let caps = DATE_CELL.as_ref()?.captures(value)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, part(2)? + 1, part(3)?)?;
    let date_time = date.and_hms_opt(part(4)?, part(5)?, part(6)?)?;
    Some(date_time.format(DATE_OUTPUT_FORMAT).to_string())
}

/// Converts a successful response into header-keyed records.
///
/// Column labels are the headers when any column has one; otherwise the
/// first row supplies the headers and is skipped. Empty cells are left out
/// of the record.
///
/// # Errors
///
/// Returns [`SourceError::Sheets`] if the response status is not `ok`.
pub fn sheet_rows(response: &SheetResponse) -> Result<Vec<serde_json::Value>, SourceError> {
    if response.status != "ok" {
        let message = response
            .errors
            .iter()
            .filter_map(|e| {
                e.detailed_message
                    .as_deref()
                    .or(e.message.as_deref())
                    .or(e.reason.as_deref())
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(SourceError::Sheets {
            message: format!("status {}: {message}", response.status),
        });
    }

    let Some(table) = response.table.as_ref() else {
        return Ok(Vec::new());
    };

    let labels: Vec<String> = table
        .cols
        .iter()
        .map(|c| c.label.as_deref().unwrap_or("").trim().to_owned())
        .collect();
    let has_labels = labels.iter().any(|l| !l.is_empty());

    let (headers, rows) = if has_labels {
        (labels, table.rows.as_slice())
    } else {
        let Some((first, rest)) = table.rows.split_first() else {
            return Ok(Vec::new());
        };
        let headers = (0..table.cols.len())
            .map(|i| cell_text(first, i).unwrap_or_default())
            .collect();
        (headers, rest)
    };

    Ok(rows
        .iter()
        .map(|row| {
            let mut map = serde_json::Map::new();
            for (i, header) in headers.iter().enumerate() {
                if let Some(value) = cell_text(row, i) {
                    let value = if value.starts_with("Date(") {
                        convert_date_cell(&value).unwrap_or_else(|| {
                            log::warn!("Could not parse sheet date {value:?}");
                            value
                        })
                    } else {
                        value
                    };
                    map.insert(header.clone(), serde_json::Value::String(value));
                }
            }
            serde_json::Value::Object(map)
        })
        .collect())
}

fn cell_text(row: &SheetRow, index: usize) -> Option<String> {
    row.cells.get(index)?.as_ref()?.text()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn response(body: &str) -> SheetResponse {
        parse_gsheets_json(&format!(
            "/*O_o*/\ngoogle.visualization.Query.setResponse({body});"
        ))
        .unwrap()
    }

    #[test]
    fn query_url_encodes_every_parameter() {
        let url = make_sheet_query_url("KEY", "flows 2020", "SELECT *", "json");
        assert_eq!(
            url,
            "https://docs.google.com/spreadsheets/d/KEY/gviz/tq?\
             tq=SELECT+*+OPTIONS+no_format&tqx=out%3Ajson&sheet=flows+2020"
        );
    }

    #[test]
    fn unwraps_the_callback() {
        let r = response(r#"{"version":"0.6","status":"ok","table":{"cols":[],"rows":[]}}"#);
        assert_eq!(r.status, "ok");
        assert!(r.table.is_some());
    }

    #[test]
    fn text_without_object_is_rejected() {
        assert!(matches!(
            parse_gsheets_json("setResponse();"),
            Err(SourceError::Response { .. })
        ));
        assert!(matches!(
            parse_gsheets_json("} nope {"),
            Err(SourceError::Response { .. })
        ));
    }

    #[test]
    fn labeled_columns_become_headers() {
        let r = response(
            r#"{"status":"ok","table":{
                "cols":[{"id":"A","label":"origin"},{"id":"B","label":" dest "},{"id":"C","label":"count"}],
                "rows":[
                    {"c":[{"v":"A"},{"v":"B"},{"v":5.0,"f":"5"}]},
                    {"c":[{"v":" C "},null,{"v":null,"f":"7"}]}
                ]}}"#,
        );
        let rows = sheet_rows(&r).unwrap();
        assert_eq!(rows[0], json!({"origin": "A", "dest": "B", "count": "5.0"}));
        assert_eq!(rows[1], json!({"origin": "C", "count": "7"}));
    }

    #[test]
    fn first_row_is_the_header_when_unlabeled() {
        let r = response(
            r#"{"status":"ok","table":{
                "cols":[{"id":"A","label":""},{"id":"B","label":""}],
                "rows":[
                    {"c":[{"v":"id"},{"v":"name"}]},
                    {"c":[{"v":"X"},{"v":"Ex"}]}
                ]}}"#,
        );
        assert_eq!(sheet_rows(&r).unwrap(), vec![json!({"id": "X", "name": "Ex"})]);
    }

    #[test]
    fn date_cells_use_zero_based_months() {
        assert_eq!(
            convert_date_cell("Date(2020,0,15,8,30,0)").as_deref(),
            Some("2020-01-15 08:30:00")
        );
        assert_eq!(convert_date_cell("Date(2020,12,1,0,0,0)"), None);
        assert_eq!(convert_date_cell("2020-01-15"), None);

        let r = response(
            r#"{"status":"ok","table":{
                "cols":[{"label":"time"}],
                "rows":[{"c":[{"v":"Date(2019,11,31,23,59,59)"}]},{"c":[{"v":"Date(2019,99,1,0,0,0)"}]}]}}"#,
        );
        let rows = sheet_rows(&r).unwrap();
        assert_eq!(rows[0]["time"], json!("2019-12-31 23:59:59"));
        assert_eq!(rows[1]["time"], json!("Date(2019,99,1,0,0,0)"));
    }

    #[test]
    fn error_status_is_an_error() {
        let r = response(
            r#"{"status":"error","errors":[{"reason":"invalid_query","detailed_message":"Invalid query: NO_COLUMN"}]}"#,
        );
        let err = sheet_rows(&r).unwrap_err();
        assert!(err.to_string().contains("NO_COLUMN"), "{err}");
    }
}
