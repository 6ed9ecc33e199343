//! CSV text to header-keyed records.

use crate::SourceError;

/// Parses CSV text with a header row into one JSON object per record.
///
/// Headers and values are trimmed. Short records are padded with empty
/// strings, extra trailing fields are ignored. Fully blank lines are
/// skipped.
///
/// # Errors
///
/// Returns [`SourceError::Csv`] if the text is not readable CSV.
pub fn parse_csv_rows(text: &str) -> Result<Vec<serde_json::Value>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let mut map = serde_json::Map::new();
        for (i, header) in headers.iter().enumerate() {
            let value = record.get(i).unwrap_or("").trim().to_owned();
            map.insert(header.clone(), serde_json::Value::String(value));
        }
        records.push(serde_json::Value::Object(map));
    }

    Ok(records)
}
