use super::error::InspectError;
use super::types::SelectedFile;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Cursor;

const PREVIEW_RECORDS: usize = 5;

/// What a quick look at the first sheet of a workbook turned up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkbookSummary {
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub record_count: usize,
    pub preview: Vec<Map<String, Value>>,
}

/// Local inspection of a spreadsheet before it is uploaded.
///
/// Results are only ever logged; the upload proceeds regardless.
pub trait WorkbookInspector: Send + Sync {
    fn inspect(&self, file: &SelectedFile) -> Result<WorkbookSummary, InspectError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CalamineInspector;

impl WorkbookInspector for CalamineInspector {
    fn inspect(&self, file: &SelectedFile) -> Result<WorkbookSummary, InspectError> {
        let mut sheets = open_workbook_auto_from_rs(Cursor::new(file.content.as_slice()))?;
        let sheet_name = sheets
            .sheet_names()
            .first()
            .cloned()
            .ok_or(InspectError::NoSheets)?;
        let range = sheets.worksheet_range(&sheet_name)?;

        let mut rows = range.rows();
        let raw_headers: Vec<String> = rows
            .next()
            .map(|row| row.iter().map(cell_to_string).collect())
            .unwrap_or_default();
        let headers = record_keys(&raw_headers);

        let mut record_count = 0;
        let mut preview = Vec::new();
        for row in rows {
            if row.iter().all(|cell| matches!(cell, Data::Empty)) {
                continue;
            }
            record_count += 1;
            if preview.len() < PREVIEW_RECORDS {
                preview.push(to_record(&headers, row));
            }
        }

        Ok(WorkbookSummary {
            sheet_name,
            headers,
            record_count,
            preview,
        })
    }
}

/// Runs the inspector and logs the outcome. Failures are logged and yield `None`.
pub fn log_inspection(
    inspector: &dyn WorkbookInspector,
    file: &SelectedFile,
) -> Option<WorkbookSummary> {
    match inspector.inspect(file) {
        Ok(summary) => {
            let preview = serde_json::to_string(&summary.preview).unwrap_or_default();
            tracing::info!(
                file = %file.name,
                sheet = %summary.sheet_name,
                records = summary.record_count,
                headers = ?summary.headers,
                %preview,
                "parsed workbook"
            );
            Some(summary)
        }
        Err(e) => {
            tracing::warn!(file = %file.name, error = %e, "workbook inspection failed");
            None
        }
    }
}

/// Turns a header row into unique record keys.
///
/// Blank headers become `__EMPTY`, `__EMPTY_1`, ... and repeated names get a
/// `_1`, `_2`, ... suffix, skipping any suffixed name already taken.
fn record_keys(headers: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .iter()
        .map(|raw| {
            let base = if raw.is_empty() {
                "__EMPTY".to_string()
            } else {
                raw.clone()
            };
            let Some(mut counter) = seen.get(&base).copied() else {
                seen.insert(base.clone(), 1);
                return base;
            };
            let mut key = format!("{base}_{counter}");
            counter += 1;
            while seen.contains_key(&key) {
                key = format!("{base}_{counter}");
                counter += 1;
            }
            seen.insert(base, counter);
            seen.insert(key.clone(), 1);
            key
        })
        .collect()
}

fn to_record(keys: &[String], row: &[Data]) -> Map<String, Value> {
    let mut record = Map::new();
    for (cell, key) in row.iter().zip(keys) {
        if matches!(cell, Data::Empty) {
            continue;
        }
        record.insert(key.clone(), cell_to_value(cell));
    }
    record
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::Empty => Value::Null,
        other => Value::String(other.to_string()),
    }
}
