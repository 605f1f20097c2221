use serde_json::{Map, Value};
use std::io;

use super::{cell, row_headers, ROW_LIST_KEYS};

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
///
/// Charge envelopes become `field,value` pairs. Drafts and validation reports
/// are written as the rows of their first non-empty row list, so a band
/// schedule exports as one line per band.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => write_pairs(&mut wtr, result),
            _ => match first_row_list(map) {
                Some(rows) => write_rows(&mut wtr, rows),
                None => write_pairs(&mut wtr, map),
            },
        },
        Value::Array(rows) => write_rows(&mut wtr, rows),
        _ => {
            let _ = wtr.write_record([cell(value)]);
        }
    }

    let _ = wtr.flush();
}

fn first_row_list(map: &Map<String, Value>) -> Option<&[Value]> {
    ROW_LIST_KEYS.iter().find_map(|key| match map.get(*key) {
        Some(Value::Array(rows)) if !rows.is_empty() => Some(rows.as_slice()),
        _ => None,
    })
}

fn write_pairs(wtr: &mut StdoutWriter<'_>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        let _ = wtr.write_record([key.as_str(), &cell(val)]);
    }
}

fn write_rows(wtr: &mut StdoutWriter<'_>, rows: &[Value]) {
    let headers = row_headers(rows);
    if headers.is_empty() {
        for row in rows {
            let _ = wtr.write_record([cell(row)]);
        }
        return;
    }

    let _ = wtr.write_record(&headers);
    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(h.as_str()).map(cell).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&record);
    }
}
