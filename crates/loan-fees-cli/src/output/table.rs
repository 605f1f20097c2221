use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{cell, row_headers, ROW_LIST_KEYS};

/// Format output as tables: scalar fields first, then one table per row list
/// (validation issues, band schedules).
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => print_envelope(result, map),
            _ => print_object(map),
        },
        Value::Array(rows) => print_rows(rows),
        _ => println!("{}", value),
    }
}

fn print_envelope(result: &Map<String, Value>, envelope: &Map<String, Value>) {
    print_object(result);

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(methodology)) = envelope.get("methodology") {
        println!("\nMethodology: {}", methodology);
    }
}

fn print_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        if is_row_list(key, val) {
            continue;
        }
        builder.push_record([key.as_str(), &cell(val)]);
    }
    println!("{}", Table::from(builder));

    for key in ROW_LIST_KEYS {
        if let Some(Value::Array(rows)) = map.get(key) {
            if !rows.is_empty() {
                println!("\n{}:", key);
                print_rows(rows);
            }
        }
    }
}

fn print_rows(rows: &[Value]) {
    if rows.is_empty() {
        println!("(empty)");
        return;
    }

    let headers = row_headers(rows);
    if headers.is_empty() {
        for row in rows {
            println!("{}", cell(row));
        }
        return;
    }

    let mut builder = Builder::default();
    builder.push_record(headers.iter().map(String::as_str));
    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(h.as_str()).map(cell).unwrap_or_default())
            .collect();
        builder.push_record(record);
    }
    println!("{}", Table::from(builder));
}

fn is_row_list(key: &str, value: &Value) -> bool {
    ROW_LIST_KEYS.contains(&key) && value.is_array()
}
