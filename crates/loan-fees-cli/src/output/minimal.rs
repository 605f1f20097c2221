use serde_json::Value;

use super::cell;

/// Fields that carry the answer of each command, most specific first.
const ANSWER_KEYS: [&str; 5] = ["chargeAmount", "value", "valid", "feeColumnLabel", "confirmed"];

/// Print just the answer: the charge, the resolved value, or whether a
/// draft is valid. Falls back to the first field.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let Value::Object(map) = result else {
        println!("{}", cell(result));
        return;
    };

    let answer = ANSWER_KEYS
        .iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()));

    match answer {
        Some(v) => println!("{}", cell(v)),
        None => {
            if let Some((key, val)) = map.iter().next() {
                println!("{}: {}", key, cell(val));
            }
        }
    }
}
