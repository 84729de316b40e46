use serde_json::Value;

/// Result fields that answer each command, in priority order.
const PRIORITY_KEYS: [&str; 5] = [
    "price",
    "forward_price",
    "year_fraction",
    "historical_vol",
    "implied_vol",
];

/// Print just the headline number of the result.
///
/// Looks inside the `result` envelope (and a nested `analysis` object for
/// market-data option pricing) for the first priority field, then falls back
/// to the first field.
pub fn print_minimal(value: &Value) {
    let mut result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);
    if let Some(inner) = result_obj.get("analysis") {
        result_obj = inner;
    }

    if let Value::Object(map) = result_obj {
        let headline = PRIORITY_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|val| !val.is_null());
        if let Some(val) = headline {
            println!("{}", format_minimal(val));
            return;
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
