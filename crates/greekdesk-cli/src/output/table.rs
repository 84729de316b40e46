use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Format output as tables: scalar result fields first, then one table per
/// nested object (Greeks, snapshots) and per row list (payoff profiles,
/// cash flow schedules, legs). Warnings go to stderr from the caller.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => print_result(result, map),
            _ => print_fields(map),
        },
        Value::Array(rows) => print_rows(rows),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Map<String, Value>, envelope: &Map<String, Value>) {
    print_fields(result);

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Scalars go into a Field/Value table; objects and row lists get their own
/// titled sections after it.
fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut sections: Vec<(&str, &Value)> = Vec::new();

    for (key, val) in map {
        match val {
            Value::Object(_) => sections.push((key.as_str(), val)),
            Value::Array(items) if items.iter().any(Value::is_object) => {
                sections.push((key.as_str(), val))
            }
            _ => builder.push_record([key.as_str(), &format_value(val)]),
        }
    }
    println!("{}", Table::from(builder));

    for (title, section) in sections {
        println!("\n{}:", title);
        match section {
            Value::Object(inner) => print_fields(inner),
            Value::Array(rows) => print_rows(rows),
            _ => {}
        }
    }
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            println!("{}", format_value(item));
        }
        if rows.is_empty() {
            println!("(empty)");
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }
    println!("{}", Table::from(builder));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
