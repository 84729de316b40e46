use serde_json::{Map, Value};
use std::io;

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
///
/// The first block is `field,value` with nested objects flattened to dotted
/// keys (`greeks.delta`). Each list of rows (payoff table, cash flows, legs)
/// follows as its own block with a header, separated by an empty record.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(stdout.lock());

    match value {
        Value::Object(map) => {
            let body = match map.get("result") {
                Some(Value::Object(result)) => result,
                _ => map,
            };
            let mut blocks: Vec<(String, &[Value])> = Vec::new();
            let _ = wtr.write_record(["field", "value"]);
            write_fields(&mut wtr, "", body, &mut blocks);
            for (name, rows) in blocks {
                let _ = wtr.write_record([""]);
                let _ = wtr.write_record([name.as_str()]);
                write_rows(&mut wtr, rows);
            }
        }
        Value::Array(rows) => write_rows(&mut wtr, rows),
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_fields<'v>(
    wtr: &mut StdoutWriter<'_>,
    prefix: &str,
    map: &'v Map<String, Value>,
    blocks: &mut Vec<(String, &'v [Value])>,
) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) => write_fields(wtr, &name, inner, blocks),
            Value::Array(rows) if rows.iter().any(Value::is_object) => {
                blocks.push((name, rows.as_slice()))
            }
            _ => {
                let _ = wtr.write_record([name.as_str(), &format_csv_value(val)]);
            }
        }
    }
}

fn write_rows(wtr: &mut StdoutWriter<'_>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(format_csv_value)
            .collect::<Vec<_>>()
            .join(";"),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
