use serde_json::Value;

/// Convert an arbitrary JSON claim value into a sanitized string.
pub fn value_to_string(value: Value) -> String {
    let raw = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    strip_control_chars(raw)
}

/// Read a JSON number, or a string holding one, as `f64`.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn strip_control_chars(s: String) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}
