use regex::Regex;
use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";
pub const DEFAULT_MAX_BYTES: usize = 100_000;

/// Redacts `regex` matches in every string of `value`, then truncates each
/// string to at most `max_bytes` bytes.
pub fn sanitize_value(value: Value, regex: Option<&Regex>, max_bytes: usize) -> Value {
    match value {
        Value::String(text) => {
            let redacted = match regex {
                Some(pattern) => pattern.replace_all(&text, REDACTED).into_owned(),
                None => text,
            };
            Value::String(truncate_str(&redacted, max_bytes).to_string())
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize_value(item, regex, max_bytes))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, sanitize_value(value, regex, max_bytes)))
                .collect(),
        ),
        other => other,
    }
}

/// Longest prefix of `text` within `max_bytes` that ends on a char boundary.
pub fn truncate_str(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
