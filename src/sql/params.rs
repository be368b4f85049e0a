//! Convert JSON values to the text form every parameter is bound as.
//!
//! Each placeholder carries an explicit cast (`$1::int4`, `$2::jsonb`, ...), so PostgreSQL
//! parses the text with the column's own input function.

use serde_json::Value;

pub fn to_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(v.to_string()),
    }
}

/// Escape `%`, `_` and `\` so a search term matches literally inside `ILIKE`.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
