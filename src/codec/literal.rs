//! Value literalization.
//!
//! Every SQL literal and every wire value token is produced here. Builders
//! never format values themselves, so escaping is identical in every
//! direction.

use serde_json::Value as JsonValue;

use crate::ast::{Operator, Value, is_numeric};

/// Single-quote a string, doubling embedded quotes: `O'Brien` -> `'O''Brien'`.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Render a filter value as a SQL literal for `op`.
///
/// `config` is the text-search configuration of full-text operators.
pub fn literalize(op: Operator, value: &Value, config: Option<&str>) -> String {
    if let Some(function) = op.ts_function() {
        let text = scalar_text(value);
        return match config {
            Some(cfg) => format!("{}({}, {})", function, quote(cfg), quote(&text)),
            None => format!("{}({})", function, quote(&text)),
        };
    }

    match op {
        Operator::In => {
            let items = list_items(value);
            let rendered: Vec<String> = items.iter().map(scalar_literal).collect();
            format!("({})", rendered.join(", "))
        }
        Operator::Is => is_keyword(value),
        Operator::Like | Operator::ILike => match value {
            Value::String(pattern) => quote(&pattern.replace('*', "%")),
            other => scalar_literal(other),
        },
        Operator::Contains | Operator::ContainedBy | Operator::Overlaps => match value {
            Value::List(items) => quote(&array_literal(items)),
            other => scalar_literal(other),
        },
        _ => scalar_literal(value),
    }
}

/// Render a JSON body value as a SQL literal.
///
/// JSON strings are always quoted; nested arrays and objects become their
/// quoted JSON text.
pub fn literal_json(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => quote(s),
        JsonValue::Array(_) | JsonValue::Object(_) => quote(&value.to_string()),
    }
}

/// Render a filter value as the wire token after `op.`.
pub fn wire_token(op: Operator, value: &Value) -> String {
    if op.is_full_text() {
        return scalar_text(value);
    }
    match op {
        Operator::In => match value {
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(wire_list_item).collect();
                format!("({})", rendered.join(","))
            }
            Value::String(s) if s.starts_with('(') && s.ends_with(')') => s.clone(),
            other => format!("({})", wire_list_item(other)),
        },
        Operator::Is => match value {
            Value::String(s) => s.to_ascii_lowercase(),
            other => scalar_text(other),
        },
        Operator::Like | Operator::ILike => match value {
            Value::String(pattern) => pattern.replace('%', "*"),
            other => scalar_text(other),
        },
        _ => match value {
            Value::List(items) => array_literal(items),
            other => scalar_text(other),
        },
    }
}

/// Type a wire token for `op`: `in` lists are split, array operators read
/// `{a,b}`, `is` reads its keyword, pattern and text-search values stay text.
pub fn parse_wire_value(op: Operator, raw: &str) -> Value {
    if op.is_full_text() {
        return Value::String(raw.to_string());
    }
    match op {
        Operator::In => Value::List(parse_list(raw)),
        Operator::Is => Value::from_wire(&raw.to_ascii_lowercase()),
        Operator::Like | Operator::ILike | Operator::Match | Operator::IMatch => {
            Value::String(raw.to_string())
        }
        Operator::Contains | Operator::ContainedBy | Operator::Overlaps => {
            let is_json_object = serde_json::from_str::<serde_json::Map<String, JsonValue>>(raw).is_ok();
            if raw.starts_with('{') && raw.ends_with('}') && !is_json_object {
                Value::List(parse_delimited(&raw[1..raw.len() - 1]))
            } else {
                Value::String(raw.to_string())
            }
        }
        _ => Value::from_wire(raw),
    }
}

/// Split a parenthesized wire list `(a,"b,c",3)` into typed items.
pub fn parse_list(raw: &str) -> Vec<Value> {
    let raw = raw.trim();
    let inner = raw
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(raw);
    parse_delimited(inner)
}

fn parse_delimited(inner: &str) -> Vec<Value> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            ',' if !in_quotes => {
                items.push(list_value(&current, quoted));
                current.clear();
                quoted = false;
            }
            c => current.push(c),
        }
    }
    items.push(list_value(&current, quoted));
    items
}

fn list_value(token: &str, quoted: bool) -> Value {
    if quoted {
        Value::String(token.to_string())
    } else {
        Value::from_wire(token.trim())
    }
}

fn list_items(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.clone(),
        Value::String(s) => parse_list(s),
        other => vec![other.clone()],
    }
}

/// The literal rule for one scalar token.
fn scalar_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.clone(),
        Value::String(s) => match s.as_str() {
            "null" => "NULL".to_string(),
            "true" | "false" => s.clone(),
            t if is_numeric(t) => t.to_string(),
            t => quote(t),
        },
        Value::List(items) => quote(&array_literal(items)),
    }
}

fn is_keyword(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            kw @ ("null" | "true" | "false" | "unknown") => kw.to_ascii_uppercase(),
            _ => quote(s),
        },
        other => scalar_literal(other),
    }
}

/// Unquoted text of a scalar, as it appears on the wire.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.clone(),
        Value::String(s) => s.clone(),
        Value::List(items) => array_literal(items),
    }
}

/// Postgres array literal: `{a,"b c",NULL}`.
fn array_literal(items: &[Value]) -> String {
    let rendered: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::String(s) if needs_quoting(s, &[',', '{', '}', '"', '\\', ' ']) => {
                double_quote(s)
            }
            other => scalar_text(other),
        })
        .collect();
    format!("{{{}}}", rendered.join(","))
}

fn wire_list_item(value: &Value) -> String {
    match value {
        Value::String(s) if needs_quoting(s, &[',', '(', ')', '"', '\\']) => double_quote(s),
        Value::String(s) if s.trim() != s => double_quote(s),
        other => scalar_text(other),
    }
}

fn needs_quoting(s: &str, reserved: &[char]) -> bool {
    s.is_empty() || s.chars().any(|c| reserved.contains(&c))
}

fn double_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
