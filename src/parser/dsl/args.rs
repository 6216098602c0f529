//! Typed access to decoded method-call arguments.

use serde_json::Value as JsonValue;

use crate::ast::Row;
use crate::error::{ConvertError, ConvertResult};

/// The decoded arguments of one call, with the method name for errors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Args<'a> {
    pub method: &'a str,
    pub values: &'a [JsonValue],
}

impl<'a> Args<'a> {
    pub fn new(method: &'a str, values: &'a [JsonValue]) -> Self {
        Self { method, values }
    }

    pub fn get(&self, i: usize) -> Option<&'a JsonValue> {
        self.values.get(i).filter(|v| !v.is_null())
    }

    pub fn value(&self, i: usize) -> ConvertResult<&'a JsonValue> {
        self.values.get(i).ok_or_else(|| self.missing(i))
    }

    /// A string argument. Numbers are accepted as their text.
    pub fn str(&self, i: usize) -> ConvertResult<String> {
        match self.value(i)? {
            JsonValue::String(s) => Ok(s.clone()),
            JsonValue::Number(n) => Ok(n.to_string()),
            other => Err(self.invalid(i, "a string", other)),
        }
    }

    pub fn opt_str(&self, i: usize) -> Option<String> {
        match self.get(i)? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// A non-negative integer argument. Numeric strings are accepted.
    pub fn u64(&self, i: usize) -> ConvertResult<u64> {
        let value = self.value(i)?;
        let parsed = match value {
            JsonValue::Number(n) => n.as_u64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.invalid(i, "a non-negative integer", value))
    }

    /// An object argument.
    pub fn object(&self, i: usize) -> ConvertResult<&'a Row> {
        match self.value(i)? {
            JsonValue::Object(map) => Ok(map),
            other => Err(self.invalid(i, "an object", other)),
        }
    }

    /// The options object at `i`, if present.
    pub fn options(&self, i: usize) -> Option<&'a Row> {
        match self.get(i)? {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn option_bool(&self, i: usize, key: &str) -> Option<bool> {
        self.options(i)?.get(key)?.as_bool()
    }

    pub fn option_str(&self, i: usize, key: &str) -> Option<String> {
        match self.options(i)?.get(key)? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn missing(&self, i: usize) -> ConvertError {
        ConvertError::syntax(
            "INVALID_ARGUMENT",
            format!("{}() expects at least {} argument(s)", self.method, i + 1),
        )
        .at(format!("{}(...)", self.method))
    }

    pub fn invalid(&self, i: usize, expected: &str, got: &JsonValue) -> ConvertError {
        ConvertError::syntax(
            "INVALID_ARGUMENT",
            format!("argument {} of {}() must be {}", i + 1, self.method, expected),
        )
        .at(got.to_string())
    }
}
