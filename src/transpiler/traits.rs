//! Builder traits and identifier quoting.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ConvertResult;
use crate::transpiler::joins::ForeignKeyPolicy;

/// SQL reserved words that must be quoted when used as identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "all", "and", "as", "between", "case", "check", "constraint", "create", "default", "delete",
    "distinct", "else", "end", "false", "foreign", "from", "group", "having", "in", "index",
    "inner", "insert", "is", "join", "key", "left", "like", "limit", "not", "null", "offset", "on",
    "or", "order", "outer", "primary", "references", "right", "select", "table", "then", "true",
    "union", "update", "user", "when", "where",
];

/// Quote an identifier if it is a reserved word or contains special chars.
/// Dotted identifiers (`table.column`) are quoted part by part; `*` is kept.
pub fn escape_identifier(name: &str) -> String {
    if name.contains('.') {
        return name
            .split('.')
            .map(escape_single_identifier)
            .collect::<Vec<_>>()
            .join(".");
    }
    escape_single_identifier(name)
}

fn escape_single_identifier(name: &str) -> String {
    if name == "*" {
        return name.to_string();
    }
    let lower = name.to_lowercase();
    let needs_escaping = name.is_empty()
        || RESERVED_WORDS.contains(&lower.as_str())
        || name.chars().any(|c| !c.is_alphanumeric() && c != '_')
        || name.chars().next().is_some_and(|c| c.is_numeric());

    if needs_escaping {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else {
        name.to_string()
    }
}

/// `qualifier.column`, each part quoted as needed.
pub fn qualified(qualifier: Option<&str>, column: &str) -> String {
    match qualifier {
        Some(q) => format!("{}.{}", escape_single_identifier(q), escape_single_identifier(column)),
        None => escape_single_identifier(column),
    }
}

/// A generated SQL statement and what the builder had to assume for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SqlStatement {
    pub sql: String,
    pub warnings: Vec<String>,
    /// Assumptions worth surfacing, e.g. `fk.posts`.
    pub metadata: BTreeMap<String, String>,
}

impl SqlStatement {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Build a SQL statement from a query.
pub trait ToSql {
    fn to_sql(&self, policy: &ForeignKeyPolicy) -> ConvertResult<SqlStatement>;
}
