use serde::{Deserialize, Serialize};

use crate::ast::{LogicalOp, NullsOrder, Operator, Value};

/// A single comparison in the WHERE clause / query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: Operator,
    pub value: Value,
    #[serde(default)]
    pub negated: bool,
    #[serde(default)]
    pub connective: LogicalOp,
    /// Text-search configuration, e.g. `english` in `fts(english)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
            negated: false,
            connective: LogicalOp::And,
            config: None,
        }
    }

    /// Negate this filter (`not.` prefix).
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Set the text-search configuration.
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nulls: Option<NullsOrder>,
}

impl OrderSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
            nulls: None,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
            nulls: None,
        }
    }

    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }
}
