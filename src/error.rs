//! Error types for querybridge.

use thiserror::Error;

use crate::ast::Operation;

/// The error returned by every conversion direction.
///
/// Each variant carries a stable `code` callers can match on, the offending
/// `fragment` of the input, and a human-readable `hint`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// Malformed input: bad body payload, unparsable filter, no DSL root.
    #[error("Syntax error [{code}]: {message}")]
    Syntax {
        code: &'static str,
        message: String,
        fragment: String,
        hint: String,
    },

    /// Structurally valid but meaningless: missing table, DELETE without filter.
    #[error("Semantic error [{code}]: {message}")]
    Semantic {
        code: &'static str,
        message: String,
        fragment: String,
        hint: String,
    },

    /// Recognized but intentionally not implemented: OR groups, CTEs, deep embeds.
    #[error("Unsupported error [{code}]: {message}")]
    Unsupported {
        code: &'static str,
        message: String,
        fragment: String,
        hint: String,
    },
}

/// Error kind, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Semantic,
    Unsupported,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "syntax"),
            ErrorKind::Semantic => write!(f, "semantic"),
            ErrorKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

impl ConvertError {
    /// Create a syntax error.
    pub fn syntax(code: &'static str, message: impl Into<String>) -> Self {
        Self::Syntax {
            code,
            message: message.into(),
            fragment: String::new(),
            hint: String::new(),
        }
    }

    /// Create a semantic error.
    pub fn semantic(code: &'static str, message: impl Into<String>) -> Self {
        Self::Semantic {
            code,
            message: message.into(),
            fragment: String::new(),
            hint: String::new(),
        }
    }

    /// Create an unsupported-feature error.
    pub fn unsupported(code: &'static str, message: impl Into<String>) -> Self {
        Self::Unsupported {
            code,
            message: message.into(),
            fragment: String::new(),
            hint: String::new(),
        }
    }

    /// Attach the offending input fragment.
    pub fn at(mut self, input: impl Into<String>) -> Self {
        match &mut self {
            Self::Syntax { fragment, .. }
            | Self::Semantic { fragment, .. }
            | Self::Unsupported { fragment, .. } => *fragment = input.into(),
        }
        self
    }

    /// Attach a hint telling the caller how to fix the input.
    pub fn hint(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            Self::Syntax { hint, .. } | Self::Semantic { hint, .. } | Self::Unsupported { hint, .. } => {
                *hint = text.into()
            }
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax { .. } => ErrorKind::Syntax,
            Self::Semantic { .. } => ErrorKind::Semantic,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    /// The stable error code, e.g. `DELETE_NO_WHERE`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Syntax { code, .. } | Self::Semantic { code, .. } | Self::Unsupported { code, .. } => code,
        }
    }

    pub fn fragment(&self) -> &str {
        match self {
            Self::Syntax { fragment, .. }
            | Self::Semantic { fragment, .. }
            | Self::Unsupported { fragment, .. } => fragment,
        }
    }

    pub fn hint_text(&self) -> &str {
        match self {
            Self::Syntax { hint, .. } | Self::Semantic { hint, .. } | Self::Unsupported { hint, .. } => hint,
        }
    }
}

/// Errors raised from more than one stage share one constructor, so the
/// message and hint read the same whichever direction hit them.
impl ConvertError {
    pub fn delete_no_where(table: &str) -> Self {
        Self::semantic("DELETE_NO_WHERE", format!("DELETE on '{}' has no filter", table))
            .at(table.to_string())
            .hint("add a filter such as id=eq.1; deleting every row is refused")
    }

    pub fn empty_body(operation: Operation, table: &str) -> Self {
        let hint = match operation {
            Operation::Update => "pass an object of column values",
            _ => "pass an object or a non-empty array of objects",
        };
        Self::semantic("EMPTY_BODY", format!("{} has no body", operation))
            .at(table.to_string())
            .hint(hint)
    }

    pub fn invalid_body_shape(operation: Operation, table: &str) -> Self {
        let (message, hint) = match operation {
            Operation::Update => (
                "UPDATE takes exactly one object",
                "send one object of column values; arrays are for inserts",
            ),
            _ => (
                "rows must be an object or an array of objects",
                "function parameters belong to rpc(), not to a table write",
            ),
        };
        Self::semantic("INVALID_BODY_SHAPE", format!("{}: {}", operation, message))
            .at(table.to_string())
            .hint(hint)
    }

    pub fn or_unsupported(column: &str) -> Self {
        Self::unsupported("OR_UNSUPPORTED", "OR filter groups are not supported")
            .at(column.to_string())
            .hint("split the query, or express the condition with in()")
    }

    /// `item` is the embed's select-list form.
    pub fn embed_too_deep(name: &str, item: impl Into<String>) -> Self {
        Self::unsupported(
            "EMBED_TOO_DEEP",
            format!("embed '{}' nests further embeds, which SQL output cannot express", name),
        )
        .at(item)
        .hint("flatten the select to one level of embeds")
    }
}

/// Result type alias for conversions.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors raised while loading [`crate::config::ConvertOptions`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConvertError::semantic("DELETE_NO_WHERE", "DELETE requires at least one filter");
        assert_eq!(
            err.to_string(),
            "Semantic error [DELETE_NO_WHERE]: DELETE requires at least one filter"
        );
    }

    #[test]
    fn test_shared_constructors() {
        let err = ConvertError::delete_no_where("users");
        assert_eq!(err.kind(), ErrorKind::Semantic);
        assert_eq!(err.fragment(), "users");

        let err = ConvertError::invalid_body_shape(Operation::Update, "users");
        assert_eq!(err.code(), "INVALID_BODY_SHAPE");
        assert!(err.to_string().contains("exactly one object"));

        let err = ConvertError::embed_too_deep("posts", "posts(comments(body))");
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(err.fragment(), "posts(comments(body))");
    }

    #[test]
    fn test_error_builders() {
        let err = ConvertError::syntax("INVALID_FILTER", "missing operator")
            .at("age=18")
            .hint("use age=eq.18");
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.code(), "INVALID_FILTER");
        assert_eq!(err.fragment(), "age=18");
        assert_eq!(err.hint_text(), "use age=eq.18");
    }
}
