//! # querybridge
//!
//! Translate one database query between three surface syntaxes:
//!
//! * SQL: `SELECT name FROM users WHERE age >= 18`
//! * PostgREST-style REST: `GET /users?select=name&age=gte.18`
//! * a fluent client chain: `supabase.from('users').select('name').gte('age', 18)`
//!
//! Every syntax is parsed into one canonical [`Query`](ast::Query) and every
//! syntax can be built back from it.
//!
//! ## Quick Example
//!
//! ```
//! use querybridge::prelude::*;
//!
//! let converter = Converter::default();
//! let result = converter
//!     .rest_to_sql(&RestRequest::new("GET", "/users?age=gte.18&status=eq.active"))
//!     .unwrap();
//! assert_eq!(result.output, "SELECT * FROM users WHERE age >= 18 AND status = 'active'");
//! ```
//!
//! ## Operators
//!
//! | Tag | SQL | Tag | SQL |
//! |-----|-----|-----|-----|
//! | `eq` | `=` | `neq` | `!=` |
//! | `gt` / `gte` | `>` / `>=` | `lt` / `lte` | `<` / `<=` |
//! | `like` / `ilike` | `LIKE` / `ILIKE` | `match` / `imatch` | `~` / `~*` |
//! | `cs` / `cd` / `ov` | `@>` / `<@` / `&&` | `is` / `in` | `IS` / `IN` |
//! | `fts` | `@@ to_tsquery` | `wfts` | `@@ websearch_to_tsquery` |

pub mod ast;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod parser;
pub mod transpiler;
pub mod validator;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::ConvertOptions;
    pub use crate::convert::{ConversionResult, Converter, Syntax};
    pub use crate::error::*;
    pub use crate::transpiler::{ForeignKeyPolicy, SqlStatement, ToSql};
}

/// Convert `input` from one syntax to another with default options.
///
/// # Example
///
/// ```
/// use querybridge::{convert, convert::Syntax};
///
/// let result = convert(Syntax::Sql, Syntax::Dsl, "SELECT id FROM users WHERE age >= 18").unwrap();
/// assert_eq!(result.output, "supabase.from('users').select('id').gte('age', 18)");
/// ```
pub fn convert(
    from: convert::Syntax,
    to: convert::Syntax,
    input: &str,
) -> error::ConvertResult<convert::ConversionResult> {
    convert::Converter::default().convert(from, to, input)
}
