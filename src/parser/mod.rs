//! Parsers for the three surface syntaxes.
//!
//! Each parser produces a [`Parsed`] query: the canonical [`Query`] plus the
//! non-fatal warnings collected on the way.
//!
//! | Module | Input |
//! |--------|-------|
//! | [`dsl`] | `supabase.from('users').select('id').eq('age', 18)` |
//! | [`rest`] | `GET /users?select=id&age=eq.18` |
//! | [`sql`] | `SELECT id FROM users WHERE age = 18` |

pub mod dsl;
pub mod rest;
pub(crate) mod scan;
pub mod select;
pub mod sql;

use crate::ast::Query;

pub use self::select::{Selection, parse_select};

/// A parsed query and the warnings raised while reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub query: Query,
    pub warnings: Vec<String>,
}

impl Parsed {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
