//! Builders from the canonical query to each surface syntax.
//!
//! | Module | Output |
//! |--------|--------|
//! | [`dml`] | `SELECT id FROM users WHERE age >= 18` |
//! | [`rest`] | `GET /users?select=id&age=gte.18` |
//! | [`dsl`] | `supabase.from('users').select('id').gte('age', 18)` |

pub mod conditions;
pub mod dml;
pub mod dsl;
pub mod joins;
pub mod rest;
pub mod traits;

pub use self::joins::{ForeignKeyPolicy, JoinPlan};
pub use self::traits::{SqlStatement, ToSql, escape_identifier};

use crate::ast::{EmbeddedResource, Operation, Query};
use crate::error::{ConvertError, ConvertResult};

impl ToSql for Query {
    fn to_sql(&self, policy: &ForeignKeyPolicy) -> ConvertResult<SqlStatement> {
        let stmt = match self.operation {
            Operation::Select => dml::build_select(self, policy)?,
            Operation::Insert | Operation::Upsert => dml::build_insert(self, policy)?,
            Operation::Update => dml::build_update(self)?,
            Operation::Delete => dml::build_delete(self)?,
            Operation::Rpc => {
                return Err(ConvertError::unsupported(
                    "UNSUPPORTED_OPERATION",
                    format!("RPC call '{}' has no SQL statement form", self.table),
                )
                .at(self.table.clone())
                .hint("convert to REST instead: POST /rpc/<function>"));
            }
        };
        tracing::trace!("built SQL: {}", stmt.sql);
        Ok(stmt)
    }
}

/// Every embed with its dotted path, parents before children.
pub(crate) fn embed_paths(embeds: &[EmbeddedResource]) -> Vec<(String, &EmbeddedResource)> {
    fn walk<'a>(path: String, embed: &'a EmbeddedResource, out: &mut Vec<(String, &'a EmbeddedResource)>) {
        out.push((path.clone(), embed));
        for child in &embed.embeds {
            walk(format!("{}.{}", path, child.name()), child, out);
        }
    }
    let mut out = Vec::new();
    for embed in embeds {
        walk(embed.name().to_string(), embed, &mut out);
    }
    out
}
