//! DELETE SQL generation.

use crate::ast::Query;
use crate::error::{ConvertError, ConvertResult};
use crate::transpiler::dml::{dropped_modifiers, returning_clause, where_clause};
use crate::transpiler::traits::{SqlStatement, escape_identifier};

/// Build `DELETE FROM t WHERE ...`. A DELETE without filters is refused.
pub fn build_delete(query: &Query) -> ConvertResult<SqlStatement> {
    if query.filters.is_empty() {
        return Err(ConvertError::delete_no_where(&query.table));
    }
    let mut stmt = SqlStatement::default();
    let mut sql = format!("DELETE FROM {}", escape_identifier(&query.table));
    sql.push_str(&where_clause(query)?);
    if let Some(note) = dropped_modifiers(query) {
        stmt.warn(note);
    }
    sql.push_str(&returning_clause(query, &mut stmt)?);
    stmt.sql = sql;
    Ok(stmt)
}
