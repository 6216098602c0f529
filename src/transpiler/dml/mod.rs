//! One SQL builder per operation.

pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

pub use delete::build_delete;
pub use insert::build_insert;
pub use select::build_select;
pub use update::build_update;

use crate::ast::{Column, Query};
use crate::error::ConvertResult;
use crate::transpiler::conditions::conditions_sql;
use crate::transpiler::traits::{SqlStatement, escape_identifier, qualified};

/// `name::cast AS alias`, qualified when `qualifier` is set.
pub(crate) fn column_sql(column: &Column, qualifier: Option<&str>) -> ConvertResult<String> {
    column.check_cast()?;
    let mut sql = qualified(qualifier, &column.name);
    if let Some(cast) = &column.cast {
        sql.push_str("::");
        sql.push_str(cast);
    }
    if let Some(alias) = &column.alias {
        sql.push_str(" AS ");
        sql.push_str(&escape_identifier(alias));
    }
    Ok(sql)
}

/// ` WHERE a AND b` for the main-table filters, or nothing.
pub(crate) fn where_clause(query: &Query) -> ConvertResult<String> {
    let conditions = conditions_sql(&query.filters, None)?;
    if conditions.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }
}

/// ` RETURNING ...` when the query asks for the affected rows.
pub(crate) fn returning_clause(query: &Query, stmt: &mut SqlStatement) -> ConvertResult<String> {
    if !query.returning {
        return Ok(String::new());
    }
    if !query.embeds.is_empty() {
        stmt.warn("embedded resources cannot be returned from a SQL mutation and were dropped");
    }
    if query.selects_all() {
        return Ok(" RETURNING *".to_string());
    }
    let columns = query
        .columns
        .iter()
        .map(|c| column_sql(c, None))
        .collect::<ConvertResult<Vec<_>>>()?;
    Ok(format!(" RETURNING {}", columns.join(", ")))
}

/// UPDATE and DELETE have no ORDER BY or LIMIT in PostgreSQL.
pub(crate) fn dropped_modifiers(query: &Query) -> Option<String> {
    let dropped = !query.order.is_empty() || query.limit.is_some() || query.offset.is_some() || query.range.is_some();
    dropped.then(|| format!("ordering and row limits have no {} form and were dropped", query.operation))
}
