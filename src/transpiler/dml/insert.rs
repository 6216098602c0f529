//! INSERT and upsert SQL generation.

use crate::ast::{Body, Operation, Query, Row};
use crate::codec::literal_json;
use crate::error::{ConvertError, ConvertResult};
use crate::transpiler::dml::returning_clause;
use crate::transpiler::joins::ForeignKeyPolicy;
use crate::transpiler::traits::{SqlStatement, escape_identifier};

/// Build `INSERT INTO t (cols) VALUES (...), (...)`, with `ON CONFLICT`
/// for upserts.
///
/// Bulk rows may disagree on keys: the column list is the union of all
/// keys in first-seen order and a missing key renders `NULL`.
pub fn build_insert(query: &Query, policy: &ForeignKeyPolicy) -> ConvertResult<SqlStatement> {
    let rows = body_rows(query)?;
    let mut stmt = SqlStatement::default();

    let mut columns: Vec<&str> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let values: Vec<String> = columns
                .iter()
                .map(|c| row.get(*c).map_or_else(|| "NULL".to_string(), literal_json))
                .collect();
            format!("({})", values.join(", "))
        })
        .collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        escape_identifier(&query.table),
        columns.iter().map(|c| escape_identifier(c)).collect::<Vec<_>>().join(", "),
        tuples.join(", ")
    );

    if query.operation == Operation::Upsert {
        sql.push_str(&on_conflict(query, &columns, policy, &mut stmt));
    }
    sql.push_str(&returning_clause(query, &mut stmt)?);
    stmt.sql = sql;
    Ok(stmt)
}

fn body_rows(query: &Query) -> ConvertResult<Vec<&Row>> {
    match &query.body {
        Some(Body::Params(_)) => Err(ConvertError::invalid_body_shape(query.operation, &query.table)),
        Some(body) if !body.is_empty() => Ok(body.rows()),
        _ => Err(ConvertError::empty_body(query.operation, &query.table)),
    }
}

/// ` ON CONFLICT (target) DO UPDATE SET c = EXCLUDED.c` or `DO NOTHING`.
fn on_conflict(query: &Query, columns: &[&str], policy: &ForeignKeyPolicy, stmt: &mut SqlStatement) -> String {
    let target: Vec<String> = match &query.on_conflict {
        Some(target) => target
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
        None => {
            stmt.warn(format!(
                "no conflict target given; assuming the primary key '{}'",
                policy.primary_key
            ));
            vec![policy.primary_key.clone()]
        }
    };
    let target_sql = target.iter().map(|c| escape_identifier(c)).collect::<Vec<_>>().join(", ");

    let updates: Vec<String> = columns
        .iter()
        .copied()
        .filter(|c| !target.iter().any(|t| t.as_str() == *c))
        .map(|c| {
            let c = escape_identifier(c);
            format!("{} = EXCLUDED.{}", c, c)
        })
        .collect();

    if query.ignore_duplicates || updates.is_empty() {
        format!(" ON CONFLICT ({}) DO NOTHING", target_sql)
    } else {
        format!(" ON CONFLICT ({}) DO UPDATE SET {}", target_sql, updates.join(", "))
    }
}
