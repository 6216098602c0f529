//! UPDATE SQL generation.

use crate::ast::{Body, Query};
use crate::codec::literal_json;
use crate::error::{ConvertError, ConvertResult};
use crate::transpiler::dml::{dropped_modifiers, returning_clause, where_clause};
use crate::transpiler::traits::{SqlStatement, escape_identifier};

pub fn build_update(query: &Query) -> ConvertResult<SqlStatement> {
    let row = match &query.body {
        Some(Body::Row(row)) if !row.is_empty() => row,
        Some(Body::Rows(_)) | Some(Body::Params(_)) => {
            return Err(ConvertError::invalid_body_shape(query.operation, &query.table));
        }
        _ => return Err(ConvertError::empty_body(query.operation, &query.table)),
    };

    let mut stmt = SqlStatement::default();
    let assignments: Vec<String> = row
        .iter()
        .map(|(column, value)| format!("{} = {}", escape_identifier(column), literal_json(value)))
        .collect();

    let mut sql = format!(
        "UPDATE {} SET {}",
        escape_identifier(&query.table),
        assignments.join(", ")
    );
    sql.push_str(&where_clause(query)?);
    // An unfiltered UPDATE carries one warning; dropped modifiers join it.
    match (query.filters.is_empty(), dropped_modifiers(query)) {
        (true, Some(note)) => stmt.warn(format!(
            "UPDATE without filters changes every row in '{}'; {}",
            query.table, note
        )),
        (true, None) => stmt.warn(format!("UPDATE without filters changes every row in '{}'", query.table)),
        (false, Some(note)) => stmt.warn(note),
        (false, None) => {}
    }
    sql.push_str(&returning_clause(query, &mut stmt)?);
    stmt.sql = sql;
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Operator, Row};
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_update_with_filter() {
        let query = Query::update("users", row(json!({"name": "Bob", "active": false})))
            .filter("id", Operator::Eq, 1);
        let stmt = build_update(&query).unwrap();
        assert_eq!(stmt.sql, "UPDATE users SET name = 'Bob', active = false WHERE id = 1");
        assert!(stmt.warnings.is_empty());
    }

    #[test]
    fn test_update_without_filters_warns_once() {
        let query = Query::update("users", row(json!({"active": true})));
        let stmt = build_update(&query).unwrap();
        assert_eq!(stmt.sql, "UPDATE users SET active = true");
        assert_eq!(stmt.warnings.len(), 1);
    }

    #[test]
    fn test_unfiltered_update_with_modifiers_still_warns_once() {
        let query = Query::update("users", row(json!({"active": true})))
            .order_by(crate::ast::OrderSpec::asc("id"))
            .limit(10);
        let stmt = build_update(&query).unwrap();
        assert_eq!(stmt.sql, "UPDATE users SET active = true");
        assert_eq!(stmt.warnings.len(), 1);
        assert!(stmt.warnings[0].contains("every row"));
        assert!(stmt.warnings[0].contains("row limits"));

        let stmt = build_update(&query.filter("id", Operator::Gt, 5)).unwrap();
        assert_eq!(stmt.warnings.len(), 1);
        assert!(stmt.warnings[0].contains("row limits"));
    }

    #[test]
    fn test_body_shapes() {
        let mut query = Query::update("users", Row::new());
        assert_eq!(build_update(&query).unwrap_err().code(), "EMPTY_BODY");
        query.body = Some(Body::Rows(vec![row(json!({"a": 1}))]));
        assert_eq!(build_update(&query).unwrap_err().code(), "INVALID_BODY_SHAPE");
        query.body = None;
        assert_eq!(build_update(&query).unwrap_err().code(), "EMPTY_BODY");
    }
}
