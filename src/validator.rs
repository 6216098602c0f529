//! Structural checks between parse and build.
//!
//! Parsers accept anything their grammar can express; the validator
//! rejects queries no target could execute safely, and queries the chosen
//! target has no form for.

use crate::ast::{Body, EmbeddedResource, Filter, LogicalOp, Operation, Query};
use crate::convert::Syntax;
use crate::error::{ConvertError, ConvertResult};

/// Validate `query` before building it in `target` syntax.
pub fn validate(query: &Query, target: Syntax) -> ConvertResult<()> {
    if query.table.trim().is_empty() {
        return Err(ConvertError::semantic("NO_TABLE", "query names no table")
            .hint("the first path segment, FROM clause or from() call names the table"));
    }

    check_connectives(&query.filters)?;
    for embed in &query.embeds {
        check_embed(embed)?;
    }

    if query.operation == Operation::Delete && query.filters.is_empty() {
        return Err(ConvertError::delete_no_where(&query.table));
    }

    check_body(query)?;

    if target == Syntax::Sql {
        if query.operation == Operation::Rpc {
            return Err(ConvertError::unsupported(
                "UNSUPPORTED_OPERATION",
                format!("RPC call '{}' has no SQL statement form", query.table),
            )
            .at(query.table.clone())
            .hint("convert to rest instead: POST /rpc/<function>"));
        }
        if let Some(embed) = query.embeds.iter().find(|e| e.depth() > 1) {
            return Err(ConvertError::embed_too_deep(embed.name(), embed.to_select_item()));
        }
    }
    Ok(())
}

fn check_connectives(filters: &[Filter]) -> ConvertResult<()> {
    match filters.iter().find(|f| f.connective == LogicalOp::Or) {
        Some(filter) => Err(ConvertError::or_unsupported(&filter.column)),
        None => Ok(()),
    }
}

fn check_embed(embed: &EmbeddedResource) -> ConvertResult<()> {
    check_connectives(&embed.filters)?;
    embed.embeds.iter().try_for_each(check_embed)
}

fn check_body(query: &Query) -> ConvertResult<()> {
    let body = query.body.as_ref();
    let (operation, table) = (query.operation, query.table.as_str());
    match operation {
        Operation::Insert | Operation::Upsert => match body {
            Some(Body::Params(_)) => Err(ConvertError::invalid_body_shape(operation, table)),
            Some(body) if !body.is_empty() => Ok(()),
            _ => Err(ConvertError::empty_body(operation, table)),
        },
        Operation::Update => match body {
            Some(Body::Row(row)) if !row.is_empty() => Ok(()),
            Some(Body::Rows(_)) | Some(Body::Params(_)) => Err(ConvertError::invalid_body_shape(operation, table)),
            _ => Err(ConvertError::empty_body(operation, table)),
        },
        _ => Ok(()),
    }
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
    fn test_valid_select() {
        let query = Query::select("users").filter("id", Operator::Eq, 1);
        for target in [Syntax::Sql, Syntax::Rest, Syntax::Dsl] {
            assert!(validate(&query, target).is_ok());
        }
    }

    #[test]
    fn test_no_table() {
        let err = validate(&Query::select(""), Syntax::Sql).unwrap_err();
        assert_eq!(err.code(), "NO_TABLE");
    }

    #[test]
    fn test_delete_without_filter_in_every_target() {
        for target in [Syntax::Sql, Syntax::Rest, Syntax::Dsl] {
            let err = validate(&Query::delete("users"), target).unwrap_err();
            assert_eq!(err.code(), "DELETE_NO_WHERE");
        }
    }

    #[test]
    fn test_or_connective_in_embed() {
        let mut filter = Filter::new("a", Operator::Eq, 1);
        filter.connective = LogicalOp::Or;
        let mut posts = EmbeddedResource::new("posts");
        posts.filters.push(filter);
        let query = Query::select("users").embed(posts);
        assert_eq!(validate(&query, Syntax::Rest).unwrap_err().code(), "OR_UNSUPPORTED");
    }

    #[test]
    fn test_rpc_has_no_sql_form() {
        let query = Query::new(Operation::Rpc, "add_one");
        assert_eq!(validate(&query, Syntax::Sql).unwrap_err().code(), "UNSUPPORTED_OPERATION");
        assert!(validate(&query, Syntax::Rest).is_ok());
    }

    #[test]
    fn test_nested_embeds_only_fail_for_sql() {
        let mut posts = EmbeddedResource::new("posts");
        posts.embeds.push(EmbeddedResource::new("comments"));
        let query = Query::select("users").embed(posts);
        assert_eq!(validate(&query, Syntax::Sql).unwrap_err().code(), "EMBED_TOO_DEEP");
        assert!(validate(&query, Syntax::Dsl).is_ok());
    }

    #[test]
    fn test_errors_match_the_sql_builders() {
        use crate::transpiler::ForeignKeyPolicy;
        use crate::transpiler::dml::{build_insert, build_update};

        let query = Query::update("users", Row::new()).filter("id", Operator::Eq, 1);
        assert_eq!(validate(&query, Syntax::Sql).unwrap_err(), build_update(&query).unwrap_err());

        let query = Query::insert("users", Body::Params(row(json!({"a": 1}))));
        assert_eq!(
            validate(&query, Syntax::Sql).unwrap_err(),
            build_insert(&query, &ForeignKeyPolicy::default()).unwrap_err()
        );

        let mut posts = EmbeddedResource::new("posts");
        posts.embeds.push(EmbeddedResource::new("comments"));
        let query = Query::select("users").embed(posts.clone());
        assert_eq!(
            validate(&query, Syntax::Sql).unwrap_err(),
            ForeignKeyPolicy::default().plan("users", &posts).unwrap_err()
        );
    }

    #[test]
    fn test_body_shapes() {
        let query = Query::new(Operation::Insert, "users");
        assert_eq!(validate(&query, Syntax::Rest).unwrap_err().code(), "EMPTY_BODY");

        let query = Query::insert("users", Body::Params(row(json!({"a": 1}))));
        assert_eq!(validate(&query, Syntax::Sql).unwrap_err().code(), "INVALID_BODY_SHAPE");

        let mut query = Query::update("users", row(json!({"a": 1})));
        query.body = Some(Body::Rows(vec![row(json!({"a": 1}))]));
        assert_eq!(validate(&query, Syntax::Sql).unwrap_err().code(), "INVALID_BODY_SHAPE");

        let query = Query::update("users", Row::new());
        assert_eq!(validate(&query, Syntax::Dsl).unwrap_err().code(), "EMPTY_BODY");
    }
}
