//! SELECT SQL generation.

use crate::ast::{NullsOrder, OrderSpec, Query, SingleMode};
use crate::error::{ConvertError, ConvertResult};
use crate::transpiler::conditions::conditions_sql;
use crate::transpiler::dml::column_sql;
use crate::transpiler::joins::ForeignKeyPolicy;
use crate::transpiler::traits::{SqlStatement, escape_identifier, qualified};

pub fn build_select(query: &Query, policy: &ForeignKeyPolicy) -> ConvertResult<SqlStatement> {
    let mut stmt = SqlStatement::default();
    let joined = !query.embeds.is_empty();
    let main = joined.then_some(query.table.as_str());

    let plans = query
        .embeds
        .iter()
        .map(|embed| policy.plan(&query.table, embed))
        .collect::<ConvertResult<Vec<_>>>()?;

    // Columns: main table first, then each embed's.
    let mut columns: Vec<String> = Vec::new();
    if query.columns.is_empty() {
        if !joined {
            columns.push("*".to_string());
        }
    } else {
        for column in &query.columns {
            columns.push(column_sql(column, main)?);
        }
    }
    for (embed, plan) in query.embeds.iter().zip(&plans) {
        for column in &embed.columns {
            columns.push(column_sql(column, Some(&plan.qualifier))?);
        }
    }
    if columns.is_empty() {
        columns.push(qualified(main, "*"));
    }

    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), escape_identifier(&query.table));
    for (embed, plan) in query.embeds.iter().zip(&plans) {
        sql.push(' ');
        sql.push_str(&plan.clause);
        stmt.warn(format!(
            "embed '{}' joined on the assumed key {}",
            embed.name(),
            plan.key
        ));
        stmt.metadata.insert(format!("fk.{}", embed.name()), plan.key.clone());
        if let Some(limit) = embed.limit {
            stmt.warn(format!(
                "limit {} on embed '{}' has no JOIN form and was dropped",
                limit,
                embed.name()
            ));
        }
    }

    // WHERE: main filters, then embed filters.
    let mut conditions = conditions_sql(&query.filters, main)?;
    for (embed, plan) in query.embeds.iter().zip(&plans) {
        conditions.extend(conditions_sql(&embed.filters, Some(&plan.qualifier))?);
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    let mut order: Vec<String> = query.order.iter().map(|o| order_sql(o, main)).collect();
    for (embed, plan) in query.embeds.iter().zip(&plans) {
        order.extend(embed.order.iter().map(|o| order_sql(o, Some(&plan.qualifier))));
    }
    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }

    let (limit, offset) = paging(query, &mut stmt)?;
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    response_metadata(query, &mut stmt);
    stmt.sql = sql;
    Ok(stmt)
}

fn order_sql(spec: &OrderSpec, qualifier: Option<&str>) -> String {
    let mut sql = format!(
        "{} {}",
        qualified(qualifier, &spec.column),
        if spec.descending { "DESC" } else { "ASC" }
    );
    match spec.nulls {
        Some(NullsOrder::First) => sql.push_str(" NULLS FIRST"),
        Some(NullsOrder::Last) => sql.push_str(" NULLS LAST"),
        None => {}
    }
    sql
}

/// LIMIT/OFFSET, falling back to the row range when neither is set.
fn paging(query: &Query, stmt: &mut SqlStatement) -> ConvertResult<(Option<u64>, Option<u64>)> {
    match query.range {
        Some((from, to)) if query.limit.is_none() && query.offset.is_none() => {
            let offset = (from > 0).then_some(from);
            let limit = to.saturating_sub(from).checked_add(1).ok_or_else(|| {
                ConvertError::syntax("INVALID_INTEGER", "range spans more rows than a LIMIT can hold")
                    .at(format!("{}-{}", from, to))
            })?;
            Ok((Some(limit), offset))
        }
        Some((from, to)) => {
            stmt.warn(format!(
                "range {}-{} ignored because LIMIT/OFFSET are already set",
                from, to
            ));
            Ok((query.limit, query.offset))
        }
        None => Ok((query.limit, query.offset)),
    }
}

/// Response shaping has no SQL form; it is carried as metadata.
fn response_metadata(query: &Query, stmt: &mut SqlStatement) {
    if let Some(count) = query.count {
        stmt.metadata.insert("count".into(), count.as_str().into());
    }
    if query.head {
        stmt.metadata.insert("head".into(), "true".into());
    }
    match query.single {
        Some(SingleMode::One) => {
            stmt.metadata.insert("single".into(), "one".into());
        }
        Some(SingleMode::MaybeOne) => {
            stmt.metadata.insert("single".into(), "maybe_one".into());
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CountMode, EmbeddedResource, Filter, Operator};

    fn sql(query: &Query) -> SqlStatement {
        build_select(query, &ForeignKeyPolicy::default()).unwrap()
    }

    #[test]
    fn test_simple_select() {
        let query = Query::select("users")
            .filter("age", Operator::Gte, 18)
            .filter("status", Operator::Eq, "active");
        let stmt = sql(&query);
        assert_eq!(stmt.sql, "SELECT * FROM users WHERE age >= 18 AND status = 'active'");
        assert!(stmt.warnings.is_empty());
    }

    #[test]
    fn test_clause_order() {
        let query = Query::select("users")
            .columns(["id", "name"])
            .order_by(OrderSpec::desc("name").nulls(NullsOrder::First))
            .order_by(OrderSpec::asc("id"))
            .limit(10)
            .offset(20);
        assert_eq!(
            sql(&query).sql,
            "SELECT id, name FROM users ORDER BY name DESC NULLS FIRST, id ASC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_range_becomes_limit_offset() {
        let mut query = Query::select("users");
        query.range = Some((10, 19));
        assert_eq!(sql(&query).sql, "SELECT * FROM users LIMIT 10 OFFSET 10");

        query.limit = Some(5);
        let stmt = sql(&query);
        assert_eq!(stmt.sql, "SELECT * FROM users LIMIT 5");
        assert_eq!(stmt.warnings.len(), 1);
    }

    #[test]
    fn test_full_width_range_is_an_error() {
        let mut query = Query::select("users");
        query.range = Some((0, u64::MAX));
        let err = build_select(&query, &ForeignKeyPolicy::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_INTEGER");

        query.range = Some((1, u64::MAX));
        assert_eq!(
            sql(&query).sql,
            format!("SELECT * FROM users LIMIT {} OFFSET 1", u64::MAX)
        );
    }

    #[test]
    fn test_cast_is_checked_before_formatting() {
        let query = Query::select("users").columns(["name::text"]);
        assert_eq!(sql(&query).sql, "SELECT name::text FROM users");

        let query = Query::select("users").columns(["name::text FROM secrets"]);
        let err = build_select(&query, &ForeignKeyPolicy::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_COLUMN");
    }

    #[test]
    fn test_embed_becomes_join() {
        let mut posts = EmbeddedResource::new("posts").columns(["title", "year"]);
        posts.filters.push(Filter::new("published", Operator::Eq, true));
        posts.order.push(OrderSpec::desc("year"));
        posts.limit = Some(3);
        let query = Query::select("users").columns(["name"]).embed(posts);

        let stmt = sql(&query);
        assert_eq!(
            stmt.sql,
            "SELECT users.name, posts.title, posts.year FROM users \
             LEFT JOIN posts ON posts.users_id = users.id \
             WHERE posts.published = true ORDER BY posts.year DESC"
        );
        assert_eq!(stmt.metadata.get("fk.posts").map(String::as_str), Some("posts.users_id = users.id"));
        assert_eq!(stmt.warnings.len(), 2);
    }

    #[test]
    fn test_star_with_embed_is_qualified() {
        let query = Query::select("users").embed(EmbeddedResource::new("posts").columns(["*"]));
        assert_eq!(
            sql(&query).sql,
            "SELECT users.*, posts.* FROM users LEFT JOIN posts ON posts.users_id = users.id"
        );
    }

    #[test]
    fn test_nested_embed_is_rejected() {
        let mut posts = EmbeddedResource::new("posts").columns(["title"]);
        posts.embeds.push(EmbeddedResource::new("comments").columns(["body"]));
        let query = Query::select("users").embed(posts);
        let err = build_select(&query, &ForeignKeyPolicy::default()).unwrap_err();
        assert_eq!(err.code(), "EMBED_TOO_DEEP");
    }

    #[test]
    fn test_response_metadata() {
        let mut query = Query::select("users");
        query.count = Some(CountMode::Exact);
        query.single = Some(SingleMode::One);
        let stmt = sql(&query);
        assert_eq!(stmt.metadata.get("count").map(String::as_str), Some("exact"));
        assert_eq!(stmt.metadata.get("single").map(String::as_str), Some("one"));
    }
}
