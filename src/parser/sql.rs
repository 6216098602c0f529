//! SQL statement reader.
//!
//! Reads one statement, parsed by `sqlparser` with the PostgreSQL dialect,
//! into a query. Only the subset every syntax can express is accepted:
//!
//! - one table, optionally with `JOIN`/`LEFT JOIN`s that become embeds
//! - AND-ed column conditions (`NOT (a OR b)` is accepted as two negations)
//! - `ORDER BY`, `LIMIT`, `OFFSET`
//! - `INSERT ... VALUES`, `ON CONFLICT`, `UPDATE ... SET`, `DELETE`, `RETURNING`
//!
//! Everything else is rejected with `SQL_UNSUPPORTED` rather than
//! approximated.

use serde_json::Value as JsonValue;
use sqlparser::ast::{
    BinaryOperator, ConflictTarget, Delete, Expr, FromTable, Function, FunctionArg, FunctionArgExpr,
    FunctionArguments, GroupByExpr, Insert, Join, LimitClause, OnConflictAction, OnInsert, OrderByExpr,
    OrderByKind, Select, SelectItem, SetExpr, Statement, TableFactor, UnaryOperator, Update,
    Value as SqlValue,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::{Parser, ParserError};

use crate::ast::{
    Body, Column, EmbeddedResource, Filter, NullsOrder, Operation, Operator, OrderSpec, Query, Row, Value,
};
use crate::codec::parse_wire_value;
use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult};
use crate::parser::Parsed;
use crate::parser::scan::{check_len, excerpt};

/// Parse one SQL statement.
pub fn parse(sql: &str, options: &ConvertOptions) -> ConvertResult<Parsed> {
    check_len(sql, options.max_input_len)?;

    let dialect = PostgreSqlDialect {};
    let statements = Parser::new(&dialect)
        .with_recursion_limit(options.max_depth)
        .try_with_sql(sql)
        .and_then(|mut parser| parser.parse_statements())
        .map_err(|e| match e {
            ParserError::RecursionLimitExceeded => {
                ConvertError::syntax("NESTING_TOO_DEEP", "SQL statement is nested too deeply").at(excerpt(sql))
            }
            other => ConvertError::syntax("SQL_PARSE", other.to_string()).at(excerpt(sql)),
        })?;

    let statement = match statements.as_slice() {
        [statement] => statement,
        [] => return Err(ConvertError::syntax("SQL_PARSE", "no SQL statement found").at(excerpt(sql))),
        _ => {
            return Err(unsupported("only one statement can be converted at a time", sql)
                .hint("split the script and convert each statement on its own"));
        }
    };

    let parsed = match statement {
        Statement::Query(query) => read_query(query)?,
        Statement::Insert(insert) => read_insert(insert)?,
        Statement::Update(update) => read_update(update)?,
        Statement::Delete(delete) => read_delete(delete)?,
        other => {
            return Err(unsupported(
                "only SELECT, INSERT, UPDATE and DELETE can be converted",
                &other.to_string(),
            ));
        }
    };

    tracing::debug!(
        "parsed SQL {} on {} with {} filter(s)",
        parsed.query.operation,
        parsed.query.table,
        parsed.query.filters.len()
    );
    Ok(parsed)
}

fn unsupported(message: &str, fragment: &str) -> ConvertError {
    ConvertError::unsupported("SQL_UNSUPPORTED", message.to_string()).at(excerpt(fragment))
}

/// Which part of the query a column qualifier points at: `None` for the
/// main table, `Some(i)` for embed `i`.
type Target = Option<usize>;

/// Table names and aliases a column may be qualified with.
struct Scope {
    names: Vec<(String, Target)>,
}

impl Scope {
    fn new(table: &str, alias: Option<String>) -> Self {
        let mut scope = Self { names: Vec::new() };
        scope.add(table, alias, None);
        scope
    }

    fn add(&mut self, name: &str, alias: Option<String>, target: Target) {
        self.names.push((name.to_string(), target));
        if let Some(alias) = alias {
            self.names.push((alias, target));
        }
    }

    fn resolve(&self, qualifier: &str) -> ConvertResult<Target> {
        self.names
            .iter()
            .find(|(name, _)| name == qualifier)
            .map(|(_, target)| *target)
            .ok_or_else(|| {
                unsupported("column is qualified with a table that is not in FROM or JOIN", qualifier)
            })
    }
}

fn read_query(query: &sqlparser::ast::Query) -> ConvertResult<Parsed> {
    if query.with.is_some() {
        return Err(unsupported("common table expressions (WITH) are not supported", &query.to_string()));
    }
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(unsupported(
            "only a plain SELECT is supported, not UNION, VALUES or nested queries",
            &query.body.to_string(),
        ));
    };
    reject_select_features(select)?;

    let from = match select.from.as_slice() {
        [from] => from,
        [] => {
            return Err(ConvertError::semantic("NO_TABLE", "SELECT has no FROM table")
                .at(excerpt(&select.to_string()))
                .hint("add FROM <table>"));
        }
        _ => {
            return Err(unsupported("comma-separated FROM tables are not supported", &select.to_string())
                .hint("use JOIN so the second table becomes an embed"));
        }
    };

    let (table, alias, schema) = table_factor(&from.relation)?;
    let mut parsed = Parsed::new(Query::new(Operation::Select, &table));
    warn_schema(&mut parsed, schema);
    let mut scope = Scope::new(&table, alias);

    for join in &from.joins {
        read_join(join, &mut parsed, &mut scope)?;
    }

    for item in &select.projection {
        let (target, column) = read_select_item(item, &scope)?;
        match target {
            None => parsed.query.columns.push(column),
            Some(i) => parsed.query.embeds[i].columns.push(column),
        }
    }

    if let Some(selection) = &select.selection {
        read_where(selection, &scope, &mut parsed.query)?;
    }

    if let Some(order_by) = &query.order_by {
        match &order_by.kind {
            OrderByKind::Expressions(exprs) => {
                for o in exprs {
                    read_order(o, &scope, &mut parsed.query)?;
                }
            }
            OrderByKind::All(_) => return Err(unsupported("ORDER BY ALL is not supported", &order_by.to_string())),
        }
    }

    match &query.limit_clause {
        Some(LimitClause::LimitOffset { limit, offset, .. }) => {
            if let Some(limit) = limit {
                parsed.query.limit = Some(read_count("LIMIT", limit)?);
            }
            if let Some(offset) = offset {
                parsed.query.offset = Some(read_count("OFFSET", &offset.value)?);
            }
        }
        Some(LimitClause::OffsetCommaLimit { offset, limit }) => {
            parsed.query.limit = Some(read_count("LIMIT", limit)?);
            parsed.query.offset = Some(read_count("OFFSET", offset)?);
        }
        None => {}
    }

    if !query.locks.is_empty() {
        parsed.warn("row locking clauses (FOR UPDATE/SHARE) were dropped");
    }
    Ok(parsed)
}

fn reject_select_features(select: &Select) -> ConvertResult<()> {
    if select.distinct.is_some() {
        return Err(unsupported("DISTINCT is not supported", &select.to_string()));
    }
    let grouped = match &select.group_by {
        GroupByExpr::All(_) => true,
        GroupByExpr::Expressions(exprs, ..) => !exprs.is_empty(),
    };
    if grouped || select.having.is_some() {
        return Err(unsupported("GROUP BY and HAVING are not supported", &select.to_string())
            .hint("aggregate on the client, or expose the query as a function and call it over RPC"));
    }
    if !select.named_window.is_empty() {
        return Err(unsupported("window definitions are not supported", &select.to_string()));
    }
    Ok(())
}

/// Name, alias and schema of a plain table reference.
fn table_factor(factor: &TableFactor) -> ConvertResult<(String, Option<String>, Option<String>)> {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            let (table, schema) = split_name(&name.to_string());
            let alias = alias.as_ref().map(|a| a.name.value.clone());
            Ok((table, alias, schema))
        }
        other => Err(unsupported(
            "only plain table names are supported, not subqueries or table functions",
            &other.to_string(),
        )),
    }
}

/// `"public"."users"` → (`users`, `Some("public")`).
fn split_name(name: &str) -> (String, Option<String>) {
    let plain = name.replace('"', "");
    match plain.rsplit_once('.') {
        Some((schema, table)) => (table.to_string(), Some(schema.to_string())),
        None => (plain, None),
    }
}

fn warn_schema(parsed: &mut Parsed, schema: Option<String>) {
    if let Some(schema) = schema {
        parsed.warn(format!(
            "schema '{}' dropped; REST requests select a schema with the Accept-Profile header",
            schema
        ));
    }
}

/// `JOIN rel ON ...` becomes an inner embed, `LEFT JOIN` a plain one.
fn read_join(join: &Join, parsed: &mut Parsed, scope: &mut Scope) -> ConvertResult<()> {
    let (relation, alias, _) = table_factor(&join.relation)?;
    let text = join.to_string();
    let kind = text.trim_start().to_ascii_uppercase();
    let inner = if kind.starts_with("JOIN ") || kind.starts_with("INNER JOIN ") {
        true
    } else if kind.starts_with("LEFT JOIN ") || kind.starts_with("LEFT OUTER JOIN ") {
        false
    } else {
        return Err(unsupported("only INNER and LEFT joins can become embeds", text.trim())
            .hint("rewrite the join as JOIN or LEFT JOIN"));
    };

    let mut embed = EmbeddedResource::new(&relation);
    embed.inner = inner;
    parsed.query.embeds.push(embed);
    scope.add(&relation, alias, Some(parsed.query.embeds.len() - 1));
    parsed.warn(format!(
        "join condition for '{}' dropped; the embed follows the foreign key instead",
        relation
    ));
    Ok(())
}

/// One projection or RETURNING item.
fn read_select_item(item: &SelectItem, scope: &Scope) -> ConvertResult<(Target, Column)> {
    match item {
        SelectItem::Wildcard(_) => Ok((None, Column::star())),
        SelectItem::QualifiedWildcard(..) => {
            let text = item.to_string();
            let qualifier = text.split(".*").next().unwrap_or_default().replace('"', "");
            let (table, _) = split_name(&qualifier);
            Ok((scope.resolve(&table)?, Column::star()))
        }
        SelectItem::UnnamedExpr(expr) => output_column(expr, scope),
        SelectItem::ExprWithAlias { expr, alias } => {
            let (target, mut column) = output_column(expr, scope)?;
            column.alias = Some(alias.value.clone());
            Ok((target, column))
        }
    }
}

fn output_column(expr: &Expr, scope: &Scope) -> ConvertResult<(Target, Column)> {
    match expr {
        Expr::Cast { expr, data_type, .. } => {
            let (target, mut column) = output_column(expr, scope)?;
            column.cast = Some(data_type.to_string().to_ascii_lowercase());
            Ok((target, column))
        }
        Expr::Function(func) if func.over.is_some() => {
            Err(unsupported("window functions are not supported", &expr.to_string()))
        }
        Expr::Function(_) => Err(unsupported("functions and aggregates in the select list are not supported", &expr.to_string())
            .hint("select plain columns, or expose the computation as a function and call it over RPC")),
        _ => {
            let (target, name) = column_ref(expr, scope)?;
            Ok((target, Column::named(name)))
        }
    }
}

/// A plain or qualified column reference.
fn column_ref(expr: &Expr, scope: &Scope) -> ConvertResult<(Target, String)> {
    match expr {
        Expr::Identifier(ident) => Ok((None, ident.value.clone())),
        Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [table, column] | [_, table, column] => Ok((scope.resolve(&table.value)?, column.value.clone())),
            _ => Err(unsupported("unexpected column reference", &expr.to_string())),
        },
        Expr::Nested(inner) => column_ref(inner, scope),
        other => Err(unsupported("expected a column name", &other.to_string())
            .hint("conditions must compare a column with a literal value")),
    }
}

fn read_where(expr: &Expr, scope: &Scope, query: &mut Query) -> ConvertResult<()> {
    let mut found = Vec::new();
    conditions(expr, scope, false, &mut found)?;
    for (target, filter) in found {
        match target {
            None => query.filters.push(filter),
            Some(i) => query.embeds[i].filters.push(filter),
        }
    }
    Ok(())
}

/// Flatten a WHERE tree into AND-ed filters. `negated` is pushed down
/// through `NOT`, so `NOT (a OR b)` reads as `NOT a AND NOT b`.
fn conditions(expr: &Expr, scope: &Scope, negated: bool, out: &mut Vec<(Target, Filter)>) -> ConvertResult<()> {
    match expr {
        Expr::BinaryOp { left, op, right } => match (op, negated) {
            (BinaryOperator::And, false) | (BinaryOperator::Or, true) => {
                conditions(left, scope, negated, out)?;
                conditions(right, scope, negated, out)
            }
            (BinaryOperator::And, true) | (BinaryOperator::Or, false) => {
                Err(ConvertError::unsupported("OR_UNSUPPORTED", "OR conditions are not supported")
                    .at(excerpt(&expr.to_string()))
                    .hint("split the query, or express the condition with IN (...)"))
            }
            _ => {
                out.push(comparison(left, op, right, scope, negated)?);
                Ok(())
            }
        },
        Expr::Nested(inner) => conditions(inner, scope, negated, out),
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => conditions(expr, scope, !negated, out),
        Expr::IsNull(e) => is_filter(e, Value::Null, negated, scope, out),
        Expr::IsNotNull(e) => is_filter(e, Value::Null, !negated, scope, out),
        Expr::IsTrue(e) => is_filter(e, Value::Bool(true), negated, scope, out),
        Expr::IsNotTrue(e) => is_filter(e, Value::Bool(true), !negated, scope, out),
        Expr::IsFalse(e) => is_filter(e, Value::Bool(false), negated, scope, out),
        Expr::IsNotFalse(e) => is_filter(e, Value::Bool(false), !negated, scope, out),
        Expr::InList {
            expr: column,
            list,
            negated: not_in,
        } => {
            let (target, column) = column_ref(column, scope)?;
            let items = list.iter().map(read_value).collect::<ConvertResult<Vec<_>>>()?;
            let mut filter = Filter::new(column, Operator::In, Value::List(items));
            filter.negated = negated != *not_in;
            out.push((target, filter));
            Ok(())
        }
        Expr::Like {
            negated: not_like,
            any,
            expr: column,
            pattern,
            ..
        } => pattern_filter(Operator::Like, column, pattern, *any, negated != *not_like, scope, out, expr),
        Expr::ILike {
            negated: not_like,
            any,
            expr: column,
            pattern,
            ..
        } => pattern_filter(Operator::ILike, column, pattern, *any, negated != *not_like, scope, out, expr),
        Expr::InSubquery { .. } | Expr::Exists { .. } | Expr::Subquery(_) => {
            Err(unsupported("subqueries are not supported", &expr.to_string())
                .hint("use JOIN so the related table becomes an embed"))
        }
        other => Err(unsupported("unsupported condition", &other.to_string())),
    }
}

fn is_filter(
    column: &Expr,
    value: Value,
    negated: bool,
    scope: &Scope,
    out: &mut Vec<(Target, Filter)>,
) -> ConvertResult<()> {
    let (target, column) = column_ref(column, scope)?;
    let mut filter = Filter::new(column, Operator::Is, value);
    filter.negated = negated;
    out.push((target, filter));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn pattern_filter(
    op: Operator,
    column: &Expr,
    pattern: &Expr,
    any: bool,
    negated: bool,
    scope: &Scope,
    out: &mut Vec<(Target, Filter)>,
    whole: &Expr,
) -> ConvertResult<()> {
    if any {
        return Err(unsupported("LIKE ANY is not supported", &whole.to_string()));
    }
    let (target, column) = column_ref(column, scope)?;
    let mut filter = Filter::new(column, op, read_value(pattern)?);
    filter.negated = negated;
    out.push((target, filter));
    Ok(())
}

/// `col <op> literal`, including `col @@ to_tsquery(...)`.
fn comparison(
    left: &Expr,
    op: &BinaryOperator,
    right: &Expr,
    scope: &Scope,
    negated: bool,
) -> ConvertResult<(Target, Filter)> {
    let (target, column) = column_ref(left, scope)?;
    let symbol = op.to_string();

    if symbol == "@@" {
        let Expr::Function(func) = right else {
            return Err(unsupported("@@ needs a text-search function on the right", &right.to_string())
                .hint("write col @@ to_tsquery('english', 'words')"));
        };
        let mut filter = text_search(column, func)?;
        filter.negated = negated;
        return Ok((target, filter));
    }

    let (op, inverted) = match symbol.as_str() {
        "!~" => (Operator::Match, true),
        "!~*" => (Operator::IMatch, true),
        s => match Operator::from_sql(s) {
            Some(op) => (op, false),
            None => {
                return Err(ConvertError::unsupported(
                    "UNKNOWN_OPERATOR",
                    format!("SQL operator '{}' has no filter equivalent", s),
                )
                .at(s.to_string()));
            }
        },
    };

    let mut value = read_value(right)?;
    if matches!(op, Operator::Contains | Operator::ContainedBy | Operator::Overlaps)
        && let Value::String(raw) = &value
    {
        value = parse_wire_value(op, raw);
    }
    let mut filter = Filter::new(column, op, value);
    filter.negated = negated != inverted;
    Ok((target, filter))
}

/// `to_tsquery('value')` or `to_tsquery('config', 'value')`.
fn text_search(column: String, func: &Function) -> ConvertResult<Filter> {
    let name = func.name.to_string();
    let op = Operator::from_ts_function(&name).ok_or_else(|| {
        unsupported("unknown text-search function", &name)
            .hint("use to_tsquery, plainto_tsquery, phraseto_tsquery or websearch_to_tsquery")
    })?;
    let args = function_args(func)?;
    let text = |expr: &Expr| -> ConvertResult<String> {
        match read_value(expr)? {
            Value::String(s) | Value::Number(s) => Ok(s),
            _ => Err(unsupported("text-search arguments must be string literals", &expr.to_string())),
        }
    };
    let (config, query) = match args.as_slice() {
        [query] => (None, text(query)?),
        [config, query] => (Some(text(config)?), text(query)?),
        _ => return Err(unsupported("text-search functions take one or two arguments", &func.to_string())),
    };
    let mut filter = Filter::new(column, op, Value::String(query));
    filter.config = config;
    Ok(filter)
}

fn function_args(func: &Function) -> ConvertResult<Vec<&Expr>> {
    let FunctionArguments::List(list) = &func.args else {
        return Err(unsupported("unexpected function arguments", &func.to_string()));
    };
    list.args
        .iter()
        .map(|arg| match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Ok(expr),
            other => Err(unsupported("only positional function arguments are supported", &other.to_string())),
        })
        .collect()
}

/// A literal on the value side of a condition.
fn read_value(expr: &Expr) -> ConvertResult<Value> {
    match expr {
        Expr::Value(v) => match &v.value {
            SqlValue::Number(n, _) => Ok(Value::Number(n.clone())),
            SqlValue::SingleQuotedString(s) | SqlValue::EscapedStringLiteral(s) => Ok(Value::String(s.clone())),
            SqlValue::Boolean(b) => Ok(Value::Bool(*b)),
            SqlValue::Null => Ok(Value::Null),
            SqlValue::Placeholder(p) => Err(unsupported("bind parameters cannot be converted", p)
                .hint("inline the literal value")),
            other => Ok(Value::String(other.to_string())),
        },
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => match read_value(inner)? {
            Value::Number(n) => Ok(Value::Number(format!("-{}", n))),
            _ => Err(unsupported("only numbers can be negated", &expr.to_string())),
        },
        Expr::Nested(inner) => read_value(inner),
        Expr::Cast { expr: inner, .. } => read_value(inner),
        Expr::Array(array) => Ok(Value::List(
            array.elem.iter().map(read_value).collect::<ConvertResult<Vec<_>>>()?,
        )),
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
            Err(unsupported("comparing two columns is not supported", &expr.to_string())
                .hint("string values need single quotes"))
        }
        Expr::Subquery(_) => Err(unsupported("subqueries are not supported", &expr.to_string())),
        other => Err(unsupported("expected a literal value", &other.to_string())),
    }
}

/// A literal in a VALUES row or SET clause. `'...'::json` and `::jsonb`
/// casts are decoded back into JSON.
fn read_json(expr: &Expr) -> ConvertResult<JsonValue> {
    if let Expr::Cast { expr: inner, data_type, .. } = expr
        && data_type.to_string().to_ascii_lowercase().starts_with("json")
        && let Value::String(text) = read_value(inner)?
    {
        return Ok(serde_json::from_str(&text).unwrap_or(JsonValue::String(text)));
    }
    Ok(read_value(expr)?.to_json())
}

fn read_order(o: &OrderByExpr, scope: &Scope, query: &mut Query) -> ConvertResult<()> {
    let (target, column) = column_ref(&o.expr, scope)?;
    let mut spec = if o.options.asc == Some(false) {
        OrderSpec::desc(column)
    } else {
        OrderSpec::asc(column)
    };
    spec.nulls = o.options.nulls_first.map(|first| if first { NullsOrder::First } else { NullsOrder::Last });
    match target {
        None => query.order.push(spec),
        Some(i) => query.embeds[i].order.push(spec),
    }
    Ok(())
}

fn read_count(clause: &str, expr: &Expr) -> ConvertResult<u64> {
    let invalid = || {
        ConvertError::syntax("INVALID_INTEGER", format!("{} must be a non-negative integer literal", clause))
            .at(expr.to_string())
    };
    match read_value(expr) {
        Ok(Value::Number(n)) => n.parse().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn read_returning(items: &Option<Vec<SelectItem>>, scope: &Scope, query: &mut Query) -> ConvertResult<()> {
    let Some(items) = items else {
        return Ok(());
    };
    query.returning = true;
    for item in items {
        let (_, column) = read_select_item(item, scope)?;
        query.columns.push(column);
    }
    Ok(())
}

fn read_insert(insert: &Insert) -> ConvertResult<Parsed> {
    let (table, schema) = split_name(&insert.table.to_string());
    let mut parsed = Parsed::new(Query::new(Operation::Insert, &table));
    warn_schema(&mut parsed, schema);
    let scope = Scope::new(&table, None);

    let Some(source) = &insert.source else {
        return Err(ConvertError::semantic("EMPTY_BODY", "INSERT has no VALUES").at(table));
    };
    let SetExpr::Values(values) = source.body.as_ref() else {
        return Err(unsupported("only INSERT ... VALUES is supported", &source.to_string()));
    };
    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.clone()).collect();
    if columns.is_empty() {
        return Err(unsupported("INSERT needs an explicit column list", &table)
            .hint("write INSERT INTO t (a, b) VALUES (...)"));
    }

    let mut rows = Vec::with_capacity(values.rows.len());
    for (i, exprs) in values.rows.iter().enumerate() {
        if exprs.len() != columns.len() {
            return Err(ConvertError::semantic(
                "INVALID_BODY_SHAPE",
                format!("row {} has {} values for {} columns", i + 1, exprs.len(), columns.len()),
            )
            .at(excerpt(&values.to_string())));
        }
        let mut row = Row::new();
        for (column, expr) in columns.iter().zip(exprs) {
            row.insert(column.clone(), read_json(expr)?);
        }
        rows.push(row);
    }
    parsed.query.body = Some(if rows.len() == 1 {
        Body::Row(rows.swap_remove(0))
    } else {
        Body::Rows(rows)
    });

    if let Some(on) = &insert.on {
        read_on_conflict(on, &mut parsed)?;
    }
    read_returning(&insert.returning, &scope, &mut parsed.query)?;
    Ok(parsed)
}

fn read_on_conflict(on: &OnInsert, parsed: &mut Parsed) -> ConvertResult<()> {
    let OnInsert::OnConflict(conflict) = on else {
        return Err(unsupported("only ON CONFLICT is supported", &on.to_string()));
    };
    parsed.query.operation = Operation::Upsert;
    match &conflict.conflict_target {
        Some(ConflictTarget::Columns(columns)) => {
            let columns: Vec<String> = columns.iter().map(|c| c.value.clone()).collect();
            parsed.query.on_conflict = Some(columns.join(","));
        }
        Some(ConflictTarget::OnConstraint(name)) => {
            return Err(unsupported("ON CONFLICT ON CONSTRAINT is not supported", &name.to_string())
                .hint("name the conflict columns instead"));
        }
        None => {}
    }
    match &conflict.action {
        OnConflictAction::DoNothing => parsed.query.ignore_duplicates = true,
        OnConflictAction::DoUpdate(update) => {
            if update.selection.is_some() {
                parsed.warn("ON CONFLICT ... WHERE dropped; upserts merge every conflicting row");
            }
            let mut assigned = Vec::with_capacity(update.assignments.len());
            for assignment in &update.assignments {
                let target = assignment.target.to_string().replace('"', "");
                if !is_excluded_column(&assignment.value, &target) {
                    return Err(unsupported(
                        "ON CONFLICT DO UPDATE may only assign EXCLUDED values",
                        &assignment.to_string(),
                    )
                    .hint(format!("write {0} = EXCLUDED.{0}; upserts merge the inserted row", target)));
                }
                assigned.push(target);
            }
            tracing::trace!("upsert assignments: {}", assigned.len());

            let conflict: Vec<&str> = parsed.query.on_conflict.as_deref().unwrap_or("").split(',').collect();
            let merged: Vec<String> = body_columns(&parsed.query)
                .into_iter()
                .filter(|c| !conflict.contains(&c.as_str()))
                .collect();
            if merged.iter().any(|c| !assigned.contains(c)) || assigned.iter().any(|c| !merged.contains(c)) {
                parsed.warn(format!(
                    "DO UPDATE SET {} widened to every inserted column ({}); upserts merge the whole row",
                    assigned.join(", "),
                    merged.join(", ")
                ));
            }
        }
    }
    Ok(())
}

/// `EXCLUDED.<column>`, matched case-insensitively on the pseudo-table.
fn is_excluded_column(expr: &Expr, column: &str) -> bool {
    match expr {
        Expr::CompoundIdentifier(parts) => matches!(
            parts.as_slice(),
            [table, name] if table.value.eq_ignore_ascii_case("excluded") && name.value == column
        ),
        Expr::Nested(inner) => is_excluded_column(inner, column),
        _ => false,
    }
}

/// Inserted columns in first-seen order.
fn body_columns(query: &Query) -> Vec<String> {
    let rows: Vec<&Row> = match &query.body {
        Some(Body::Row(row)) => vec![row],
        Some(Body::Rows(rows)) => rows.iter().collect(),
        _ => Vec::new(),
    };
    let mut columns: Vec<String> = Vec::new();
    for key in rows.iter().flat_map(|row| row.keys()) {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    columns
}

fn read_update(update: &Update) -> ConvertResult<Parsed> {
    if !update.table.joins.is_empty() {
        return Err(unsupported("UPDATE with joins is not supported", &update.table.to_string()));
    }
    let (table, alias, schema) = table_factor(&update.table.relation)?;
    let mut parsed = Parsed::new(Query::new(Operation::Update, &table));
    warn_schema(&mut parsed, schema);
    let scope = Scope::new(&table, alias);

    let mut row = Row::new();
    for assignment in &update.assignments {
        let target = assignment.target.to_string().replace('"', "");
        if target.starts_with('(') {
            return Err(unsupported("tuple assignments are not supported", &assignment.to_string()));
        }
        row.insert(target, read_json(&assignment.value)?);
    }
    parsed.query.body = Some(Body::Row(row));

    if let Some(selection) = &update.selection {
        read_where(selection, &scope, &mut parsed.query)?;
    }
    read_returning(&update.returning, &scope, &mut parsed.query)?;
    Ok(parsed)
}

fn tables_text(tables: &[sqlparser::ast::TableWithJoins]) -> String {
    tables.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
}

fn read_delete(delete: &Delete) -> ConvertResult<Parsed> {
    let tables = match &delete.from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };
    let from = match tables.as_slice() {
        [from] if from.joins.is_empty() => from,
        [] => return Err(ConvertError::semantic("NO_TABLE", "DELETE names no table").hint("add FROM <table>")),
        _ => return Err(unsupported("DELETE from several tables is not supported", &tables_text(tables))),
    };
    let (table, alias, schema) = table_factor(&from.relation)?;
    let mut parsed = Parsed::new(Query::new(Operation::Delete, &table));
    warn_schema(&mut parsed, schema);
    let scope = Scope::new(&table, alias);

    if let Some(selection) = &delete.selection {
        read_where(selection, &scope, &mut parsed.query)?;
    }
    read_returning(&delete.returning, &scope, &mut parsed.query)?;
    Ok(parsed)
}
