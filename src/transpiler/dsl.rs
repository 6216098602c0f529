//! Client DSL builder.
//!
//! Renders a query as one fluent chain on a single line:
//!
//! ```text
//! supabase.from('users').select('id,name').gte('age', 18).order('name').limit(10)
//! ```
//!
//! Mutations put their `.select()` after the filters, the way client code
//! is usually written.

use serde_json::Value as JsonValue;

use crate::ast::{Body, Filter, LogicalOp, NullsOrder, Operation, Operator, Query, SingleMode, Value};
use crate::codec::wire_token;
use crate::error::{ConvertError, ConvertResult};
use crate::transpiler::embed_paths;

/// A built chain and the warnings raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct DslBuild {
    pub code: String,
    pub warnings: Vec<String>,
}

struct Chain {
    code: String,
    warnings: Vec<String>,
}

impl Chain {
    fn call(&mut self, name: &str, args: &[String]) {
        self.code.push('.');
        self.code.push_str(name);
        self.code.push('(');
        self.code.push_str(&args.join(", "));
        self.code.push(')');
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Build the method chain for a query, rooted at `client`.
pub fn build_chain(query: &Query, client: &str) -> ConvertResult<DslBuild> {
    let mut chain = Chain {
        code: client.to_string(),
        warnings: Vec::new(),
    };

    match query.operation {
        Operation::Rpc => rpc_call(query, &mut chain),
        operation => {
            chain.call("from", &[js_string(&query.table)]);
            match operation {
                Operation::Select => select_call(query, &mut chain),
                Operation::Insert => chain.call("insert", &[body_literal(query)?]),
                Operation::Upsert => {
                    let mut args = vec![body_literal(query)?];
                    let mut options = Vec::new();
                    if let Some(target) = &query.on_conflict {
                        options.push(("onConflict", js_string(target)));
                    }
                    if query.ignore_duplicates {
                        options.push(("ignoreDuplicates", "true".to_string()));
                    }
                    if !options.is_empty() {
                        args.push(options_literal(&options));
                    }
                    chain.call("upsert", &args);
                }
                Operation::Update => chain.call("update", &[body_literal(query)?]),
                Operation::Delete => chain.call("delete", &[]),
                Operation::Rpc => {}
            }
        }
    }

    for filter in &query.filters {
        filter_call(filter, &filter.column, &mut chain)?;
    }
    for (path, embed) in embed_paths(&query.embeds) {
        for filter in &embed.filters {
            filter_call(filter, &format!("{}.{}", path, filter.column), &mut chain)?;
        }
    }

    if query.operation.is_mutation() {
        if query.returning {
            returning_call(query, &mut chain);
        }
        if query.count.is_some() {
            chain.warn("count on a mutation has no chain form; dropped");
        }
    }

    for spec in &query.order {
        order_call(spec, None, &mut chain);
    }
    for (path, embed) in embed_paths(&query.embeds) {
        for spec in &embed.order {
            order_call(spec, Some(path.as_str()), &mut chain);
        }
    }

    paging_calls(query, &mut chain);
    for (path, embed) in embed_paths(&query.embeds) {
        if let Some(limit) = embed.limit {
            chain.call(
                "limit",
                &[limit.to_string(), options_literal(&[("referencedTable", js_string(&path))])],
            );
        }
    }

    match query.single {
        Some(SingleMode::One) => chain.call("single", &[]),
        Some(SingleMode::MaybeOne) => chain.call("maybeSingle", &[]),
        None => {}
    }

    tracing::trace!("built DSL chain: {}", chain.code);
    Ok(DslBuild {
        code: chain.code,
        warnings: chain.warnings,
    })
}

fn rpc_call(query: &Query, chain: &mut Chain) {
    let mut args = vec![js_string(&query.table)];
    let params = match &query.body {
        Some(body) if !body.is_empty() => Some(js_literal(&body.to_json())),
        _ => None,
    };
    let mut options = Vec::new();
    if query.head {
        options.push(("head", "true".to_string()));
    }
    if let Some(count) = query.count {
        options.push(("count", js_string(count.as_str())));
    }
    match (params, options.is_empty()) {
        (Some(params), true) => args.push(params),
        (params, false) => {
            args.push(params.unwrap_or_else(|| "{}".to_string()));
            args.push(options_literal(&options));
        }
        (None, true) => {}
    }
    chain.call("rpc", &args);
    if !query.selects_all() || !query.embeds.is_empty() {
        chain.call("select", &[js_string(&query.select_param())]);
    }
}

fn select_call(query: &Query, chain: &mut Chain) {
    let mut options = Vec::new();
    if let Some(count) = query.count {
        options.push(("count", js_string(count.as_str())));
    }
    if query.head {
        options.push(("head", "true".to_string()));
    }
    let all = query.selects_all() && query.embeds.is_empty();
    if all && options.is_empty() {
        chain.call("select", &[]);
        return;
    }
    let columns = if all { "*".to_string() } else { query.select_param() };
    let mut args = vec![js_string(&columns)];
    if !options.is_empty() {
        args.push(options_literal(&options));
    }
    chain.call("select", &args);
}

fn returning_call(query: &Query, chain: &mut Chain) {
    if query.selects_all() && query.embeds.is_empty() {
        chain.call("select", &[]);
    } else {
        chain.call("select", &[js_string(&query.select_param())]);
    }
}

fn body_literal(query: &Query) -> ConvertResult<String> {
    match &query.body {
        Some(Body::Row(row)) => Ok(js_literal(&JsonValue::Object(row.clone()))),
        Some(Body::Rows(rows)) => Ok(js_literal(&JsonValue::Array(
            rows.iter().cloned().map(JsonValue::Object).collect(),
        ))),
        Some(Body::Params(_)) => Err(ConvertError::invalid_body_shape(query.operation, &query.table)),
        None => Err(ConvertError::empty_body(query.operation, &query.table)),
    }
}

/// One filter call. `column` is already prefixed for embeds.
fn filter_call(filter: &Filter, column: &str, chain: &mut Chain) -> ConvertResult<()> {
    if filter.connective == LogicalOp::Or {
        return Err(ConvertError::or_unsupported(column));
    }
    let col = js_string(column);

    if filter.negated {
        let mut tag = filter.op.tag().to_string();
        if let Some(config) = &filter.config {
            tag = format!("{}({})", tag, config);
        }
        chain.call("not", &[col, js_string(&tag), not_value(filter)]);
        return Ok(());
    }

    if filter.op.is_full_text() {
        let mut args = vec![col, js_literal(&filter.value.to_json())];
        let mut options = Vec::new();
        match filter.op {
            Operator::PlFts => options.push(("type", js_string("plain"))),
            Operator::PhFts => options.push(("type", js_string("phrase"))),
            Operator::WFts => options.push(("type", js_string("websearch"))),
            _ => {}
        }
        if let Some(config) = &filter.config {
            options.push(("config", js_string(config)));
        }
        if !options.is_empty() {
            args.push(options_literal(&options));
        }
        chain.call("textSearch", &args);
        return Ok(());
    }

    match filter.op.dsl_method() {
        Some(method) => chain.call(method, &[col, method_value(filter)]),
        None => chain.call(
            "filter",
            &[col, js_string(filter.op.tag()), js_string(&wire_token(filter.op, &filter.value))],
        ),
    }
    Ok(())
}

/// The value argument of a typed filter method.
fn method_value(filter: &Filter) -> String {
    match (filter.op, &filter.value) {
        (Operator::Like | Operator::ILike, Value::String(pattern)) => js_string(&pattern.replace('*', "%")),
        (Operator::In, Value::List(_)) => js_literal(&filter.value.to_json()),
        (Operator::In, other) => js_literal(&JsonValue::Array(vec![other.to_json()])),
        (_, value) => js_literal(&value.to_json()),
    }
}

/// `not()` takes its value in wire form for lists.
fn not_value(filter: &Filter) -> String {
    match &filter.value {
        Value::List(_) => js_string(&wire_token(filter.op, &filter.value)),
        Value::String(pattern) if matches!(filter.op, Operator::Like | Operator::ILike) => {
            js_string(&pattern.replace('*', "%"))
        }
        value => js_literal(&value.to_json()),
    }
}

fn order_call(spec: &crate::ast::OrderSpec, referenced_table: Option<&str>, chain: &mut Chain) {
    let mut options = Vec::new();
    if spec.descending {
        options.push(("ascending", "false".to_string()));
    }
    match spec.nulls {
        Some(NullsOrder::First) => options.push(("nullsFirst", "true".to_string())),
        Some(NullsOrder::Last) => options.push(("nullsFirst", "false".to_string())),
        None => {}
    }
    if let Some(table) = referenced_table {
        options.push(("referencedTable", js_string(table)));
    }
    let mut args = vec![js_string(&spec.column)];
    if !options.is_empty() {
        args.push(options_literal(&options));
    }
    chain.call("order", &args);
}

/// `limit` + `offset` become one `range`; a lone offset has no chain form.
fn paging_calls(query: &Query, chain: &mut Chain) {
    match (query.limit, query.offset) {
        (Some(limit), Some(offset)) => {
            match limit.checked_sub(1).and_then(|span| offset.checked_add(span)) {
                Some(end) => chain.call("range", &[offset.to_string(), end.to_string()]),
                None => {
                    chain.call("limit", &[limit.to_string()]);
                    chain.warn(format!(
                        "offset {} with limit {} has no range form; offset dropped",
                        offset, limit
                    ));
                }
            }
        }
        (Some(limit), None) => chain.call("limit", &[limit.to_string()]),
        (None, Some(offset)) => chain.warn(format!(
            "offset {} without a limit has no chain form; dropped",
            offset
        )),
        (None, None) => {}
    }
    if let Some((from, to)) = query.range {
        chain.call("range", &[from.to_string(), to.to_string()]);
    }
}

/// `{ key: value, ... }`
fn options_literal(options: &[(&str, String)]) -> String {
    let fields: Vec<String> = options.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
    format!("{{ {} }}", fields.join(", "))
}

/// A single-quoted JS string.
pub fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// A JS literal with bare object keys where the key allows it.
pub fn js_literal(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => js_string(s),
        JsonValue::Array(items) => {
            let items: Vec<String> = items.iter().map(js_literal).collect();
            format!("[{}]", items.join(", "))
        }
        JsonValue::Object(map) if map.is_empty() => "{}".to_string(),
        JsonValue::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .map(|(k, v)| {
                    let key = if is_identifier(k) { k.clone() } else { js_string(k) };
                    format!("{}: {}", key, js_literal(v))
                })
                .collect();
            format!("{{ {} }}", fields.join(", "))
        }
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CountMode, EmbeddedResource, OrderSpec, Row};
    use serde_json::json;

    fn chain(query: &Query) -> String {
        build_chain(query, "supabase").unwrap().code
    }

    fn row(value: JsonValue) -> Row {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_select_chain() {
        let query = Query::select("users")
            .columns(["id", "name"])
            .filter("age", Operator::Gte, 18)
            .filter("status", Operator::Eq, "active")
            .order_by(OrderSpec::desc("name"))
            .limit(10);
        assert_eq!(
            chain(&query),
            "supabase.from('users').select('id,name').gte('age', 18).eq('status', 'active')\
             .order('name', { ascending: false }).limit(10)"
        );
    }

    #[test]
    fn test_select_all_and_count() {
        assert_eq!(chain(&Query::select("users")), "supabase.from('users').select()");

        let mut query = Query::select("users");
        query.count = Some(CountMode::Exact);
        query.head = true;
        assert_eq!(
            chain(&query),
            "supabase.from('users').select('*', { count: 'exact', head: true })"
        );
    }

    #[test]
    fn test_filter_forms() {
        let query = Query::select("t")
            .filter("name", Operator::Like, "a*")
            .filter("id", Operator::In, vec![1, 2])
            .filter("code", Operator::Match, "^A")
            .filter("tags", Operator::Contains, vec!["a", "b"]);
        assert_eq!(
            chain(&query),
            "supabase.from('t').select().like('name', 'a%').in('id', [1, 2])\
             .filter('code', 'match', '^A').contains('tags', ['a', 'b'])"
        );
    }

    #[test]
    fn test_negated_filters() {
        let mut query = Query::select("t");
        query.filters.push(Filter::new("id", Operator::In, vec![1, 2]).not());
        query.filters.push(Filter::new("deleted_at", Operator::Is, Value::Null).not());
        query.filters.push(Filter::new("body", Operator::Fts, "cat").with_config("english").not());
        assert_eq!(
            chain(&query),
            "supabase.from('t').select().not('id', 'in', '(1,2)').not('deleted_at', 'is', null)\
             .not('body', 'fts(english)', 'cat')"
        );
    }

    #[test]
    fn test_text_search() {
        let mut query = Query::select("posts");
        query
            .filters
            .push(Filter::new("body", Operator::WFts, "fat rat").with_config("english"));
        assert_eq!(
            chain(&query),
            "supabase.from('posts').select().textSearch('body', 'fat rat', { type: 'websearch', config: 'english' })"
        );
    }

    #[test]
    fn test_embed_modifiers() {
        let mut posts = EmbeddedResource::new("posts").columns(["title"]);
        posts.filters.push(Filter::new("published", Operator::Eq, true));
        posts.order.push(OrderSpec::desc("year"));
        posts.limit = Some(3);
        let query = Query::select("users").columns(["name"]).embed(posts);
        assert_eq!(
            chain(&query),
            "supabase.from('users').select('name,posts(title)').eq('posts.published', true)\
             .order('year', { ascending: false, referencedTable: 'posts' })\
             .limit(3, { referencedTable: 'posts' })"
        );
    }

    #[test]
    fn test_paging() {
        let query = Query::select("users").limit(10).offset(20);
        assert_eq!(chain(&query), "supabase.from('users').select().range(20, 29)");

        let built = build_chain(&Query::select("users").offset(5), "supabase").unwrap();
        assert_eq!(built.code, "supabase.from('users').select()");
        assert_eq!(built.warnings.len(), 1);
    }

    #[test]
    fn test_paging_without_range_form() {
        let built = build_chain(&Query::select("users").limit(u64::MAX).offset(5), "supabase").unwrap();
        assert_eq!(built.code, format!("supabase.from('users').select().limit({})", u64::MAX));
        assert_eq!(built.warnings.len(), 1);

        let built = build_chain(&Query::select("users").limit(0).offset(5), "supabase").unwrap();
        assert_eq!(built.code, "supabase.from('users').select().limit(0)");
        assert_eq!(built.warnings.len(), 1);
        assert!(built.warnings[0].contains("offset 5"));

        let query = Query::select("users").limit(1).offset(u64::MAX);
        assert_eq!(
            chain(&query),
            format!("supabase.from('users').select().range({0}, {0})", u64::MAX)
        );
    }

    #[test]
    fn test_mutations() {
        let query = Query::insert("users", Body::Row(row(json!({"name": "O'Brien", "age": 30}))));
        assert_eq!(
            chain(&query),
            "supabase.from('users').insert({ name: 'O\\'Brien', age: 30 })"
        );

        let mut query = Query::update("users", row(json!({"active": false}))).filter("id", Operator::Eq, 1);
        query.returning = true;
        query.single = Some(SingleMode::One);
        assert_eq!(
            chain(&query),
            "supabase.from('users').update({ active: false }).eq('id', 1).select().single()"
        );

        let mut query = Query::insert("users", Body::Rows(vec![row(json!({"id": 1}))]));
        query.operation = Operation::Upsert;
        query.on_conflict = Some("id".into());
        query.ignore_duplicates = true;
        assert_eq!(
            chain(&query),
            "supabase.from('users').upsert([{ id: 1 }], { onConflict: 'id', ignoreDuplicates: true })"
        );

        let query = Query::delete("users").filter("id", Operator::Eq, 1);
        assert_eq!(chain(&query), "supabase.from('users').delete().eq('id', 1)");
    }

    #[test]
    fn test_rpc() {
        let mut query = Query::new(Operation::Rpc, "add_one");
        query.body = Some(Body::Params(row(json!({"n": 1}))));
        assert_eq!(chain(&query), "supabase.rpc('add_one', { n: 1 })");

        query.body = None;
        query.count = Some(CountMode::Exact);
        assert_eq!(chain(&query), "supabase.rpc('add_one', {}, { count: 'exact' })");
    }

    #[test]
    fn test_js_literal_keys() {
        assert_eq!(js_literal(&json!({"first-name": "a", "b_2": [true, null]})), "{ 'first-name': 'a', b_2: [true, null] }");
    }

    #[test]
    fn test_or_connective_is_rejected() {
        let mut filter = Filter::new("a", Operator::Eq, 1);
        filter.connective = LogicalOp::Or;
        let mut query = Query::select("t");
        query.filters.push(filter);
        assert_eq!(build_chain(&query, "supabase").unwrap_err().code(), "OR_UNSUPPORTED");
    }
}
