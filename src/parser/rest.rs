//! REST wire parser.
//!
//! Reads a PostgREST-style request into a query:
//!
//! ```text
//! GET /users?select=name,posts(title)&age=gte.18&order=name.desc&limit=10
//! Prefer: count=exact
//! ```
//!
//! The `select` parameter is read first so that `posts.title=eq.x`,
//! `posts.order` and `posts.limit` can find the embed they address.

use percent_encoding::percent_decode_str;
use serde_json::Value as JsonValue;

use crate::ast::{
    Body, CountMode, EmbeddedResource, Filter, HttpMethod, NullsOrder, Operation, Operator, OrderSpec,
    Query, RestRequest, Row, SingleMode,
};
use crate::codec::parse_wire_value;
use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult};
use crate::parser::scan::{check_size, excerpt, split_top_level};
use crate::parser::{Parsed, parse_select};

/// `Accept` value asking for a single object instead of an array.
pub const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Parse a raw REST request.
pub fn parse(request: &RestRequest, options: &ConvertOptions) -> ConvertResult<Parsed> {
    let size = request.path.len() + request.query.len() + request.body.as_deref().map_or(0, str::len);
    check_size(size, options.max_input_len)?;

    let (operation, table, head) = resolve_target(request)?;
    let mut parsed = Parsed::new(Query::new(operation, table));
    parsed.query.head = head;

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(request.query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let select = pairs
        .iter()
        .find(|(k, v)| k == "select" && reserved_filter(k, v, options.max_depth).is_none());
    if let Some((_, select)) = select {
        let selection = parse_select(select, options.max_depth)?;
        parsed.query.columns = selection.columns;
        parsed.query.embeds = selection.embeds;
        parsed.warnings.extend(selection.warnings);
    } else if parsed.query.operation == Operation::Select {
        parsed.query.columns = vec![crate::ast::Column::star()];
    }

    for (key, value) in &pairs {
        apply_param(&mut parsed, key, value, options)?;
    }

    apply_headers(&mut parsed, request)?;
    apply_body(&mut parsed, request)?;

    tracing::debug!(
        "parsed REST {} {} as {} with {} filter(s)",
        request.method,
        request.path,
        parsed.query.operation,
        parsed.query.filters.len()
    );
    Ok(parsed)
}

/// Operation and table from the method and path. The third field is true
/// for `HEAD`.
fn resolve_target(request: &RestRequest) -> ConvertResult<(Operation, String, bool)> {
    let mut path = request.path.trim().to_string();
    if path.starts_with("http://") || path.starts_with("https://") {
        let url = url::Url::parse(&path).map_err(|e| {
            ConvertError::syntax("INVALID_REQUEST", format!("invalid URL: {}", e)).at(path.clone())
        })?;
        path = url.path().to_string();
    }
    let path = path.strip_prefix("/rest/v1").unwrap_or(&path);
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect();

    let no_table = || {
        ConvertError::semantic("NO_TABLE", "request path names no table")
            .at(request.path.clone())
            .hint("use a path such as /users")
    };

    let method = request.method.trim().to_ascii_uppercase();
    if segments.first().map(String::as_str) == Some("rpc") {
        let name = segments.get(1).cloned().ok_or_else(no_table)?;
        return match method.as_str() {
            "GET" | "POST" => Ok((Operation::Rpc, name, false)),
            "HEAD" => Ok((Operation::Rpc, name, true)),
            _ => Err(unsupported_method(&request.method)),
        };
    }

    let table = segments.first().cloned().ok_or_else(no_table)?;
    if segments.len() > 1 {
        return Err(ConvertError::syntax(
            "INVALID_REQUEST",
            format!("unexpected path segments after '{}'", table),
        )
        .at(request.path.clone()));
    }

    if method == "HEAD" {
        return Ok((Operation::Select, table, true));
    }
    let operation = match HttpMethod::parse(&method) {
        Some(HttpMethod::Get) => Operation::Select,
        Some(HttpMethod::Post) => Operation::Insert,
        Some(HttpMethod::Patch) => Operation::Update,
        Some(HttpMethod::Delete) => Operation::Delete,
        _ => return Err(unsupported_method(&request.method)),
    };
    Ok((operation, table, false))
}

fn unsupported_method(method: &str) -> ConvertError {
    ConvertError::unsupported("UNSUPPORTED_METHOD", format!("HTTP method '{}' is not supported", method))
        .at(method.to_string())
        .hint("use GET, POST, PATCH or DELETE")
}

fn apply_param(parsed: &mut Parsed, key: &str, value: &str, options: &ConvertOptions) -> ConvertResult<()> {
    if let Some(filter) = reserved_filter(key, value, options.max_depth) {
        parsed.query.filters.push(filter);
        return Ok(());
    }
    match key {
        "select" => {}
        "order" => {
            let specs = parse_order(value, options.max_depth)?;
            parsed.query.order.extend(specs);
        }
        "limit" => parsed.query.limit = Some(parse_integer(key, value)?),
        "offset" => parsed.query.offset = Some(parse_integer(key, value)?),
        "on_conflict" => parsed.query.on_conflict = Some(value.to_string()),
        "columns" => tracing::debug!("ignoring columns hint: {}", value),
        k if is_logic_key(k) => return Err(or_unsupported(key, value)),
        _ => {
            if let Some((path, rest)) = key.rsplit_once('.')
                && embed_at(&mut parsed.query.embeds, path).is_some()
            {
                return apply_embed_param(parsed, key, path, rest, value, options);
            }
            let filter = parse_filter(key, value)?;
            parsed.query.filters.push(filter);
        }
    }
    Ok(())
}

/// A filter on a column named like a reserved parameter, e.g. `limit=eq.5`.
/// `None` when the value also reads as the parameter itself.
fn reserved_filter(key: &str, value: &str, max_depth: usize) -> Option<Filter> {
    let own_form = match key {
        "limit" | "offset" => value.trim().parse::<u64>().is_ok(),
        "order" => parse_order(value, max_depth).is_ok(),
        "select" | "on_conflict" | "columns" => false,
        _ => return None,
    };
    if own_form {
        return None;
    }
    parse_filter(key, value).ok()
}

/// `or`, `and`, and their negations.
fn is_logic_key(key: &str) -> bool {
    matches!(key, "or" | "and" | "not.or" | "not.and")
}

fn or_unsupported(key: &str, value: &str) -> ConvertError {
    ConvertError::unsupported("OR_UNSUPPORTED", "logical filter groups are not supported")
        .at(format!("{}={}", key, value))
        .hint("split the request, or express the condition with in.(...)")
}

/// The embed addressed by a dotted path such as `posts.comments`.
fn embed_at<'a>(embeds: &'a mut [EmbeddedResource], path: &str) -> Option<&'a mut EmbeddedResource> {
    let (first, rest) = match path.split_once('.') {
        Some((first, rest)) => (first, Some(rest)),
        None => (path, None),
    };
    let embed = embeds.iter_mut().find(|e| e.name() == first)?;
    match rest {
        Some(rest) => embed_at(&mut embed.embeds, rest),
        None => Some(embed),
    }
}

/// `<embed>.order`, `<embed>.limit`, `<embed>.offset`, `<embed>.<col>`.
fn apply_embed_param(
    parsed: &mut Parsed,
    key: &str,
    path: &str,
    rest: &str,
    value: &str,
    options: &ConvertOptions,
) -> ConvertResult<()> {
    match rest {
        "order" => {
            let specs = parse_order(value, options.max_depth)?;
            if let Some(embed) = embed_at(&mut parsed.query.embeds, path) {
                embed.order.extend(specs);
            }
        }
        "limit" => {
            let limit = parse_integer(key, value)?;
            if let Some(embed) = embed_at(&mut parsed.query.embeds, path) {
                embed.limit = Some(limit);
            }
        }
        "offset" => parsed.warn(format!("{}={} ignored: embed offsets are not supported", key, value)),
        k if is_logic_key(k) => return Err(or_unsupported(key, value)),
        column => {
            let filter = parse_filter(column, value)?;
            if let Some(embed) = embed_at(&mut parsed.query.embeds, path) {
                embed.filters.push(filter);
            }
        }
    }
    Ok(())
}

fn parse_integer(key: &str, value: &str) -> ConvertResult<u64> {
    value.trim().parse().map_err(|_| {
        ConvertError::syntax("INVALID_INTEGER", format!("{} must be a non-negative integer", key))
            .at(format!("{}={}", key, value))
    })
}

/// Parse `col=[not.]op[(config)].value`.
pub fn parse_filter(column: &str, raw: &str) -> ConvertResult<Filter> {
    let (negated, rest) = match raw.strip_prefix("not.") {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let Some((op_token, value)) = rest.split_once('.') else {
        return Err(ConvertError::syntax("INVALID_FILTER", "filter has no operator")
            .at(format!("{}={}", column, raw))
            .hint(format!("write {}=eq.{}", column, raw)));
    };
    let (tag, config) = match op_token.split_once('(') {
        Some((tag, config)) => match config.strip_suffix(')') {
            Some(config) => (tag, Some(config.to_string())),
            None => {
                return Err(ConvertError::syntax("INVALID_FILTER", "unclosed operator configuration")
                    .at(format!("{}={}", column, raw)));
            }
        },
        None => (op_token, None),
    };

    let op = Operator::from_tag(tag).map_err(|e| e.at(format!("{}={}", column, raw)))?;
    if config.is_some() && !op.is_full_text() {
        return Err(ConvertError::syntax(
            "INVALID_FILTER",
            format!("'{}' does not take a configuration", tag),
        )
        .at(format!("{}={}", column, raw)));
    }

    let mut filter = Filter::new(column, op, parse_wire_value(op, value));
    filter.negated = negated;
    filter.config = config;
    Ok(filter)
}

/// Parse `col[.asc|.desc][.nullsfirst|.nullslast],...`.
pub fn parse_order(raw: &str, max_depth: usize) -> ConvertResult<Vec<OrderSpec>> {
    split_top_level(raw, ',', max_depth)?
        .into_iter()
        .map(|item| {
            let mut parts = item.split('.');
            let column = parts.next().unwrap_or_default().trim();
            if column.is_empty() {
                return Err(invalid_order(item));
            }
            let mut spec = OrderSpec::asc(column);
            for modifier in parts {
                match modifier {
                    "asc" => spec.descending = false,
                    "desc" => spec.descending = true,
                    "nullsfirst" => spec.nulls = Some(NullsOrder::First),
                    "nullslast" => spec.nulls = Some(NullsOrder::Last),
                    _ => return Err(invalid_order(item)),
                }
            }
            Ok(spec)
        })
        .collect()
}

fn invalid_order(item: &str) -> ConvertError {
    ConvertError::syntax("INVALID_ORDER", "invalid order item")
        .at(item.to_string())
        .hint("use column[.asc|.desc][.nullsfirst|.nullslast]")
}

fn apply_headers(parsed: &mut Parsed, request: &RestRequest) -> ConvertResult<()> {
    let is_post = request.method.eq_ignore_ascii_case("POST");
    let is_get = request.method.eq_ignore_ascii_case("GET");

    if let Some(prefer) = request.header("Prefer") {
        for preference in prefer.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = preference.split_once('=').unwrap_or((preference, ""));
            match (name.trim(), value.trim()) {
                ("resolution", resolution @ ("merge-duplicates" | "ignore-duplicates")) => {
                    if is_post && parsed.query.operation == Operation::Insert {
                        parsed.query.operation = Operation::Upsert;
                        parsed.query.ignore_duplicates = resolution == "ignore-duplicates";
                    } else {
                        parsed.warn(format!("Prefer: {} ignored: only POST can upsert", preference));
                    }
                }
                ("count", mode) => match CountMode::parse(mode) {
                    Some(mode) => parsed.query.count = Some(mode),
                    None => parsed.warn(format!("unknown count mode '{}'", mode)),
                },
                ("return", "representation") => parsed.query.returning = true,
                ("return", "minimal" | "headers-only") | ("missing", _) | ("tx", _) => {}
                _ => parsed.warn(format!("Prefer: {} ignored", preference)),
            }
        }
    }

    if let Some(range) = request.header("Range") {
        let bounds = range.split_once('-').and_then(|(from, to)| {
            Some((from.trim().parse::<u64>().ok()?, to.trim().parse::<u64>().ok()?))
        });
        match bounds {
            Some((from, to)) if from <= to => parsed.query.range = Some((from, to)),
            _ => {
                return Err(ConvertError::syntax("INVALID_INTEGER", "Range must be <from>-<to>")
                    .at(format!("Range: {}", range)));
            }
        }
    }

    if request.header("Accept").is_some_and(|accept| accept.contains(SINGLE_OBJECT)) {
        // A GET cannot ask for a representation, so the pair marks maybeSingle.
        parsed.query.single = if is_get && parsed.query.returning {
            parsed.query.returning = false;
            Some(SingleMode::MaybeOne)
        } else {
            Some(SingleMode::One)
        };
    }
    Ok(())
}

fn apply_body(parsed: &mut Parsed, request: &RestRequest) -> ConvertResult<()> {
    let Some(text) = request.body.as_deref().filter(|b| !b.trim().is_empty()) else {
        return Ok(());
    };
    let accepts_body = matches!(
        parsed.query.operation,
        Operation::Insert | Operation::Upsert | Operation::Update
    ) || (parsed.query.operation == Operation::Rpc && request.method.eq_ignore_ascii_case("POST"));
    if !accepts_body {
        parsed.warn(format!("request body ignored for {}", request.method.to_ascii_uppercase()));
        return Ok(());
    }

    let json: JsonValue = serde_json::from_str(text).map_err(|e| {
        ConvertError::syntax("INVALID_BODY", format!("body is not valid JSON: {}", e)).at(excerpt(text))
    })?;

    let body = match (parsed.query.operation, json) {
        (Operation::Rpc, JsonValue::Object(params)) => Body::Params(params),
        (Operation::Rpc, other) => return Err(bad_shape("RPC parameters must be one object", &other)),
        (_, JsonValue::Object(row)) => Body::Row(row),
        (_, JsonValue::Array(items)) => Body::Rows(
            items
                .into_iter()
                .map(|item| match item {
                    JsonValue::Object(row) => Ok(row),
                    other => Err(bad_shape("every array item must be an object", &other)),
                })
                .collect::<ConvertResult<Vec<Row>>>()?,
        ),
        (_, other) => return Err(bad_shape("body must be an object or an array of objects", &other)),
    };
    parsed.query.body = Some(body);
    Ok(())
}

fn bad_shape(message: &str, value: &JsonValue) -> ConvertError {
    ConvertError::syntax("INVALID_BODY_SHAPE", message).at(excerpt(&value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Column, Value};

    fn get(target: &str) -> Parsed {
        parse(&RestRequest::new("GET", target), &ConvertOptions::default()).unwrap()
    }

    fn err(request: RestRequest) -> ConvertError {
        parse(&request, &ConvertOptions::default()).unwrap_err()
    }

    #[test]
    fn test_reserved_names_as_filter_columns() {
        let query = get("/events?select=id&limit=eq.5&order=gt.3&select=neq.x&order=id.desc&limit=2").query;
        assert_eq!(query.columns, vec![Column::named("id")]);
        assert_eq!(
            query.filters,
            vec![
                Filter::new("limit", Operator::Eq, 5),
                Filter::new("order", Operator::Gt, 3),
                Filter::new("select", Operator::Neq, "x"),
            ]
        );
        assert_eq!(query.order, vec![OrderSpec::desc("id")]);
        assert_eq!(query.limit, Some(2));

        assert_eq!(err(RestRequest::new("GET", "/events?limit=ten")).code(), "INVALID_INTEGER");
    }

    #[test]
    fn test_filters_and_modifiers() {
        let parsed = get("/users?age=gte.18&status=eq.active&order=name.desc.nullslast&limit=10&offset=20");
        let query = parsed.query;
        assert_eq!(query.table, "users");
        assert_eq!(query.columns, vec![Column::star()]);
        assert_eq!(
            query.filters,
            vec![
                Filter::new("age", Operator::Gte, 18),
                Filter::new("status", Operator::Eq, "active"),
            ]
        );
        assert_eq!(query.order, vec![OrderSpec::desc("name").nulls(NullsOrder::Last)]);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(20));
    }

    #[test]
    fn test_select_with_embed_params() {
        let parsed = get("/users?select=name,posts(title,year)&posts.year=gt.2020&posts.order=year.desc&posts.limit=5");
        let query = parsed.query;
        assert_eq!(query.columns, vec![Column::named("name")]);
        let posts = &query.embeds[0];
        assert_eq!(posts.columns, vec![Column::named("title"), Column::named("year")]);
        assert_eq!(posts.filters, vec![Filter::new("year", Operator::Gt, 2020)]);
        assert_eq!(posts.order, vec![OrderSpec::desc("year")]);
        assert_eq!(posts.limit, Some(5));
        assert!(query.filters.is_empty());
    }

    #[test]
    fn test_negation_in_and_fts() {
        let parsed = get("/users?id=not.in.(1,2,3)&bio=fts(english).cat&deleted_at=is.null");
        let filters = parsed.query.filters;
        assert!(filters[0].negated);
        assert_eq!(filters[0].value, Value::from(vec![1, 2, 3]));
        assert_eq!(filters[1].op, Operator::Fts);
        assert_eq!(filters[1].config.as_deref(), Some("english"));
        assert_eq!(filters[2].value, Value::Null);
    }

    #[test]
    fn test_url_encoded_values() {
        let parsed = get("/users?name=eq.Tom%20%26%20Jerry");
        assert_eq!(parsed.query.filters[0].value, Value::from("Tom & Jerry"));
    }

    #[test]
    fn test_full_url_and_prefix() {
        let parsed = get("https://x.supabase.co/rest/v1/users?id=eq.1");
        assert_eq!(parsed.query.table, "users");
    }

    #[test]
    fn test_errors() {
        assert_eq!(err(RestRequest::new("GET", "/")).code(), "NO_TABLE");
        assert_eq!(err(RestRequest::new("GET", "/users?age=18")).code(), "INVALID_FILTER");
        assert_eq!(err(RestRequest::new("GET", "/users?age=gtee.18")).code(), "UNKNOWN_OPERATOR");
        assert_eq!(err(RestRequest::new("GET", "/users?limit=ten")).code(), "INVALID_INTEGER");
        assert_eq!(err(RestRequest::new("GET", "/users?order=name.up")).code(), "INVALID_ORDER");
        assert_eq!(err(RestRequest::new("GET", "/users?or=(a.eq.1,b.eq.2)")).code(), "OR_UNSUPPORTED");
        assert_eq!(err(RestRequest::new("PUT", "/users")).code(), "UNSUPPORTED_METHOD");
        assert_eq!(
            err(RestRequest::new("POST", "/users").with_body("{oops")).code(),
            "INVALID_BODY"
        );
        assert_eq!(
            err(RestRequest::new("POST", "/users").with_body("42")).code(),
            "INVALID_BODY_SHAPE"
        );
    }

    #[test]
    fn test_insert_and_upsert() {
        let request = RestRequest::new("POST", "/users?on_conflict=email")
            .with_header("Prefer", "resolution=merge-duplicates, return=representation")
            .with_body(r#"[{"email":"a@b.co"},{"email":"c@d.co","name":"C"}]"#);
        let parsed = parse(&request, &ConvertOptions::default()).unwrap();
        let query = parsed.query;
        assert_eq!(query.operation, Operation::Upsert);
        assert_eq!(query.on_conflict.as_deref(), Some("email"));
        assert!(query.returning);
        assert!(!query.ignore_duplicates);
        assert!(matches!(query.body, Some(Body::Rows(ref rows)) if rows.len() == 2));
    }

    #[test]
    fn test_headers() {
        let request = RestRequest::new("GET", "/users")
            .with_header("Range", "0-9")
            .with_header("Prefer", "count=exact")
            .with_header("Accept", SINGLE_OBJECT);
        let query = parse(&request, &ConvertOptions::default()).unwrap().query;
        assert_eq!(query.range, Some((0, 9)));
        assert_eq!(query.count, Some(CountMode::Exact));
        assert_eq!(query.single, Some(SingleMode::One));
    }

    #[test]
    fn test_body_on_get_is_a_warning() {
        let request = RestRequest::new("GET", "/users").with_body("{}");
        let parsed = parse(&request, &ConvertOptions::default()).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.query.body.is_none());
    }

    #[test]
    fn test_rpc_and_head() {
        let request = RestRequest::new("POST", "/rpc/add_one").with_body(r#"{"n":1}"#);
        let query = parse(&request, &ConvertOptions::default()).unwrap().query;
        assert_eq!(query.operation, Operation::Rpc);
        assert_eq!(query.table, "add_one");

        let query = parse(&RestRequest::new("HEAD", "/users"), &ConvertOptions::default())
            .unwrap()
            .query;
        assert!(query.head);
    }

    #[test]
    fn test_delete_without_filters_parses() {
        let query = parse(&RestRequest::new("DELETE", "/users"), &ConvertOptions::default())
            .unwrap()
            .query;
        assert_eq!(query.operation, Operation::Delete);
        assert!(query.filters.is_empty());
    }
}
