//! REST request builder.
//!
//! Query parameters are emitted in a fixed order so output is stable:
//! `select`, filters, embed filters, `order`, embed orders, `limit`,
//! `offset`, embed limits, `on_conflict`.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::Value as JsonValue;

use crate::ast::{Filter, HttpMethod, HttpRequest, NullsOrder, Operation, OrderSpec, Query, SingleMode};
use crate::codec::wire_token;
use crate::error::ConvertResult;
use crate::parser::rest::SINGLE_OBJECT;
use crate::transpiler::embed_paths;

/// Characters escaped in a path segment.
const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A built request and the warnings raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct RestBuild {
    pub request: HttpRequest,
    pub warnings: Vec<String>,
}

/// Build the HTTP request for a query.
pub fn build_request(query: &Query) -> ConvertResult<RestBuild> {
    let mut warnings = Vec::new();
    let table = utf8_percent_encode(&query.table, PATH_ENCODE_SET).to_string();
    let (method, path) = match query.operation {
        Operation::Select if query.head => (HttpMethod::Head, format!("/{}", table)),
        Operation::Select => (HttpMethod::Get, format!("/{}", table)),
        Operation::Insert | Operation::Upsert => (HttpMethod::Post, format!("/{}", table)),
        Operation::Update => (HttpMethod::Patch, format!("/{}", table)),
        Operation::Delete => (HttpMethod::Delete, format!("/{}", table)),
        Operation::Rpc if query.head => (HttpMethod::Head, format!("/rpc/{}", table)),
        Operation::Rpc => {
            warnings.push(format!(
                "'{}' is a database function call; it only exists as an HTTP request",
                query.table
            ));
            (HttpMethod::Post, format!("/rpc/{}", table))
        }
    };
    let mut request = HttpRequest::new(method, path);

    if wants_select(query) {
        request.push_param("select", query.select_param());
    }

    let embeds = embed_paths(&query.embeds);
    for filter in &query.filters {
        request.push_param(filter.column.clone(), filter_value(filter));
    }
    for (path, embed) in &embeds {
        for filter in &embed.filters {
            request.push_param(format!("{}.{}", path, filter.column), filter_value(filter));
        }
    }

    if !query.order.is_empty() {
        request.push_param("order", order_value(&query.order));
    }
    for (path, embed) in &embeds {
        if !embed.order.is_empty() {
            request.push_param(format!("{}.order", path), order_value(&embed.order));
        }
    }

    if let Some(limit) = query.limit {
        request.push_param("limit", limit.to_string());
    }
    if let Some(offset) = query.offset {
        request.push_param("offset", offset.to_string());
    }
    for (path, embed) in &embeds {
        if let Some(limit) = embed.limit {
            request.push_param(format!("{}.limit", path), limit.to_string());
        }
    }

    if query.operation == Operation::Upsert
        && let Some(target) = &query.on_conflict
    {
        request.push_param("on_conflict", target.clone());
    }

    apply_headers(query, &mut request);

    match &query.body {
        Some(body) if matches!(query.operation, Operation::Insert | Operation::Upsert | Operation::Update | Operation::Rpc) => {
            request.body = Some(body.to_json());
        }
        Some(_) => warnings.push(format!("request body dropped: {} requests carry none", request.method)),
        None if query.operation == Operation::Rpc && method == HttpMethod::Post => {
            request.body = Some(JsonValue::Object(Default::default()));
        }
        None => {}
    }
    if request.body.is_some() {
        request.append_header("Content-Type", "application/json");
    }

    tracing::trace!("built REST request: {}", request.url());
    Ok(RestBuild { request, warnings })
}

/// Selects are omitted when they would only say `*`. Mutations send one
/// only when rows are returned.
fn wants_select(query: &Query) -> bool {
    let all = query.selects_all() && query.embeds.is_empty();
    match query.operation {
        Operation::Select | Operation::Rpc => !all,
        _ => query.returning && !all,
    }
}

/// `[not.]op[(config)].value`
pub fn filter_value(filter: &Filter) -> String {
    let mut value = String::new();
    if filter.negated {
        value.push_str("not.");
    }
    value.push_str(filter.op.tag());
    if let Some(config) = &filter.config {
        value.push('(');
        value.push_str(config);
        value.push(')');
    }
    value.push('.');
    value.push_str(&wire_token(filter.op, &filter.value));
    value
}

/// `c1.desc.nullsfirst,c2.asc`
pub fn order_value(order: &[OrderSpec]) -> String {
    order
        .iter()
        .map(|o| {
            let mut item = format!("{}.{}", o.column, if o.descending { "desc" } else { "asc" });
            match o.nulls {
                Some(NullsOrder::First) => item.push_str(".nullsfirst"),
                Some(NullsOrder::Last) => item.push_str(".nullslast"),
                None => {}
            }
            item
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn apply_headers(query: &Query, request: &mut HttpRequest) {
    if query.single.is_some() {
        request.append_header("Accept", SINGLE_OBJECT);
    }

    if query.operation == Operation::Upsert {
        let resolution = if query.ignore_duplicates {
            "resolution=ignore-duplicates"
        } else {
            "resolution=merge-duplicates"
        };
        request.append_header("Prefer", resolution);
    }
    if query.returning || query.single == Some(SingleMode::MaybeOne) {
        request.append_header("Prefer", "return=representation");
    }
    if let Some(count) = query.count {
        request.append_header("Prefer", format!("count={}", count.as_str()));
    }

    if let Some((from, to)) = query.range {
        request.append_header("Range", format!("{}-{}", from, to));
        request.append_header("Range-Unit", "items");
    }
}
