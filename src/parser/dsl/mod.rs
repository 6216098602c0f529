//! Client DSL parser.
//!
//! Reads one fluent method chain into a query:
//!
//! ```text
//! const { data } = await supabase
//!   .from('users')
//!   .select('name, posts(title)')
//!   .gte('age', 18)
//!   .order('name')
//! ```
//!
//! The chain is split into segments by one quote- and bracket-aware scan,
//! the root (`from`, `rpc`, `auth`, `storage`) is located, and every call
//! after it is classified as a [`ChainCall`] and folded into the query.

mod args;
pub mod chain;
pub mod http_only;
pub mod literal;

pub use self::chain::ChainCall;
pub use self::http_only::HttpOnlyCall;

use serde_json::Value as JsonValue;

use crate::ast::{
    Body, CountMode, Filter, NullsOrder, Operation, OrderSpec, Query, SingleMode, find_embed_mut,
};
use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult};
use crate::parser::dsl::args::Args;
use crate::parser::scan::{Quotes, check_len, excerpt, matching_close, split_top_level};
use crate::parser::{Parsed, parse_select};

/// One element of a method chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `supabase`, `auth`, `storage`
    Property(String),
    /// `eq('age', 18)` with decoded arguments.
    Call { name: String, args: Vec<JsonValue> },
}

/// What a DSL expression turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum DslOutput {
    /// A table query or RPC call.
    Query(Parsed),
    /// An `auth` or `storage` call with no query form.
    Http(HttpOnlyCall),
}

/// Where the chain starts.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Root {
    From(usize),
    Rpc(usize),
    Auth(usize),
    Storage(usize),
}

/// Parse a DSL expression.
pub fn parse(input: &str, options: &ConvertOptions) -> ConvertResult<DslOutput> {
    check_len(input, options.max_input_len)?;
    let normalized = normalize(input);
    let segments = segments(&normalized, options.max_depth)?;
    tracing::trace!("DSL chain has {} segments", segments.len());

    let root = find_root(&segments).ok_or_else(|| {
        ConvertError::syntax("DSL_NO_ROOT", "no recognized query root")
            .at(excerpt(&normalized))
            .hint("start the chain with .from('<table>'), .rpc('<fn>'), .auth or .storage")
    })?;

    match root {
        Root::Auth(i) => Ok(DslOutput::Http(http_only::auth_call(&segments[i + 1..])?)),
        Root::Storage(i) => Ok(DslOutput::Http(http_only::storage_call(&segments[i + 1..])?)),
        Root::From(i) | Root::Rpc(i) => {
            let parsed = fold_chain(&segments, i, root, options)?;
            tracing::debug!(
                "parsed DSL {} on '{}' with {} filter(s)",
                parsed.query.operation,
                parsed.query.table,
                parsed.query.filters.len()
            );
            Ok(DslOutput::Query(parsed))
        }
    }
}

/// Parse a DSL expression that must be a table query or RPC call.
pub fn parse_query(input: &str, options: &ConvertOptions) -> ConvertResult<Parsed> {
    match parse(input, options)? {
        DslOutput::Query(parsed) => Ok(parsed),
        DslOutput::Http(call) => Err(ConvertError::unsupported(
            "UNSUPPORTED_OPERATION",
            format!("'{}' is an HTTP-only call with no query form", call.description),
        )
        .at(call.request.url())
        .hint("convert auth and storage calls to rest")),
    }
}

/// Strip `await`, `return`, a `const x =` binding and trailing `;`, then
/// collapse whitespace outside string literals.
fn normalize(input: &str) -> String {
    let mut s = input.trim();
    loop {
        let before = s;
        s = s.trim_end_matches(';').trim_end();
        for keyword in ["await ", "return "] {
            if let Some(rest) = s.strip_prefix(keyword) {
                s = rest.trim_start();
            }
        }
        for keyword in ["const ", "let ", "var "] {
            if let Some(rest) = s.strip_prefix(keyword)
                && let Some(eq) = rest.find('=')
            {
                s = rest[eq + 1..].trim_start();
            }
        }
        if s == before {
            break;
        }
    }

    let mut out = String::with_capacity(s.len());
    let mut quotes = Quotes::default();
    let mut pending_space = false;
    for c in s.chars() {
        if !quotes.is_open() && c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        quotes.feed(c);
        out.push(c);
    }
    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn skip_spaces(input: &str, mut pos: usize) -> usize {
    while input.as_bytes().get(pos) == Some(&b' ') {
        pos += 1;
    }
    pos
}

/// Split a normalized chain into properties and calls.
fn segments(input: &str, max_depth: usize) -> ConvertResult<Vec<Segment>> {
    let bytes = input.as_bytes();
    let mut segments = Vec::new();
    let mut pos = 0;

    loop {
        pos = skip_spaces(input, pos);
        let start = pos;
        while pos < bytes.len() && is_ident_byte(bytes[pos]) {
            pos += 1;
        }
        if start == pos {
            return Err(unexpected(input, pos));
        }
        let name = &input[start..pos];
        pos = skip_spaces(input, pos);

        // TypeScript type arguments: `.returns<Row[]>()`
        if bytes.get(pos) == Some(&b'<') {
            let close = input[pos..]
                .find('>')
                .ok_or_else(|| unexpected(input, pos))?;
            pos = skip_spaces(input, pos + close + 1);
        }

        if bytes.get(pos) == Some(&b'(') {
            let close = matching_close(input, pos, max_depth)?;
            let args = split_top_level(&input[pos + 1..close], ',', max_depth)?
                .into_iter()
                .map(|raw| literal::decode_arg(raw, max_depth))
                .collect();
            segments.push(Segment::Call {
                name: name.to_string(),
                args,
            });
            pos = close + 1;
        } else {
            segments.push(Segment::Property(name.to_string()));
        }

        pos = skip_spaces(input, pos);
        if pos >= bytes.len() {
            break;
        }
        if input[pos..].starts_with("?.") {
            pos += 2;
        } else if bytes[pos] == b'.' {
            pos += 1;
        } else {
            return Err(unexpected(input, pos));
        }
    }
    Ok(segments)
}

fn unexpected(input: &str, pos: usize) -> ConvertError {
    let found = input[pos..].chars().next();
    let message = match found {
        Some(c) => format!("unexpected '{}' in method chain", c),
        None => "method chain ends with '.'".to_string(),
    };
    ConvertError::syntax("DSL_SYNTAX", message).at(excerpt(&input[pos..]))
}

fn find_root(segments: &[Segment]) -> Option<Root> {
    segments.iter().enumerate().find_map(|(i, segment)| match segment {
        Segment::Call { name, .. } if name == "from" => Some(Root::From(i)),
        Segment::Call { name, .. } if name == "rpc" => Some(Root::Rpc(i)),
        Segment::Property(name) if name == "auth" => Some(Root::Auth(i)),
        Segment::Property(name) if name == "storage" => Some(Root::Storage(i)),
        _ => None,
    })
}

/// Build the query from the root call and every call after it.
fn fold_chain(
    segments: &[Segment],
    index: usize,
    root: Root,
    options: &ConvertOptions,
) -> ConvertResult<Parsed> {
    let Segment::Call { name, args } = &segments[index] else {
        return Err(ConvertError::syntax("DSL_NO_ROOT", "query root must be a call"));
    };
    let args = Args::new(name, args);

    let mut parsed = match root {
        Root::Rpc(_) => {
            let mut query = Query::new(Operation::Rpc, args.str(0)?);
            let params = match args.get(1) {
                Some(JsonValue::Object(params)) => params.clone(),
                Some(other) => return Err(args.invalid(1, "an object of parameters", other)),
                None => Default::default(),
            };
            query.body = Some(Body::Params(params));
            query.head = args.option_bool(2, "head").unwrap_or(false);
            query.count = args.option_str(2, "count").and_then(|mode| CountMode::parse(&mode));
            Parsed::new(query)
        }
        _ => Parsed::new(Query::new(Operation::Select, args.str(0)?)),
    };

    for segment in &segments[..index] {
        if let Segment::Call { name, .. } = segment {
            parsed.warn(format!("ignored {}() before the query root", name));
        }
    }

    for segment in &segments[index + 1..] {
        match segment {
            Segment::Property(name) => parsed.warn(format!("ignored property '{}'", name)),
            Segment::Call { name, args } => {
                let call = ChainCall::classify(name, args)?;
                apply(&mut parsed, call, options)?;
            }
        }
    }

    if parsed.query.operation == Operation::Select && parsed.query.columns.is_empty() && parsed.query.embeds.is_empty() {
        parsed.query.columns = vec![crate::ast::Column::star()];
    }
    Ok(parsed)
}

/// Fold one classified call into the query.
fn apply(parsed: &mut Parsed, call: ChainCall, options: &ConvertOptions) -> ConvertResult<()> {
    let query = &mut parsed.query;
    match call {
        ChainCall::Select { columns, count, head } => {
            let selection = parse_select(&columns, options.max_depth)?;
            query.columns = selection.columns;
            query.embeds = selection.embeds;
            parsed.warnings.extend(selection.warnings);
            if query.operation.is_mutation() {
                query.returning = true;
            }
            if count.is_some() {
                query.count = count;
            }
            query.head |= head;
        }
        ChainCall::Filter(filter) => route_filter(parsed, filter),
        ChainCall::Match(row) => {
            for (column, value) in row {
                let filter = Filter::new(column, crate::ast::Operator::Eq, crate::ast::Value::from_json(&value));
                route_filter(parsed, filter);
            }
        }
        ChainCall::Order {
            column,
            ascending,
            nulls_first,
            referenced_table,
        } => {
            let spec = OrderSpec {
                column,
                descending: !ascending,
                nulls: nulls_first.map(|first| if first { NullsOrder::First } else { NullsOrder::Last }),
            };
            match referenced_table {
                Some(table) => match find_embed_mut(&mut query.embeds, &table) {
                    Some(embed) => embed.order.push(spec),
                    None => parsed.warn(format!("order on '{}' ignored: no such embed", table)),
                },
                None => query.order.push(spec),
            }
        }
        ChainCall::Limit {
            count,
            referenced_table,
        } => match referenced_table {
            Some(table) => match find_embed_mut(&mut query.embeds, &table) {
                Some(embed) => embed.limit = Some(count),
                None => parsed.warn(format!("limit on '{}' ignored: no such embed", table)),
            },
            None => query.limit = Some(count),
        },
        ChainCall::Range {
            from,
            to,
            referenced_table,
        } => {
            if to < from {
                return Err(ConvertError::syntax(
                    "INVALID_ARGUMENT",
                    format!("range({}, {}) ends before it starts", from, to),
                )
                .at(format!("range({}, {})", from, to)));
            }
            match referenced_table {
                Some(table) => parsed.warn(format!("range on embed '{}' ignored", table)),
                None => query.range = Some((from, to)),
            }
        }
        ChainCall::Single => query.single = Some(SingleMode::One),
        ChainCall::MaybeSingle => query.single = Some(SingleMode::MaybeOne),
        ChainCall::Insert(body) => {
            set_operation(parsed, Operation::Insert);
            parsed.query.body = Some(body);
        }
        ChainCall::Upsert {
            body,
            on_conflict,
            ignore_duplicates,
        } => {
            set_operation(parsed, Operation::Upsert);
            parsed.query.body = Some(body);
            parsed.query.on_conflict = on_conflict;
            parsed.query.ignore_duplicates = ignore_duplicates;
        }
        ChainCall::Update(row) => {
            set_operation(parsed, Operation::Update);
            parsed.query.body = Some(Body::Row(row));
        }
        ChainCall::Delete => set_operation(parsed, Operation::Delete),
        ChainCall::Unknown(name) => {
            if options.strict_methods {
                return Err(ConvertError::unsupported(
                    "DSL_UNKNOWN_METHOD",
                    format!("unknown method '{}'", name),
                )
                .at(format!("{}(...)", name))
                .hint("disable strict_methods to ignore unknown methods"));
            }
            tracing::warn!("ignoring unknown DSL method: {}", name);
            parsed.warn(format!("ignored unknown method '{}'", name));
        }
    }
    Ok(())
}

fn set_operation(parsed: &mut Parsed, operation: Operation) {
    let current = parsed.query.operation;
    if current.is_mutation() || current == Operation::Rpc {
        parsed.warn(format!("{} replaces the earlier {}", operation, current));
    }
    parsed.query.operation = operation;
}

/// Filters on `embed.column` go to the embed; everything else stays on the
/// main table.
fn route_filter(parsed: &mut Parsed, mut filter: Filter) {
    if let Some((prefix, column)) = filter.column.clone().split_once('.')
        && let Some(embed) = find_embed_mut(&mut parsed.query.embeds, prefix)
    {
        filter.column = column.to_string();
        embed.filters.push(filter);
        return;
    }
    parsed.query.filters.push(filter);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Column, Operator, Value};
    use serde_json::json;

    fn query(input: &str) -> Parsed {
        parse_query(input, &ConvertOptions::default()).unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize("const { data, error } = await supabase\n  .from('users')\n  .select('a  b');"),
            "supabase .from('users') .select('a  b')"
        );
    }

    #[test]
    fn test_segments() {
        let segs = segments("supabase.from('users').eq('age', 18)", 8).unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::Property("supabase".into()),
                Segment::Call { name: "from".into(), args: vec![json!("users")] },
                Segment::Call { name: "eq".into(), args: vec![json!("age"), json!(18)] },
            ]
        );
    }

    #[test]
    fn test_simple_select() {
        let parsed = query("supabase.from('users').select('id, name').gte('age', 18).limit(10)");
        assert_eq!(parsed.query.table, "users");
        assert_eq!(parsed.query.operation, Operation::Select);
        assert_eq!(parsed.query.columns, vec![Column::named("id"), Column::named("name")]);
        assert_eq!(parsed.query.filters, vec![Filter::new("age", Operator::Gte, 18)]);
        assert_eq!(parsed.query.limit, Some(10));
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_bare_table_selects_everything() {
        let parsed = query("from('users')");
        assert_eq!(parsed.query.columns, vec![Column::star()]);
    }

    #[test]
    fn test_insert_keeps_key_order() {
        let parsed = query("supabase.from('users').insert({ name: 'Alice', age: 30 })");
        assert_eq!(parsed.query.operation, Operation::Insert);
        let body = parsed.query.body.unwrap().to_json();
        assert_eq!(body.to_string(), r#"{"name":"Alice","age":30}"#);
    }

    #[test]
    fn test_mutation_then_select_returns_rows() {
        let parsed = query("supabase.from('users').update({ active: false }).eq('id', 1).select('id')");
        assert_eq!(parsed.query.operation, Operation::Update);
        assert!(parsed.query.returning);
        assert_eq!(parsed.query.columns, vec![Column::named("id")]);
    }

    #[test]
    fn test_embed_filters_and_modifiers() {
        let parsed = query(
            "supabase.from('users').select('name, posts(title)').eq('posts.published', true)\
             .order('title', { referencedTable: 'posts', ascending: false }).limit(3, { referencedTable: 'posts' })",
        );
        let embed = &parsed.query.embeds[0];
        assert_eq!(embed.filters, vec![Filter::new("published", Operator::Eq, true)]);
        assert_eq!(embed.order, vec![OrderSpec::desc("title")]);
        assert_eq!(embed.limit, Some(3));
        assert!(parsed.query.filters.is_empty());
    }

    #[test]
    fn test_match_expands_to_eq_filters() {
        let parsed = query("supabase.from('users').select().match({ status: 'active', role: 'admin' })");
        assert_eq!(parsed.query.filters.len(), 2);
        assert_eq!(parsed.query.filters[1], Filter::new("role", Operator::Eq, "admin"));
    }

    #[test]
    fn test_rpc() {
        let parsed = query("supabase.rpc('add_one', { n: 1 })");
        assert_eq!(parsed.query.operation, Operation::Rpc);
        assert_eq!(parsed.query.table, "add_one");
        assert_eq!(parsed.query.body.unwrap().to_json(), json!({"n": 1}));
    }

    #[test]
    fn test_no_root() {
        let err = parse("supabase.select('*')", &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.code(), "DSL_NO_ROOT");
    }

    #[test]
    fn test_unknown_method_lenient_and_strict() {
        let parsed = query("supabase.from('users').select().abortSignal(signal)");
        assert_eq!(parsed.warnings.len(), 1);

        let strict = ConvertOptions::builder().strict_methods(true).build();
        let err = parse("supabase.from('users').select().abortSignal(signal)", &strict).unwrap_err();
        assert_eq!(err.code(), "DSL_UNKNOWN_METHOD");
    }

    #[test]
    fn test_quoted_punctuation_is_not_split() {
        let parsed = query("supabase.from('notes').select().eq('title', 'a.b(c), d')");
        assert_eq!(parsed.query.filters[0].value, Value::from("a.b(c), d"));
    }

    #[test]
    fn test_auth_is_http_only() {
        let output = parse(
            "await supabase.auth.signInWithPassword({ email: 'a@b.co', password: 'pw' })",
            &ConvertOptions::default(),
        )
        .unwrap();
        assert!(matches!(output, DslOutput::Http(_)));
        let err = parse_query("supabase.auth.getUser()", &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_OPERATION");
    }

    #[test]
    fn test_input_limits() {
        let tiny = ConvertOptions::builder().max_input_len(10).build();
        assert_eq!(parse("supabase.from('users')", &tiny).unwrap_err().code(), "INPUT_TOO_LARGE");

        let shallow = ConvertOptions::builder().max_depth(2).build();
        let err = parse("supabase.from('t').insert({ a: { b: { c: 1 } } })", &shallow).unwrap_err();
        assert_eq!(err.code(), "NESTING_TOO_DEEP");
    }
}
