//! Classification of chained method calls.
//!
//! Every call after the root is turned into one [`ChainCall`] before it
//! touches the query, so argument shapes are checked in one place.

use serde_json::Value as JsonValue;

use crate::ast::{Body, CountMode, Filter, Operator, Row, Value};
use crate::codec::parse_wire_value;
use crate::error::{ConvertError, ConvertResult};
use crate::parser::dsl::args::Args;

/// One method call, typed by family.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainCall {
    /// `select(columns, { count, head })`
    Select {
        columns: String,
        count: Option<CountMode>,
        head: bool,
    },
    /// Every single-column filter: `eq`, `not`, `filter`, `textSearch`, ...
    Filter(Filter),
    /// `match({ col: value, ... })`
    Match(Row),
    /// `order(column, { ascending, nullsFirst, referencedTable })`
    Order {
        column: String,
        ascending: bool,
        nulls_first: Option<bool>,
        referenced_table: Option<String>,
    },
    /// `limit(n, { referencedTable })`
    Limit {
        count: u64,
        referenced_table: Option<String>,
    },
    /// `range(from, to, { referencedTable })`
    Range {
        from: u64,
        to: u64,
        referenced_table: Option<String>,
    },
    Single,
    MaybeSingle,
    Insert(Body),
    Upsert {
        body: Body,
        on_conflict: Option<String>,
        ignore_duplicates: bool,
    },
    Update(Row),
    Delete,
    /// Anything else. Ignored with a warning, or rejected in strict mode.
    Unknown(String),
}

impl ChainCall {
    /// Type one call from its name and decoded arguments.
    pub fn classify(method: &str, values: &[JsonValue]) -> ConvertResult<ChainCall> {
        let args = Args::new(method, values);

        if let Some(op) = Operator::from_dsl_method(method) {
            let column = args.str(0)?;
            let value = dsl_value(op, args.value(1)?);
            return Ok(ChainCall::Filter(Filter::new(column, op, value)));
        }

        let call = match method {
            "select" => ChainCall::Select {
                columns: args.opt_str(0).unwrap_or_else(|| "*".to_string()),
                count: match args.option_str(1, "count") {
                    Some(mode) => Some(CountMode::parse(&mode).ok_or_else(|| {
                        ConvertError::syntax("INVALID_ARGUMENT", format!("unknown count mode '{}'", mode))
                            .at(mode.clone())
                            .hint("use 'exact', 'planned' or 'estimated'")
                    })?),
                    None => None,
                },
                head: args.option_bool(1, "head").unwrap_or(false),
            },
            "not" | "filter" => {
                let column = args.str(0)?;
                let operator = args.str(1)?;
                let (negated, tag) = match operator.strip_prefix("not.") {
                    Some(tag) => (true, tag.to_string()),
                    None => (method == "not", operator.clone()),
                };
                let (tag, config) = match tag.split_once('(') {
                    Some((tag, config)) => (tag.to_string(), config.strip_suffix(')').map(str::to_string)),
                    None => (tag, None),
                };
                let op = Operator::from_tag(&tag)?;
                let value = match args.value(2)? {
                    JsonValue::String(raw) => parse_wire_value(op, raw),
                    other => dsl_value(op, other),
                };
                let mut filter = Filter::new(column, op, value);
                filter.negated = negated;
                filter.config = config;
                ChainCall::Filter(filter)
            }
            "textSearch" => {
                let column = args.str(0)?;
                let query = args.str(1)?;
                let op = match args.option_str(2, "type").as_deref() {
                    Some("plain") => Operator::PlFts,
                    Some("phrase") => Operator::PhFts,
                    Some("websearch") => Operator::WFts,
                    _ => Operator::Fts,
                };
                let mut filter = Filter::new(column, op, Value::String(query));
                filter.config = args.option_str(2, "config");
                ChainCall::Filter(filter)
            }
            "match" => ChainCall::Match(args.object(0)?.clone()),
            "or" => {
                return Err(ConvertError::unsupported(
                    "OR_UNSUPPORTED",
                    "OR filter groups are not supported",
                )
                .at(args.opt_str(0).unwrap_or_default())
                .hint("split the query, or express the condition with in()"));
            }
            m if is_pattern_family(m) => {
                return Err(ConvertError::unsupported(
                    "UNSUPPORTED_OPERATION",
                    format!("{}() has no single-filter equivalent", m),
                )
                .at(format!("{}(...)", m)));
            }
            "order" => ChainCall::Order {
                column: args.str(0)?,
                ascending: args.option_bool(1, "ascending").unwrap_or(true),
                nulls_first: args.option_bool(1, "nullsFirst"),
                referenced_table: referenced_table(&args, 1),
            },
            "limit" => ChainCall::Limit {
                count: args.u64(0)?,
                referenced_table: referenced_table(&args, 1),
            },
            "range" => ChainCall::Range {
                from: args.u64(0)?,
                to: args.u64(1)?,
                referenced_table: referenced_table(&args, 2),
            },
            "single" => ChainCall::Single,
            "maybeSingle" => ChainCall::MaybeSingle,
            "insert" => ChainCall::Insert(body_arg(&args)?),
            "upsert" => ChainCall::Upsert {
                body: body_arg(&args)?,
                on_conflict: args.option_str(1, "onConflict"),
                ignore_duplicates: args.option_bool(1, "ignoreDuplicates").unwrap_or(false),
            },
            "update" => match args.value(0)? {
                JsonValue::Object(row) => ChainCall::Update(row.clone()),
                other => return Err(args.invalid(0, "one object", other)),
            },
            "delete" => ChainCall::Delete,
            other => ChainCall::Unknown(other.to_string()),
        };
        Ok(call)
    }
}

/// `likeAllOf`, `likeAnyOf`, `ilikeAllOf`, `ilikeAnyOf`.
fn is_pattern_family(method: &str) -> bool {
    matches!(method, "likeAllOf" | "likeAnyOf" | "ilikeAllOf" | "ilikeAnyOf")
}

/// `referencedTable`, or its older name `foreignTable`.
fn referenced_table(args: &Args<'_>, i: usize) -> Option<String> {
    args.option_str(i, "referencedTable")
        .or_else(|| args.option_str(i, "foreignTable"))
}

/// A typed filter value. `in` wants a list; range literals such as
/// `'[1,5)'` stay text.
fn dsl_value(op: Operator, value: &JsonValue) -> Value {
    match (op, value) {
        (Operator::In, JsonValue::String(raw)) => parse_wire_value(op, raw),
        _ => Value::from_json(value),
    }
}

fn body_arg(args: &Args<'_>) -> ConvertResult<Body> {
    match args.value(0)? {
        JsonValue::Object(row) => Ok(Body::Row(row.clone())),
        JsonValue::Array(items) => {
            let rows = items
                .iter()
                .map(|item| match item {
                    JsonValue::Object(row) => Ok(row.clone()),
                    other => Err(args.invalid(0, "an object or an array of objects", other)),
                })
                .collect::<ConvertResult<Vec<Row>>>()?;
            Ok(Body::Rows(rows))
        }
        other => Err(ConvertError::syntax(
            "INVALID_BODY_SHAPE",
            format!("{}() expects an object or an array of objects", args.method),
        )
        .at(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_methods_use_the_codec() {
        let call = ChainCall::classify("gte", &[json!("age"), json!(18)]).unwrap();
        assert_eq!(call, ChainCall::Filter(Filter::new("age", Operator::Gte, 18)));

        let call = ChainCall::classify("containedBy", &[json!("tags"), json!(["a", "b"])]).unwrap();
        let ChainCall::Filter(filter) = call else { panic!("expected a filter") };
        assert_eq!(filter.op, Operator::ContainedBy);
        assert_eq!(filter.value, Value::from(vec!["a", "b"]));
    }

    #[test]
    fn test_not_and_filter() {
        let call = ChainCall::classify("not", &[json!("status"), json!("is"), json!(null)]).unwrap();
        assert_eq!(call, ChainCall::Filter(Filter::new("status", Operator::Is, Value::Null).not()));

        let call = ChainCall::classify("filter", &[json!("id"), json!("in"), json!("(1,2)")]).unwrap();
        let ChainCall::Filter(filter) = call else { panic!("expected a filter") };
        assert_eq!(filter.value, Value::from(vec![1, 2]));
        assert!(!filter.negated);

        let call = ChainCall::classify("not", &[json!("body"), json!("fts(english)"), json!("cat")]).unwrap();
        let ChainCall::Filter(filter) = call else { panic!("expected a filter") };
        assert_eq!(filter.op, Operator::Fts);
        assert_eq!(filter.config.as_deref(), Some("english"));
        assert!(filter.negated);
    }

    #[test]
    fn test_text_search() {
        let call = ChainCall::classify(
            "textSearch",
            &[json!("body"), json!("fat & rat"), json!({"type": "plain", "config": "english"})],
        )
        .unwrap();
        let ChainCall::Filter(filter) = call else { panic!("expected a filter") };
        assert_eq!(filter.op, Operator::PlFts);
        assert_eq!(filter.config.as_deref(), Some("english"));
    }

    #[test]
    fn test_or_is_rejected() {
        let err = ChainCall::classify("or", &[json!("id.eq.1,id.eq.2")]).unwrap_err();
        assert_eq!(err.code(), "OR_UNSUPPORTED");
    }

    #[test]
    fn test_modifiers() {
        let call = ChainCall::classify("order", &[json!("created_at"), json!({"ascending": false})]).unwrap();
        assert_eq!(
            call,
            ChainCall::Order {
                column: "created_at".into(),
                ascending: false,
                nulls_first: None,
                referenced_table: None,
            }
        );
        let call = ChainCall::classify("limit", &[json!(5), json!({"foreignTable": "posts"})]).unwrap();
        assert_eq!(
            call,
            ChainCall::Limit {
                count: 5,
                referenced_table: Some("posts".into())
            }
        );
    }

    #[test]
    fn test_mutations() {
        let call = ChainCall::classify("insert", &[json!([{"a": 1}, {"a": 2}])]).unwrap();
        assert!(matches!(call, ChainCall::Insert(Body::Rows(ref rows)) if rows.len() == 2));

        let call = ChainCall::classify(
            "upsert",
            &[json!({"id": 1}), json!({"onConflict": "id", "ignoreDuplicates": true})],
        )
        .unwrap();
        assert!(matches!(call, ChainCall::Upsert { ignore_duplicates: true, .. }));

        let err = ChainCall::classify("update", &[json!([{"a": 1}])]).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
        let err = ChainCall::classify("insert", &[json!(42)]).unwrap_err();
        assert_eq!(err.code(), "INVALID_BODY_SHAPE");
    }

    #[test]
    fn test_unknown_and_unsupported() {
        assert_eq!(
            ChainCall::classify("abortSignal", &[json!("signal")]).unwrap(),
            ChainCall::Unknown("abortSignal".into())
        );
        let err = ChainCall::classify("likeAnyOf", &[json!("name"), json!(["a%"])]).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_OPERATION");
    }
}
