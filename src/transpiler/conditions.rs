//! Filter to SQL condition rendering.

use crate::ast::{Filter, LogicalOp, Operator, Value};
use crate::codec::literalize;
use crate::error::{ConvertError, ConvertResult};
use crate::transpiler::traits::qualified;

/// Render one filter as a SQL condition, optionally table-qualified.
///
/// Negation picks the natural SQL form where one exists (`IS NOT`,
/// `NOT IN`, `NOT LIKE`, `!~`) and wraps as `NOT (...)` otherwise.
pub fn condition_sql(filter: &Filter, qualifier: Option<&str>) -> ConvertResult<String> {
    if filter.connective == LogicalOp::Or {
        return Err(ConvertError::unsupported("OR_UNSUPPORTED", "OR conditions are not supported")
            .at(filter.column.clone())
            .hint("split the query, or express the condition with in.(...)"));
    }

    let column = qualified(qualifier, &filter.column);
    let op = filter.op;
    let literal = literalize(op, &filter.value, filter.config.as_deref());

    let sql = match (op, filter.negated) {
        (Operator::Is, true) => format!("{} IS NOT {}", column, literal),
        (Operator::In, negated) if is_empty_list(&filter.value) => {
            // `in.()` matches nothing; `IN ()` is not valid SQL.
            if negated { "TRUE".to_string() } else { "FALSE".to_string() }
        }
        (Operator::In | Operator::Like | Operator::ILike, true) => {
            format!("{} NOT {} {}", column, op.sql(), literal)
        }
        (Operator::Match, true) => format!("{} !~ {}", column, literal),
        (Operator::IMatch, true) => format!("{} !~* {}", column, literal),
        (_, true) => format!("NOT ({} {} {})", column, op.sql(), literal),
        (_, false) => format!("{} {} {}", column, op.sql(), literal),
    };
    Ok(sql)
}

/// Render filters joined with ` AND `.
pub fn conditions_sql(filters: &[Filter], qualifier: Option<&str>) -> ConvertResult<Vec<String>> {
    filters.iter().map(|f| condition_sql(f, qualifier)).collect()
}

fn is_empty_list(value: &Value) -> bool {
    matches!(value, Value::List(items) if items.is_empty())
}
