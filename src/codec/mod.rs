//! Operator codec.
//!
//! One static table maps each canonical operator tag to its SQL operator,
//! its full-text function and its client-DSL method. Every direction reads
//! the same rows, so a tag means the same thing in SQL, on the wire and in
//! a method chain.

pub mod literal;

pub use literal::{literal_json, literalize, parse_wire_value, quote, wire_token};

use crate::ast::Operator;
use crate::error::{ConvertError, ConvertResult};

/// One row of the operator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorEntry {
    pub op: Operator,
    /// Wire tag, e.g. `gte`.
    pub tag: &'static str,
    /// SQL operator or keyword, e.g. `>=`.
    pub sql: &'static str,
    /// Text-to-query function wrapping full-text values.
    pub ts_function: Option<&'static str>,
    /// Client DSL method, when one exists.
    pub dsl_method: Option<&'static str>,
}

const fn entry(
    op: Operator,
    tag: &'static str,
    sql: &'static str,
    ts_function: Option<&'static str>,
    dsl_method: Option<&'static str>,
) -> OperatorEntry {
    OperatorEntry {
        op,
        tag,
        sql,
        ts_function,
        dsl_method,
    }
}

/// The operator table, indexed by `Operator as usize`.
pub static OPERATORS: [OperatorEntry; 24] = [
    entry(Operator::Eq, "eq", "=", None, Some("eq")),
    entry(Operator::Neq, "neq", "!=", None, Some("neq")),
    entry(Operator::Gt, "gt", ">", None, Some("gt")),
    entry(Operator::Gte, "gte", ">=", None, Some("gte")),
    entry(Operator::Lt, "lt", "<", None, Some("lt")),
    entry(Operator::Lte, "lte", "<=", None, Some("lte")),
    entry(Operator::Like, "like", "LIKE", None, Some("like")),
    entry(Operator::ILike, "ilike", "ILIKE", None, Some("ilike")),
    entry(Operator::Match, "match", "~", None, None),
    entry(Operator::IMatch, "imatch", "~*", None, None),
    entry(Operator::Contains, "cs", "@>", None, Some("contains")),
    entry(Operator::ContainedBy, "cd", "<@", None, Some("containedBy")),
    entry(Operator::Overlaps, "ov", "&&", None, Some("overlaps")),
    entry(Operator::StrictlyLeft, "sl", "<<", None, Some("rangeLt")),
    entry(Operator::StrictlyRight, "sr", ">>", None, Some("rangeGt")),
    entry(Operator::NotExtendRight, "nxr", "&<", None, Some("rangeLte")),
    entry(Operator::NotExtendLeft, "nxl", "&>", None, Some("rangeGte")),
    entry(Operator::Adjacent, "adj", "-|-", None, Some("rangeAdjacent")),
    entry(Operator::Is, "is", "IS", None, Some("is")),
    entry(Operator::In, "in", "IN", None, Some("in")),
    entry(Operator::Fts, "fts", "@@", Some("to_tsquery"), None),
    entry(Operator::PlFts, "plfts", "@@", Some("plainto_tsquery"), None),
    entry(Operator::PhFts, "phfts", "@@", Some("phraseto_tsquery"), None),
    entry(Operator::WFts, "wfts", "@@", Some("websearch_to_tsquery"), None),
];

impl Operator {
    /// This operator's row in [`OPERATORS`].
    pub fn entry(self) -> &'static OperatorEntry {
        &OPERATORS[self as usize]
    }

    /// Wire tag (`gte`).
    pub fn tag(self) -> &'static str {
        self.entry().tag
    }

    /// SQL operator (`>=`).
    pub fn sql(self) -> &'static str {
        self.entry().sql
    }

    /// Full-text query function, for the four text-search tags.
    pub fn ts_function(self) -> Option<&'static str> {
        self.entry().ts_function
    }

    pub fn dsl_method(self) -> Option<&'static str> {
        self.entry().dsl_method
    }

    pub fn is_full_text(self) -> bool {
        self.entry().ts_function.is_some()
    }

    /// Resolve a wire tag. A miss is an Unsupported error naming the tag.
    pub fn from_tag(tag: &str) -> ConvertResult<Operator> {
        if let Some(e) = OPERATORS.iter().find(|e| e.tag == tag) {
            return Ok(e.op);
        }
        let mut err = ConvertError::unsupported("UNKNOWN_OPERATOR", format!("unknown operator '{}'", tag))
            .at(tag);
        if let Some(closest) = closest_tag(tag) {
            err = err.hint(format!("did you mean '{}'?", closest));
        } else {
            err = err.hint("supported tags: eq, neq, gt, gte, lt, lte, like, ilike, is, in, cs, cd, fts, ...");
        }
        Err(err)
    }

    /// Resolve a DSL filter method (`gte`, `containedBy`, `rangeLt`, ...).
    pub fn from_dsl_method(method: &str) -> Option<Operator> {
        OPERATORS
            .iter()
            .find(|e| e.dsl_method == Some(method))
            .map(|e| e.op)
    }

    /// Resolve a binary SQL operator symbol. `<>` reads as `neq`.
    pub fn from_sql(symbol: &str) -> Option<Operator> {
        if symbol == "<>" {
            return Some(Operator::Neq);
        }
        OPERATORS
            .iter()
            .find(|e| e.sql == symbol && e.ts_function.is_none())
            .map(|e| e.op)
    }

    /// Resolve a full-text function name back to its tag.
    pub fn from_ts_function(name: &str) -> Option<Operator> {
        OPERATORS
            .iter()
            .find(|e| e.ts_function.is_some_and(|f| f.eq_ignore_ascii_case(name)))
            .map(|e| e.op)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Closest known tag by edit distance, for "did you mean" hints.
fn closest_tag(input: &str) -> Option<&'static str> {
    let threshold = match input.len() {
        0..=2 => 1,
        3..=5 => 2,
        _ => 3,
    };
    OPERATORS
        .iter()
        .map(|e| (e.tag, strsim::levenshtein(input, e.tag)))
        .filter(|(_, dist)| *dist <= threshold)
        .min_by_key(|(_, dist)| *dist)
        .map(|(tag, _)| tag)
}
