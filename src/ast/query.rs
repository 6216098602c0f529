use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::ast::{
    CountMode, EmbeddedResource, Filter, Operation, Operator, OrderSpec, SingleMode, Value,
};
use crate::error::{ConvertError, ConvertResult};

/// Type names that are spelled with more than one word.
const MULTI_WORD_TYPES: &[&str] = &[
    "double precision",
    "character varying",
    "bit varying",
    "timestamp with time zone",
    "timestamp without time zone",
    "time with time zone",
    "time without time zone",
];

/// A JSON object with first-seen key order.
pub type Row = Map<String, JsonValue>;

/// The canonical query every surface syntax parses into and builds from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Target table, or function name for [`Operation::Rpc`].
    pub table: String,
    pub operation: Operation,
    /// Output columns. `[*]` selects everything.
    pub columns: Vec<Column>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order: Vec<OrderSpec>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    /// Inclusive row range, `Range: from-to`.
    #[serde(default)]
    pub range: Option<(u64, u64)>,
    #[serde(default)]
    pub body: Option<Body>,
    /// Embedded resources. Never duplicated in `columns`.
    #[serde(default)]
    pub embeds: Vec<EmbeddedResource>,
    #[serde(default)]
    pub count: Option<CountMode>,
    /// Count only, no rows (`head: true`).
    #[serde(default)]
    pub head: bool,
    #[serde(default)]
    pub single: Option<SingleMode>,
    /// Upsert conflict target, comma-separated columns.
    #[serde(default)]
    pub on_conflict: Option<String>,
    #[serde(default)]
    pub ignore_duplicates: bool,
    /// Mutations return the affected rows (`Prefer: return=representation`).
    #[serde(default)]
    pub returning: bool,
}

impl Query {
    /// Create a query of the given operation against `table`.
    pub fn new(operation: Operation, table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            operation,
            columns: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            range: None,
            body: None,
            embeds: Vec::new(),
            count: None,
            head: false,
            single: None,
            on_conflict: None,
            ignore_duplicates: false,
            returning: false,
        }
    }

    /// `SELECT * FROM table`
    pub fn select(table: impl Into<String>) -> Self {
        let mut query = Self::new(Operation::Select, table);
        query.columns.push(Column::star());
        query
    }

    pub fn insert(table: impl Into<String>, body: Body) -> Self {
        let mut query = Self::new(Operation::Insert, table);
        query.body = Some(body);
        query
    }

    pub fn update(table: impl Into<String>, row: Row) -> Self {
        let mut query = Self::new(Operation::Update, table);
        query.body = Some(Body::Row(row));
        query
    }

    pub fn delete(table: impl Into<String>) -> Self {
        Self::new(Operation::Delete, table)
    }

    /// Replace the output columns.
    pub fn columns<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.columns = cols.into_iter().map(|c| Column::parse(c.as_ref())).collect();
        self
    }

    /// Append an AND filter.
    pub fn filter(mut self, column: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(column, op, value));
        self
    }

    pub fn order_by(mut self, spec: OrderSpec) -> Self {
        self.order.push(spec);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn embed(mut self, embed: EmbeddedResource) -> Self {
        self.embeds.push(embed);
        self
    }

    /// True when the column list is empty or only `*`.
    pub fn selects_all(&self) -> bool {
        self.columns.is_empty() || (self.columns.len() == 1 && self.columns[0].is_star())
    }

    /// The `select` query parameter value: columns then embeds.
    pub fn select_param(&self) -> String {
        let mut items: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        items.extend(self.embeds.iter().map(|e| e.to_select_item()));
        items.join(",")
    }
}

/// One output column: `alias:name::cast`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast: Option<String>,
}

impl Column {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            cast: None,
        }
    }

    pub fn star() -> Self {
        Self::named("*")
    }

    pub fn is_star(&self) -> bool {
        self.name == "*"
    }

    /// Reject a cast that is not a plain type name. Cast text is written
    /// into SQL verbatim, so it must never carry anything else.
    pub fn check_cast(&self) -> ConvertResult<()> {
        match &self.cast {
            Some(cast) if !is_type_name(cast) => Err(ConvertError::syntax(
                "INVALID_COLUMN",
                format!("'{}' is not a type name", cast),
            )
            .at(self.to_string())
            .hint("casts take a type such as text, int4, numeric(10,2) or text[]")),
            _ => Ok(()),
        }
    }

    /// Parse the wire form `alias:name::cast`; every part but `name` is optional.
    pub fn parse(item: &str) -> Self {
        let item = item.trim();
        let (head, cast) = match item.split_once("::") {
            Some((head, cast)) => (head, Some(cast.trim().to_string())),
            None => (item, None),
        };
        let (alias, name) = match head.split_once(':') {
            Some((alias, name)) => (Some(alias.trim().to_string()), name.trim()),
            None => (None, head.trim()),
        };
        Self {
            name: name.to_string(),
            alias,
            cast,
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(alias) = &self.alias {
            write!(f, "{}:", alias)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(cast) = &self.cast {
            write!(f, "::{}", cast)?;
        }
        Ok(())
    }
}

/// `name`, `schema.name`, a known multi-word name, then an optional
/// `(n)` or `(n,m)` modifier and any number of `[]`.
pub fn is_type_name(cast: &str) -> bool {
    let mut rest = cast.trim();
    while let Some(inner) = rest.strip_suffix("[]") {
        rest = inner.trim_end();
    }
    if let Some(open) = rest.find('(') {
        let Some(args) = rest[open + 1..].strip_suffix(')') else {
            return false;
        };
        let mut parts = args.split(',').map(str::trim);
        let numeric = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
        let ok = match (parts.next(), parts.next(), parts.next()) {
            (Some(n), None, None) => numeric(n),
            (Some(n), Some(m), None) => numeric(n) && numeric(m),
            _ => false,
        };
        if !ok {
            return false;
        }
        rest = rest[..open].trim_end();
    }

    let words: Vec<&str> = rest.split_whitespace().collect();
    match words.as_slice() {
        [] => false,
        [word] => word.split('.').all(|part| {
            part.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }),
        _ => {
            let phrase = words.join(" ").to_ascii_lowercase();
            MULTI_WORD_TYPES.contains(&phrase.as_str())
        }
    }
}

/// Mutation payload or RPC arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Body {
    /// One row.
    Row(Row),
    /// Bulk rows.
    Rows(Vec<Row>),
    /// Opaque RPC parameters.
    Params(Row),
}

impl Body {
    pub fn to_json(&self) -> JsonValue {
        match self {
            Body::Row(row) | Body::Params(row) => JsonValue::Object(row.clone()),
            Body::Rows(rows) => JsonValue::Array(rows.iter().cloned().map(JsonValue::Object).collect()),
        }
    }

    /// Rows for an INSERT; `Params` has none.
    pub fn rows(&self) -> Vec<&Row> {
        match self {
            Body::Row(row) => vec![row],
            Body::Rows(rows) => rows.iter().collect(),
            Body::Params(_) => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Row(row) | Body::Params(row) => row.is_empty(),
            Body::Rows(rows) => rows.is_empty() || rows.iter().all(|r| r.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_parse() {
        assert_eq!(Column::parse("name"), Column::named("name"));
        let col = Column::parse("full:name::text");
        assert_eq!(col.alias.as_deref(), Some("full"));
        assert_eq!(col.name, "name");
        assert_eq!(col.cast.as_deref(), Some("text"));
        assert_eq!(col.to_string(), "full:name::text");
    }

    #[test]
    fn test_type_names() {
        for cast in [
            "text",
            "int4",
            "pg_catalog.int8",
            "numeric(10,2)",
            "varchar( 32 )",
            "text[]",
            "int[][]",
            "double precision",
            "Timestamp With Time Zone",
            "character varying(20)[]",
        ] {
            assert!(is_type_name(cast), "{}", cast);
        }
        for cast in [
            "",
            "text FROM secrets;DROP TABLE users;--",
            "text FROM secrets",
            "text, password",
            "int)",
            "numeric(10,2,3)",
            "numeric(a)",
            "1int",
            "text'",
            "text--",
        ] {
            assert!(!is_type_name(cast), "{}", cast);
        }
    }

    #[test]
    fn test_check_cast() {
        assert!(Column::parse("n::int").check_cast().is_ok());
        assert!(Column::named("n").check_cast().is_ok());
        let err = Column::parse("n::int; DROP TABLE users").check_cast().unwrap_err();
        assert_eq!(err.code(), "INVALID_COLUMN");
    }

    #[test]
    fn test_select_param() {
        let query = Query::select("users")
            .columns(["name"])
            .embed(EmbeddedResource::new("posts").columns(["title", "year"]));
        assert_eq!(query.select_param(), "name,posts(title,year)");
        assert!(!query.selects_all());
        assert!(Query::select("users").selects_all());
    }

    #[test]
    fn test_body_rows() {
        let row: Row = serde_json::from_str(r#"{"name":"Alice"}"#).unwrap();
        let body = Body::Rows(vec![row.clone(), row]);
        assert_eq!(body.rows().len(), 2);
        assert!(!body.is_empty());
        assert!(Body::Rows(vec![]).is_empty());
    }
}
