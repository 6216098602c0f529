//! Conversion orchestrators.
//!
//! Every direction runs the same pipeline: parse into a [`Query`],
//! validate it for the target, build the target text, and collect the
//! warnings each stage raised.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

use crate::ast::{HttpRequest, Operation, Query, RestRequest};
use crate::config::ConvertOptions;
use crate::error::ConvertResult;
use crate::parser::dsl::{DslOutput, HttpOnlyCall};
use crate::parser::{self, Parsed};
use crate::transpiler::{self, ForeignKeyPolicy, ToSql};
use crate::validator;

/// One of the three surface syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    Sql,
    Rest,
    Dsl,
}

impl FromStr for Syntax {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql" => Ok(Syntax::Sql),
            "rest" | "http" | "postgrest" => Ok(Syntax::Rest),
            "dsl" | "js" | "supabase" => Ok(Syntax::Dsl),
            other => Err(format!("unknown syntax '{}' (expected sql, rest or dsl)", other)),
        }
    }
}

impl std::fmt::Display for Syntax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Syntax::Sql => write!(f, "sql"),
            Syntax::Rest => write!(f, "rest"),
            Syntax::Dsl => write!(f, "dsl"),
        }
    }
}

/// The result of one conversion.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConversionResult {
    /// The converted text, or a description for HTTP-only calls.
    pub output: String,
    pub warnings: Vec<String>,
    /// Facts the output cannot carry: `operation`, `table`, `count`,
    /// assumed join keys.
    pub metadata: BTreeMap<String, String>,
    /// The structured request, for REST output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpRequest>,
    /// True when the input has no SQL or table-query form.
    pub http_only: bool,
}

/// What a parse produced.
enum Source {
    Query(Parsed),
    Http(HttpOnlyCall),
}

/// Converts between SQL, REST and the client DSL.
///
/// Holds only immutable options, so one converter can be shared across
/// threads.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ConvertOptions,
    policy: ForeignKeyPolicy,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        let policy = ForeignKeyPolicy::from_options(&options);
        Self { options, policy }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// REST request → SQL statement.
    pub fn rest_to_sql(&self, request: &RestRequest) -> ConvertResult<ConversionResult> {
        let parsed = parser::rest::parse(request, &self.options)?;
        self.build(parsed, Syntax::Sql)
    }

    /// SQL statement → REST request.
    pub fn sql_to_rest(&self, sql: &str) -> ConvertResult<ConversionResult> {
        let parsed = parser::sql::parse(sql, &self.options)?;
        self.build(parsed, Syntax::Rest)
    }

    /// DSL chain → REST request. Auth and storage calls are HTTP-only.
    pub fn dsl_to_rest(&self, dsl: &str) -> ConvertResult<ConversionResult> {
        match self.parse_dsl(dsl)? {
            Source::Query(parsed) => self.build(parsed, Syntax::Rest),
            Source::Http(call) => Ok(http_only(call)),
        }
    }

    /// DSL chain → SQL statement.
    pub fn dsl_to_sql(&self, dsl: &str) -> ConvertResult<ConversionResult> {
        let parsed = parser::dsl::parse_query(dsl, &self.options)?;
        self.build(parsed, Syntax::Sql)
    }

    /// SQL statement → DSL chain.
    pub fn sql_to_dsl(&self, sql: &str) -> ConvertResult<ConversionResult> {
        let parsed = parser::sql::parse(sql, &self.options)?;
        self.build(parsed, Syntax::Dsl)
    }

    /// REST request → DSL chain.
    pub fn rest_to_dsl(&self, request: &RestRequest) -> ConvertResult<ConversionResult> {
        let parsed = parser::rest::parse(request, &self.options)?;
        self.build(parsed, Syntax::Dsl)
    }

    /// Convert text between any two syntaxes. REST input is the text form
    /// of a request: request line, header lines, blank line, body.
    pub fn convert(&self, from: Syntax, to: Syntax, input: &str) -> ConvertResult<ConversionResult> {
        tracing::debug!("converting {} -> {}", from, to);
        let source = match from {
            Syntax::Sql => Source::Query(parser::sql::parse(input, &self.options)?),
            Syntax::Rest => {
                let request = RestRequest::parse_text(input)?;
                Source::Query(parser::rest::parse(&request, &self.options)?)
            }
            Syntax::Dsl if to == Syntax::Rest => self.parse_dsl(input)?,
            Syntax::Dsl => Source::Query(parser::dsl::parse_query(input, &self.options)?),
        };
        match source {
            Source::Query(parsed) => self.build(parsed, to),
            Source::Http(call) => Ok(http_only(call)),
        }
    }

    fn parse_dsl(&self, dsl: &str) -> ConvertResult<Source> {
        Ok(match parser::dsl::parse(dsl, &self.options)? {
            DslOutput::Query(parsed) => Source::Query(parsed),
            DslOutput::Http(call) => Source::Http(call),
        })
    }

    /// Validate and build `parsed` in the target syntax.
    fn build(&self, parsed: Parsed, to: Syntax) -> ConvertResult<ConversionResult> {
        let Parsed { query, warnings } = parsed;
        validator::validate(&query, to)?;

        let mut result = ConversionResult {
            warnings,
            metadata: base_metadata(&query),
            ..Default::default()
        };

        match to {
            Syntax::Sql => {
                let stmt = query.to_sql(&self.policy)?;
                result.output = stmt.sql;
                result.warnings.extend(stmt.warnings);
                result.metadata.extend(stmt.metadata);
            }
            Syntax::Rest => {
                let built = transpiler::rest::build_request(&query)?;
                result.warnings.extend(built.warnings);
                if query.operation == Operation::Rpc {
                    result.output = format!("Call database function '{}'", query.table);
                    result.http_only = true;
                } else {
                    result.output = built.request.to_string();
                }
                result.http = Some(built.request);
            }
            Syntax::Dsl => {
                let built = transpiler::dsl::build_chain(&query, &self.options.client_name)?;
                result.output = built.code;
                result.warnings.extend(built.warnings);
            }
        }

        tracing::debug!(
            "converted {} on '{}' to {} with {} warning(s)",
            query.operation,
            query.table,
            to,
            result.warnings.len()
        );
        Ok(result)
    }
}

fn base_metadata(query: &Query) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("operation".to_string(), query.operation.to_string().to_ascii_lowercase());
    metadata.insert("table".to_string(), query.table.clone());
    metadata
}

fn http_only(call: HttpOnlyCall) -> ConversionResult {
    let mut metadata = BTreeMap::new();
    metadata.insert("method".to_string(), call.request.method.to_string());
    metadata.insert("path".to_string(), call.request.path.clone());
    ConversionResult {
        output: call.description,
        warnings: call.warnings,
        metadata,
        http: Some(call.request),
        http_only: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::HttpMethod;

    fn converter() -> Converter {
        Converter::default()
    }

    #[test]
    fn test_syntax_names() {
        assert_eq!("SQL".parse::<Syntax>(), Ok(Syntax::Sql));
        assert_eq!("http".parse::<Syntax>(), Ok(Syntax::Rest));
        assert_eq!("supabase".parse::<Syntax>(), Ok(Syntax::Dsl));
        assert!("graphql".parse::<Syntax>().is_err());
        assert_eq!(Syntax::Rest.to_string(), "rest");
    }

    #[test]
    fn test_rest_to_sql() {
        let request = RestRequest::new("GET", "/users?age=gte.18&status=eq.active");
        let result = converter().rest_to_sql(&request).unwrap();
        assert_eq!(result.output, "SELECT * FROM users WHERE age >= 18 AND status = 'active'");
        assert_eq!(result.metadata["operation"], "select");
        assert_eq!(result.metadata["table"], "users");
    }

    #[test]
    fn test_dsl_to_rest() {
        let result = converter()
            .dsl_to_rest("supabase.from('users').insert({ name: 'Alice', age: 30 })")
            .unwrap();
        let http = result.http.unwrap();
        assert_eq!(http.method, HttpMethod::Post);
        assert_eq!(http.path, "/users");
        assert_eq!(http.body.unwrap().to_string(), r#"{"name":"Alice","age":30}"#);
        assert!(!result.http_only);
    }

    #[test]
    fn test_auth_is_http_only() {
        let result = converter()
            .dsl_to_rest("supabase.auth.signInWithPassword({ email: 'a@b.co', password: 'pw' })")
            .unwrap();
        assert!(result.http_only);
        assert!(!result.warnings.is_empty());
        assert_eq!(result.http.unwrap().path, "/auth/v1/token");

        let err = converter().dsl_to_sql("supabase.auth.getUser()").unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_OPERATION");
    }

    #[test]
    fn test_rpc_is_http_only() {
        let result = converter().dsl_to_rest("supabase.rpc('add_one', { n: 1 })").unwrap();
        assert!(result.http_only);
        assert_eq!(result.http.unwrap().path, "/rpc/add_one");
        assert!(!result.warnings.is_empty());

        let err = converter().dsl_to_sql("supabase.rpc('add_one', { n: 1 })").unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_OPERATION");
    }

    #[test]
    fn test_delete_without_filter() {
        let err = converter().rest_to_sql(&RestRequest::new("DELETE", "/users")).unwrap_err();
        assert_eq!(err.code(), "DELETE_NO_WHERE");
    }

    #[test]
    fn test_convert_dispatch() {
        let c = converter();
        let result = c
            .convert(Syntax::Rest, Syntax::Dsl, "GET /users?select=id&age=gte.18\nPrefer: count=exact")
            .unwrap();
        assert_eq!(
            result.output,
            "supabase.from('users').select('id', { count: 'exact' }).gte('age', 18)"
        );

        let result = c.convert(Syntax::Sql, Syntax::Rest, "DELETE FROM users WHERE id = 1").unwrap();
        assert_eq!(result.output, "DELETE /users?id=eq.1");
    }

    #[test]
    fn test_converter_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Converter>();
    }
}
