//! HTTP request shapes: the raw request a REST parse starts from, and the
//! structured request the REST builder produces.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ConvertError, ConvertResult};

/// Characters escaped in query-string keys and values. PostgREST
/// punctuation (`( ) , . : * ! { }`) stays readable.
const QUERY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'`');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Patch,
    Delete,
    Put,
}

impl HttpMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "HEAD" => Some(HttpMethod::Head),
            "POST" => Some(HttpMethod::Post),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "PUT" => Some(HttpMethod::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Put => "PUT",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured HTTP request: method, path, decoded query pairs, headers, JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub query: Vec<(String, String)>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter.
    pub fn push_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// First query parameter named `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Set a header, merging comma-separated values into an existing one.
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, existing)) => {
                existing.push(',');
                existing.push_str(&value);
            }
            None => self.headers.push((name.to_string(), value)),
        }
    }

    /// The percent-encoded query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, QUERY_ENCODE_SET),
                    utf8_percent_encode(v, QUERY_ENCODE_SET)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Path plus query string.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string())
        }
    }

    /// The raw form of this request, as a REST parse would receive it.
    pub fn to_rest_request(&self) -> RestRequest {
        RestRequest {
            method: self.method.as_str().to_string(),
            path: self.path.clone(),
            query: self.query_string(),
            headers: self.headers.clone(),
            body: self.body.as_ref().map(|b| b.to_string()),
        }
    }
}

impl std::fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url())?;
        for (name, value) in &self.headers {
            write!(f, "\n{}: {}", name, value)?;
        }
        if let Some(body) = &self.body {
            write!(f, "\n\n{}", body)?;
        }
        Ok(())
    }
}

/// A raw REST request: what a REST parse consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestRequest {
    pub method: String,
    pub path: String,
    /// URL-encoded query string without the leading `?`.
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<String>,
}

impl RestRequest {
    /// Build from a method and a request target (`/users?age=gte.18`).
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        Self {
            method: method.into(),
            path: path.to_string(),
            query: query.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Parse the text form:
    ///
    /// ```text
    /// POST /users?select=id
    /// Prefer: return=representation
    ///
    /// {"name": "Alice"}
    /// ```
    pub fn parse_text(text: &str) -> ConvertResult<Self> {
        let text = text.trim();
        let mut lines = text.lines();
        let request_line = lines.next().unwrap_or_default().trim();
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
            return Err(ConvertError::syntax("INVALID_REQUEST", "expected `<METHOD> <path>`")
                .at(request_line)
                .hint("e.g. `GET /users?age=gte.18`"));
        };
        let mut request = Self::new(method, target);

        let mut body_lines = Vec::new();
        let mut in_body = false;
        for line in lines {
            if in_body {
                body_lines.push(line);
                continue;
            }
            if line.trim().is_empty() {
                in_body = true;
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) if !name.trim().starts_with('{') && !name.trim().starts_with('[') => {
                    request.headers.push((name.trim().to_string(), value.trim().to_string()));
                }
                _ => {
                    // A body right after the request line, without a blank separator.
                    in_body = true;
                    body_lines.push(line);
                }
            }
        }

        let body = body_lines.join("\n");
        if !body.trim().is_empty() {
            request.body = Some(body.trim().to_string());
        }
        Ok(request)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_keeps_postgrest_punctuation() {
        let mut req = HttpRequest::new(HttpMethod::Get, "/users");
        req.push_param("select", "name,posts(title)");
        req.push_param("name", "eq.Tom & Jerry");
        assert_eq!(
            req.url(),
            "/users?select=name,posts(title)&name=eq.Tom%20%26%20Jerry"
        );
    }

    #[test]
    fn test_append_header_merges() {
        let mut req = HttpRequest::new(HttpMethod::Post, "/users");
        req.append_header("Prefer", "return=representation");
        req.append_header("prefer", "count=exact");
        assert_eq!(req.header("PREFER"), Some("return=representation,count=exact"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn test_parse_text() {
        let req = RestRequest::parse_text(
            "POST /users?select=id\nPrefer: return=representation\n\n{\"name\": \"Alice\"}",
        )
        .unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/users");
        assert_eq!(req.query, "select=id");
        assert_eq!(req.header("prefer"), Some("return=representation"));
        assert_eq!(req.body.as_deref(), Some("{\"name\": \"Alice\"}"));
    }

    #[test]
    fn test_parse_text_without_blank_line() {
        let req = RestRequest::parse_text("PATCH /users?id=eq.1\n{\"name\": \"Bob\"}").unwrap();
        assert!(req.headers.is_empty());
        assert_eq!(req.body.as_deref(), Some("{\"name\": \"Bob\"}"));
    }

    #[test]
    fn test_parse_text_rejects_missing_path() {
        let err = RestRequest::parse_text("GET").unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_display_round_trips_through_parse_text() {
        let mut req = HttpRequest::new(HttpMethod::Post, "/users");
        req.append_header("Content-Type", "application/json");
        req.body = Some(serde_json::json!({"name": "Alice"}));
        let raw = RestRequest::parse_text(&req.to_string()).unwrap();
        assert_eq!(raw, req.to_rest_request());
    }
}
