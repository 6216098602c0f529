//! `auth` and `storage` namespaces.
//!
//! These calls never touch a table, so they have no SQL form. They map to
//! the HTTP request the client library would send.

use serde_json::{Value as JsonValue, json};

use crate::ast::{HttpMethod, HttpRequest, Row};
use crate::error::{ConvertError, ConvertResult};
use crate::parser::dsl::Segment;
use crate::parser::dsl::args::Args;

const AUTH: &str = "/auth/v1";
const STORAGE: &str = "/storage/v1";
const BEARER: &str = "Bearer <access_token>";

/// An HTTP-only call: the request, what it does, and why it has no SQL form.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpOnlyCall {
    pub request: HttpRequest,
    pub description: String,
    pub warnings: Vec<String>,
}

impl HttpOnlyCall {
    fn new(request: HttpRequest, description: impl Into<String>) -> Self {
        Self {
            request,
            description: description.into(),
            warnings: Vec::new(),
        }
    }
}

/// Map the calls after `auth`.
pub(crate) fn auth_call(segments: &[Segment]) -> ConvertResult<HttpOnlyCall> {
    let (method, values) = first_call(segments, "auth")?;
    let args = Args::new(method, values);

    let mut call = match method {
        "signUp" => {
            let body = credentials(&args)?;
            HttpOnlyCall::new(post(format!("{}/signup", AUTH), body), "Register a new user")
        }
        "signInWithPassword" => {
            let body = credentials(&args)?;
            let mut request = post(format!("{}/token", AUTH), body);
            request.push_param("grant_type", "password");
            HttpOnlyCall::new(request, "Sign in with email or phone and password")
        }
        "signInWithOtp" => {
            let body = credentials(&args)?;
            HttpOnlyCall::new(post(format!("{}/otp", AUTH), body), "Send a one-time login code or magic link")
        }
        "verifyOtp" => {
            let body = credentials(&args)?;
            HttpOnlyCall::new(post(format!("{}/verify", AUTH), body), "Verify a one-time code")
        }
        "signInWithOAuth" => {
            let provider = args
                .object(0)?
                .get("provider")
                .and_then(JsonValue::as_str)
                .unwrap_or("<provider>")
                .to_string();
            let mut request = HttpRequest::new(HttpMethod::Get, format!("{}/authorize", AUTH));
            request.push_param("provider", provider.as_str());
            HttpOnlyCall::new(request, format!("Redirect to the {} OAuth flow", provider))
        }
        "signOut" => {
            let mut request = HttpRequest::new(HttpMethod::Post, format!("{}/logout", AUTH));
            request.append_header("Authorization", BEARER);
            HttpOnlyCall::new(request, "End the current session")
        }
        "getUser" => {
            let mut request = HttpRequest::new(HttpMethod::Get, format!("{}/user", AUTH));
            request.append_header("Authorization", BEARER);
            HttpOnlyCall::new(request, "Fetch the signed-in user")
        }
        "updateUser" => {
            let mut request = HttpRequest::new(HttpMethod::Put, format!("{}/user", AUTH));
            request.append_header("Authorization", BEARER);
            with_json(&mut request, JsonValue::Object(args.object(0)?.clone()));
            HttpOnlyCall::new(request, "Update the signed-in user")
        }
        "resetPasswordForEmail" => {
            let email = args.str(0)?;
            HttpOnlyCall::new(
                post(format!("{}/recover", AUTH), json!({ "email": email })),
                "Send a password recovery email",
            )
        }
        "refreshSession" => {
            let mut request = post(format!("{}/token", AUTH), json!({ "refresh_token": "<refresh_token>" }));
            request.push_param("grant_type", "refresh_token");
            HttpOnlyCall::new(request, "Exchange a refresh token for a new session")
        }
        other => return Err(unsupported("auth", other)),
    };
    call.warnings
        .push(format!("auth.{}() has no SQL equivalent; only the HTTP request is shown", method));
    Ok(call)
}

/// Map the calls after `storage`.
pub(crate) fn storage_call(segments: &[Segment]) -> ConvertResult<HttpOnlyCall> {
    let (method, values) = first_call(segments, "storage")?;
    let args = Args::new(method, values);

    let mut call = match method {
        "from" => {
            let bucket = args.str(0)?;
            let (object_method, object_values) = first_call(&segments[1..], "storage.from()")?;
            object_call(&bucket, Args::new(object_method, object_values))?
        }
        "listBuckets" => HttpOnlyCall::new(
            HttpRequest::new(HttpMethod::Get, format!("{}/bucket", STORAGE)),
            "List all buckets",
        ),
        "getBucket" => {
            let id = args.str(0)?;
            HttpOnlyCall::new(
                HttpRequest::new(HttpMethod::Get, format!("{}/bucket/{}", STORAGE, id)),
                format!("Fetch bucket '{}'", id),
            )
        }
        "createBucket" => {
            let id = args.str(0)?;
            let public = args.option_bool(1, "public").unwrap_or(false);
            HttpOnlyCall::new(
                post(
                    format!("{}/bucket", STORAGE),
                    json!({ "id": id, "name": id, "public": public }),
                ),
                format!("Create bucket '{}'", id),
            )
        }
        "emptyBucket" => {
            let id = args.str(0)?;
            HttpOnlyCall::new(
                HttpRequest::new(HttpMethod::Post, format!("{}/bucket/{}/empty", STORAGE, id)),
                format!("Delete every object in bucket '{}'", id),
            )
        }
        "deleteBucket" => {
            let id = args.str(0)?;
            HttpOnlyCall::new(
                HttpRequest::new(HttpMethod::Delete, format!("{}/bucket/{}", STORAGE, id)),
                format!("Delete bucket '{}'", id),
            )
        }
        other => return Err(unsupported("storage", other)),
    };
    call.warnings
        .push("storage calls have no SQL equivalent; only the HTTP request is shown".to_string());
    Ok(call)
}

fn object_call(bucket: &str, args: Args<'_>) -> ConvertResult<HttpOnlyCall> {
    let object_url = |prefix: &str, path: &str| {
        format!("{}/object/{}{}/{}", STORAGE, prefix, bucket, path.trim_start_matches('/'))
    };

    let call = match args.method {
        "upload" | "update" => {
            let path = args.str(0)?;
            let method = if args.method == "upload" { HttpMethod::Post } else { HttpMethod::Put };
            let mut call = HttpOnlyCall::new(
                HttpRequest::new(method, object_url("", &path)),
                format!("Upload '{}' to bucket '{}'", path, bucket),
            );
            call.warnings
                .push("the file payload is sent as the raw request body and is not shown".to_string());
            call
        }
        "download" => {
            let path = args.str(0)?;
            HttpOnlyCall::new(
                HttpRequest::new(HttpMethod::Get, object_url("authenticated/", &path)),
                format!("Download '{}' from bucket '{}'", path, bucket),
            )
        }
        "getPublicUrl" => {
            let path = args.str(0)?;
            HttpOnlyCall::new(
                HttpRequest::new(HttpMethod::Get, object_url("public/", &path)),
                format!("Public URL of '{}' in bucket '{}'", path, bucket),
            )
        }
        "createSignedUrl" => {
            let path = args.str(0)?;
            let expires_in = args.u64(1)?;
            HttpOnlyCall::new(
                post(object_url("sign/", &path), json!({ "expiresIn": expires_in })),
                format!("Sign '{}' in bucket '{}' for {} seconds", path, bucket, expires_in),
            )
        }
        "remove" => {
            let paths = args.value(0)?.clone();
            let mut request = HttpRequest::new(HttpMethod::Delete, format!("{}/object/{}", STORAGE, bucket));
            with_json(&mut request, json!({ "prefixes": paths }));
            HttpOnlyCall::new(request, format!("Remove objects from bucket '{}'", bucket))
        }
        "list" => {
            let mut body = Row::new();
            body.insert("prefix".into(), JsonValue::String(args.opt_str(0).unwrap_or_default()));
            if let Some(options) = args.options(1) {
                for (key, value) in options {
                    body.insert(key.clone(), value.clone());
                }
            }
            HttpOnlyCall::new(
                post(format!("{}/object/list/{}", STORAGE, bucket), JsonValue::Object(body)),
                format!("List objects in bucket '{}'", bucket),
            )
        }
        "move" | "copy" => {
            let from = args.str(0)?;
            let to = args.str(1)?;
            HttpOnlyCall::new(
                post(
                    format!("{}/object/{}", STORAGE, args.method),
                    json!({ "bucketId": bucket, "sourceKey": from, "destinationKey": to }),
                ),
                format!("{} '{}' to '{}' in bucket '{}'", capitalize(args.method), from, to, bucket),
            )
        }
        other => return Err(unsupported("storage.from()", other)),
    };
    Ok(call)
}

/// The first segment after a namespace, which must be a call.
fn first_call<'a>(segments: &'a [Segment], namespace: &str) -> ConvertResult<(&'a str, &'a [JsonValue])> {
    match segments.first() {
        Some(Segment::Call { name, args }) => Ok((name.as_str(), args.as_slice())),
        Some(Segment::Property(name)) => Err(unsupported(namespace, name)),
        None => Err(ConvertError::syntax(
            "DSL_NO_ROOT",
            format!("{} is not followed by a method call", namespace),
        )
        .at(namespace.to_string())),
    }
}

fn credentials(args: &Args<'_>) -> ConvertResult<JsonValue> {
    let given = args.object(0)?;
    let mut body: Row = given
        .iter()
        .filter(|(key, _)| key.as_str() != "options")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if let Some(data) = given.get("options").and_then(|options| options.get("data")) {
        body.insert("data".into(), data.clone());
    }
    Ok(JsonValue::Object(body))
}

fn post(path: String, body: JsonValue) -> HttpRequest {
    let mut request = HttpRequest::new(HttpMethod::Post, path);
    with_json(&mut request, body);
    request
}

fn with_json(request: &mut HttpRequest, body: JsonValue) {
    request.append_header("Content-Type", "application/json");
    request.body = Some(body);
}

fn unsupported(namespace: &str, method: &str) -> ConvertError {
    ConvertError::unsupported(
        "UNSUPPORTED_OPERATION",
        format!("{}.{} is not supported", namespace, method),
    )
    .at(format!("{}.{}", namespace, method))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
