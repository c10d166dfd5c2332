//! Request parsing helpers.
//!
//! # Responsibilities
//! - Generate a request ID for every request
//! - Parse path ids, query parameters and precondition headers
//! - Read JSON bodies under a size limit, turning decoder failures into
//!   messages a client can act on

use std::collections::HashMap;

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, HeaderName, HeaderValue, Request},
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::http::response::ApiError;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Optimistic concurrency precondition: the version the client last saw.
pub static X_EXPECTED_VERSION: HeaderName = HeaderName::from_static("x-expected-version");

/// UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Parse a record id path segment. Anything but a positive integer is
/// treated as a record that does not exist.
pub fn read_id_param(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

/// Read the optional `X-Expected-Version` header.
pub fn read_expected_version(headers: &HeaderMap) -> Result<Option<i32>, ApiError> {
    let Some(value) = headers.get(&X_EXPECTED_VERSION) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse::<i32>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest("X-Expected-Version header must be an integer".into()))
}

/// Read and decode a JSON body of at most `limit` bytes.
pub async fn read_json<T: DeserializeOwned>(body: Body, limit: usize) -> Result<T, ApiError> {
    let bytes = to_bytes(body, limit).await.map_err(|_| {
        ApiError::BadRequest(format!("body must not be larger than {limit} bytes"))
    })?;
    decode_json(&bytes)
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("body must not be empty".into()));
    }

    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = T::deserialize(&mut deserializer).map_err(json_error)?;
    deserializer
        .end()
        .map_err(|_| ApiError::BadRequest("body must only contain a single JSON value".into()))?;
    Ok(value)
}

fn json_error(err: serde_json::Error) -> ApiError {
    let message = match err.classify() {
        Category::Eof => "body contains badly-formed JSON".to_string(),
        Category::Syntax => format!(
            "body contains badly-formed JSON (at line {} column {})",
            err.line(),
            err.column()
        ),
        Category::Data => {
            let detail = err.to_string();
            if let Some(field) = unknown_field(&detail) {
                format!("body contains unknown key \"{field}\"")
            } else if detail.starts_with("invalid type") {
                format!(
                    "body contains incorrect JSON type (at line {} column {})",
                    err.line(),
                    err.column()
                )
            } else {
                format!("body contains invalid JSON: {detail}")
            }
        }
        Category::Io => "unable to read body".to_string(),
    };
    ApiError::BadRequest(message)
}

/// serde reports unknown fields as "unknown field `name`, expected ...".
fn unknown_field(detail: &str) -> Option<&str> {
    let rest = detail.strip_prefix("unknown field `")?;
    rest.split('`').next()
}

/// Query string value, or `default` when absent or empty.
pub fn read_string(query: &HashMap<String, String>, key: &str, default: &str) -> String {
    match query.get(key) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => default.to_string(),
    }
}

/// Comma separated query value. Empty entries are dropped.
pub fn read_csv(query: &HashMap<String, String>, key: &str) -> Vec<String> {
    query
        .get(key)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Integer query value. A value that does not parse is recorded in
/// `errors` under `key` and `default` is returned.
pub fn read_int(
    query: &HashMap<String, String>,
    key: &'static str,
    default: u64,
    errors: &mut ValidationErrors,
) -> u64 {
    match query.get(key) {
        None => default,
        Some(value) if value.is_empty() => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            let mut err = ValidationError::new("integer");
            err.message = Some("must be an integer value".into());
            errors.add(key, err);
            default
        }),
    }
}
