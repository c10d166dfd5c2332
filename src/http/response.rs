//! Response envelopes and the API error taxonomy.
//!
//! # Responsibilities
//! - Wrap every payload in a named JSON envelope (`{"food": ...}`)
//! - Map every failure class to one status code and message
//! - Log internal failures; never leak their details to clients
//!
//! # Design Decisions
//! - One enum for every HTTP-visible failure
//! - Conflicts (409) stay distinct from generic errors so clients can
//!   re-fetch and resubmit

use std::collections::BTreeMap;
use std::fmt::Display;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::data::{Food, Metadata, StoreError, UpdateError};
use crate::observability::metrics;
use crate::security::identity::AccessError;

/// Message sent for every 500, whatever the cause.
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

#[derive(Debug, Serialize)]
pub struct FoodEnvelope {
    pub food: Food,
}

#[derive(Debug, Serialize)]
pub struct FoodsEnvelope {
    pub foods: Vec<Food>,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<T: Serialize> {
    error: T,
}

/// Every failure a client can observe.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("failed validation")]
    FailedValidation(ValidationErrors),

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(err: impl Display) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidAuthenticationToken | ApiError::AuthenticationRequired => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Field name → first message, the shape clients get for a 422.
fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, String> {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            let first = errs.first()?;
            let message = first
                .message
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| first.code.to_string());
            Some((field.to_string(), message))
        })
        .collect()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        match self {
            ApiError::FailedValidation(errors) => {
                (status, Json(ErrorEnvelope { error: field_messages(&errors) })).into_response()
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal server error");
                (status, Json(ErrorEnvelope { error: SERVER_ERROR_MESSAGE })).into_response()
            }
            ApiError::InvalidAuthenticationToken => {
                let mut response = (status, Json(ErrorEnvelope { error: message })).into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            _ => (status, Json(ErrorEnvelope { error: message })).into_response(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound => ApiError::NotFound,
            StoreError::EditConflict => {
                metrics::record_edit_conflict();
                ApiError::EditConflict
            }
            other => ApiError::internal(other),
        }
    }
}

impl From<UpdateError> for ApiError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::NotFound => ApiError::NotFound,
            UpdateError::Conflict { .. } => {
                metrics::record_edit_conflict();
                ApiError::EditConflict
            }
            UpdateError::Invalid(errors) => ApiError::FailedValidation(errors),
            UpdateError::Store(store) => store.into(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::AuthenticationRequired => ApiError::AuthenticationRequired,
            AccessError::NotPermitted(_) => ApiError::NotPermitted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let response = ApiError::internal("disk on fire").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], SERVER_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn validation_errors_become_a_field_map() {
        let errors = crate::data::NewFood {
            title: String::new(),
            types: vec!["fruit".into()],
        }
        .validate()
        .unwrap_err();
        let response = ApiError::FailedValidation(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["title"], "must be provided");
    }

    #[test]
    fn invalid_token_challenges_for_bearer() {
        let response = ApiError::InvalidAuthenticationToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn store_and_update_errors_map_to_statuses() {
        assert_eq!(ApiError::from(StoreError::RecordNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(UpdateError::Conflict { expected: 3 }).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::Timeout(std::time::Duration::from_secs(3))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(AccessError::NotPermitted("foods:write".into())).status(),
            StatusCode::FORBIDDEN
        );
    }
}
