//! Bearer token authentication.
//!
//! Attaches exactly one [`Identity`] to every request that gets past it:
//! anonymous when no `Authorization` header is sent, the token's owner
//! otherwise. A header that is present but unusable is rejected with 401
//! rather than downgraded to anonymous.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::context::set_identity;
use crate::http::response::ApiError;
use crate::security::identity::{is_well_formed_token, Identity, IdentityResolver};

/// Token carried by the `Authorization` header, if any.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::InvalidAuthenticationToken)?;
    match value.split_once(' ') {
        Some(("Bearer", token)) if is_well_formed_token(token) => Ok(Some(token)),
        _ => Err(ApiError::InvalidAuthenticationToken),
    }
}

async fn resolve_identity(
    resolver: &dyn IdentityResolver,
    headers: &HeaderMap,
) -> Result<Identity, ApiError> {
    let Some(token) = bearer_token(headers)? else {
        return Ok(Identity::anonymous());
    };
    match resolver.resolve(token).await? {
        Some(identity) => Ok(identity),
        None => Err(ApiError::InvalidAuthenticationToken),
    }
}

pub async fn authenticate(
    State(resolver): State<Arc<dyn IdentityResolver>>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut response = match resolve_identity(resolver.as_ref(), request.headers()).await {
        Ok(identity) => {
            tracing::debug!(subject = ?identity.subject_id(), "Request authenticated");
            set_identity(&mut request, identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };
    // Responses differ per caller; keep shared caches from mixing them up.
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}
