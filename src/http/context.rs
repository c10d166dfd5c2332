//! Per-request identity context.
//!
//! The authentication middleware attaches exactly one [`Identity`] to each
//! request; handlers read it back through the [`CurrentIdentity`] extractor.

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, Extensions},
};

use crate::http::response::ApiError;
use crate::security::identity::Identity;

/// Attach `identity` to the request. Replaces any earlier value.
pub fn set_identity(request: &mut Request, identity: Identity) {
    request.extensions_mut().insert(identity);
}

/// The identity attached to a request, if authentication ran.
pub fn identity(extensions: &Extensions) -> Option<&Identity> {
    extensions.get::<Identity>()
}

/// Extractor for the caller's identity.
///
/// A missing identity means the route was mounted without the
/// authentication layer, which is a server bug, so it maps to a 500.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity(&parts.extensions)
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(|| ApiError::internal("missing identity in request context"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;

    #[tokio::test]
    async fn round_trips_through_extensions() {
        let mut request = http::Request::builder().body(Body::empty()).unwrap();
        set_identity(&mut request, Identity::authenticated(4, ["foods:read"]));

        let (mut parts, _) = request.into_parts();
        let CurrentIdentity(found) = CurrentIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(found.subject_id(), Some(4));
    }

    #[tokio::test]
    async fn missing_identity_is_internal_error() {
        let (mut parts, _) = http::Request::builder().body(()).unwrap().into_parts();
        let err = CurrentIdentity::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
