//! Authenticated identities, bearer tokens and permission checks.
//!
//! # Responsibilities
//! - Represent who is making a request and what they may do
//! - Generate and hash bearer tokens
//! - Define the token-verification seam (`IdentityResolver`)
//!
//! # Design Decisions
//! - Only token hashes are ever persisted
//! - Authorization is a binary "has permission code" check
//! - Requests without credentials get an anonymous identity, so the
//!   decision to reject is made per route

use std::collections::BTreeSet;

use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::data::StoreError;

/// Permission to read foods.
pub const FOODS_READ: &str = "foods:read";
/// Permission to create, update and delete foods.
pub const FOODS_WRITE: &str = "foods:write";

/// Scope stored alongside authentication tokens.
pub const SCOPE_AUTHENTICATION: &str = "authentication";

/// Raw token entropy in bytes.
const TOKEN_BYTES: usize = 16;
/// Length of a plaintext token (hex encoded).
pub const TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

/// The caller of a single request. Immutable once attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    subject_id: Option<i64>,
    permissions: BTreeSet<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            subject_id: None,
            permissions: BTreeSet::new(),
        }
    }

    pub fn authenticated<I, P>(subject_id: i64, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            subject_id: Some(subject_id),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn subject_id(&self) -> Option<i64> {
        self.subject_id
    }

    pub fn is_anonymous(&self) -> bool {
        self.subject_id.is_none()
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.contains(code)
    }

    /// Fails unless the identity is authenticated and holds `code`.
    pub fn require(&self, code: &str) -> Result<(), AccessError> {
        if self.is_anonymous() {
            return Err(AccessError::AuthenticationRequired);
        }
        if !self.has_permission(code) {
            return Err(AccessError::NotPermitted(code.to_string()));
        }
        Ok(())
    }
}

/// Why a permission check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("missing permission {0}")]
    NotPermitted(String),
}

/// Token verification seam.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Returns `None` for unknown, expired or wrongly scoped tokens.
    async fn resolve(&self, token: &str) -> Result<Option<Identity>, StoreError>;
}

/// Create a fresh random plaintext token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of the plaintext token; the only form that is stored.
pub fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

/// Cheap shape check done before touching the store.
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_must_authenticate() {
        let identity = Identity::anonymous();
        assert_eq!(
            identity.require(FOODS_READ),
            Err(AccessError::AuthenticationRequired)
        );
    }

    #[test]
    fn permission_is_binary() {
        let identity = Identity::authenticated(3, [FOODS_READ]);
        assert_eq!(identity.subject_id(), Some(3));
        assert!(identity.require(FOODS_READ).is_ok());
        assert_eq!(
            identity.require(FOODS_WRITE),
            Err(AccessError::NotPermitted(FOODS_WRITE.to_string()))
        );
    }

    #[test]
    fn generated_tokens_are_well_formed_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert!(is_well_formed_token(&a));
        assert_ne!(a, b);
        assert_eq!(hash_token(&a).len(), 32);
        assert_eq!(hash_token(&a), hash_token(&a));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(!is_well_formed_token("short"));
        assert!(!is_well_formed_token(&"z".repeat(TOKEN_LENGTH)));
    }
}
