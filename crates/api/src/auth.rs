//! Bearer token identity.
//!
//! Tokens are issued elsewhere; this server only maps a known token to the
//! principal it was configured for. Handlers pick the strictness they need:
//! [`Identity`] for routes that also serve guests, [`RequireAuth`] and
//! [`RequireAdmin`] for the rest.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::UserId;
use document_store::DocumentStore;
use domain::{Principal, Role};
use thiserror::Error;

use crate::error::ApiError;
use crate::state::AppState;

/// Invalid `AUTH_TOKENS` entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenConfigError {
    #[error("token entry `{0}` must be token:user-id:role[:email]")]
    Malformed(String),

    #[error("token entry `{entry}` has an invalid user id")]
    InvalidUserId { entry: String },

    #[error("token entry `{entry}`: {reason}")]
    InvalidRole { entry: String, reason: String },

    #[error("token `{0}` is configured more than once")]
    Duplicate(String),
}

/// Known bearer tokens and the principals they stand for.
#[derive(Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, Principal>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma separated list of `token:user-id:role[:email]` entries.
    /// Blank entries are skipped.
    pub fn parse(raw: &str) -> Result<Self, TokenConfigError> {
        let mut registry = Self::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.splitn(4, ':');
            let (Some(token), Some(user_id), Some(role)) =
                (parts.next(), parts.next(), parts.next())
            else {
                return Err(TokenConfigError::Malformed(entry.to_string()));
            };
            if token.is_empty() {
                return Err(TokenConfigError::Malformed(entry.to_string()));
            }

            let user_id: UserId = user_id.parse().map_err(|_| TokenConfigError::InvalidUserId {
                entry: entry.to_string(),
            })?;
            let role: Role = role.parse().map_err(|reason| TokenConfigError::InvalidRole {
                entry: entry.to_string(),
                reason,
            })?;

            let mut principal = Principal::new(user_id, role);
            if let Some(email) = parts.next().filter(|e| !e.is_empty()) {
                principal = principal.with_email(email);
            }

            if registry.tokens.contains_key(token) {
                return Err(TokenConfigError::Duplicate(token.to_string()));
            }
            registry.tokens.insert(token.to_string(), principal);
        }

        Ok(registry)
    }

    /// Registers a token.
    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    pub fn authenticate(&self, token: &str) -> Option<&Principal> {
        self.tokens.get(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl std::fmt::Debug for TokenRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRegistry")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

/// The caller's principal, if a bearer token was sent.
///
/// A missing header is anonymous; a header that does not resolve to a known
/// token is rejected with 401.
#[derive(Debug, Clone)]
pub struct Identity(pub Option<Principal>);

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Principal);

/// An authenticated administrator.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Principal);

impl<S> FromRequestParts<Arc<AppState<S>>> for Identity
where
    S: DocumentStore + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Identity(None));
        };

        let token = header
            .to_str()
            .ok()
            .and_then(bearer_token)
            .ok_or_else(|| {
                ApiError::Unauthorized("Missing or invalid Authorization header".into())
            })?;

        match state.tokens.authenticate(token) {
            Some(principal) => Ok(Identity(Some(principal.clone()))),
            None => {
                tracing::debug!("Rejected unknown bearer token");
                Err(ApiError::Unauthorized("Invalid token".into()))
            }
        }
    }
}

impl<S> FromRequestParts<Arc<AppState<S>>> for RequireAuth
where
    S: DocumentStore + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let Identity(principal) = Identity::from_request_parts(parts, state).await?;
        principal
            .map(RequireAuth)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))
    }
}

impl<S> FromRequestParts<Arc<AppState<S>>> for RequireAdmin
where
    S: DocumentStore + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(principal) = RequireAuth::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            return Err(ApiError::Forbidden(
                "You do not have permission to perform this action".into(),
            ));
        }
        Ok(RequireAdmin(principal))
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.splitn(2, ' ');

    let scheme = parts.next()?;
    let token = parts.next()?.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}
