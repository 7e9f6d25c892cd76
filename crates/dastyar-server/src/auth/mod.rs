//! Bearer-token verification.
//!
//! A [`TokenVerifier`] turns the token a client presents into a
//! [`Principal`]. Two interchangeable backends exist:
//!
//! - [`jwt::JwtVerifier`] checks the signature locally, against either the
//!   project's shared secret or the provider's published key set.
//! - [`remote::RemoteVerifier`] forwards the token to the provider's user
//!   endpoint on every call.

pub mod jwt;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use dastyar_shared::types::Principal;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{AuthStrategy, ServerConfig};

#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential presented.
    #[error("missing bearer token")]
    MissingToken,

    /// Signature, expiry, audience, issuer or shape check failed.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The identity provider could not be reached or answered badly.
    #[error("identity provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

/// Identity claims shared by the token payload and the provider's user
/// endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct IdentityClaims {
    #[serde(alias = "id")]
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<IdentityClaims> for Principal {
    fn from(claims: IdentityClaims) -> Self {
        Principal::new(claims.sub, claims.email)
    }
}

/// The bearer token of a request. A value without the `Bearer ` prefix is
/// taken as the raw token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("");

    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Extract and verify the request's bearer token.
pub async fn authenticate(
    verifier: &dyn TokenVerifier,
    headers: &HeaderMap,
) -> Result<Principal, AuthError> {
    let token = bearer_token(headers)?;
    verifier.verify(token).await
}

/// Build the verifier selected by `AUTH_STRATEGY`.
pub fn build_verifier(config: &ServerConfig, http: reqwest::Client) -> Arc<dyn TokenVerifier> {
    let issuer = config.jwt_issuer();
    let audience = config.jwt_audience.clone();

    match config.auth_strategy {
        AuthStrategy::Secret => Arc::new(jwt::JwtVerifier::with_secret(
            config.supabase_jwt_secret.as_deref(),
            issuer,
            audience,
        )),
        AuthStrategy::Jwks => Arc::new(jwt::JwtVerifier::with_jwks(
            format!("{}/auth/v1/.well-known/jwks.json", config.supabase_url),
            http,
            issuer,
            audience,
        )),
        AuthStrategy::Remote => Arc::new(remote::RemoteVerifier::new(
            &config.supabase_url,
            &config.supabase_anon_key,
            http,
        )),
    }
}
