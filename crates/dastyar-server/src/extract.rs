//! Request extractors: who is calling, and in which locale.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::ACCEPT_LANGUAGE;
use axum::http::request::Parts;
use dastyar_shared::access::Actor;
use dastyar_shared::constants::{ADMIN_TOKEN_HEADER, USER_LANGUAGE_HEADER};
use dastyar_shared::locale::LocaleHints;
use dastyar_shared::types::{Language, Principal};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::api::AppState;
use crate::auth::{authenticate, AuthError};
use crate::config::ServerConfig;
use crate::error::ApiError;

/// The caller of a collection operation.
///
/// `X-Admin-Token` selects the console (and must be valid); otherwise a
/// bearer token selects a user, and no credential at all is anonymous.
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts.headers.get(ADMIN_TOKEN_HEADER) {
            verify_admin_token(value.to_str().unwrap_or(""), &state.config)?;
            return Ok(Caller(Actor::Console));
        }

        match authenticate(state.verifier.as_ref(), &parts.headers).await {
            Ok(principal) => Ok(Caller(Actor::User(principal))),
            Err(AuthError::MissingToken) => Ok(Caller(Actor::Anonymous)),
            Err(e) => Err(e.into()),
        }
    }
}

/// An end user proven by a bearer token. Missing token is 401, a rejected
/// one 403.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = authenticate(state.verifier.as_ref(), &parts.headers).await?;
        Ok(AuthUser(principal))
    }
}

#[derive(Debug, Default, Deserialize)]
struct LocaleParam {
    locale: Option<String>,
}

/// The language the request asks for, if any source names a supported one.
#[derive(Debug, Clone, Copy)]
pub struct RequestedLocale(pub Option<Language>);

impl<S: Send + Sync> FromRequestParts<S> for RequestedLocale {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let param = Query::<LocaleParam>::try_from_uri(&parts.uri)
            .map(|q| q.0)
            .unwrap_or_default();
        let hints = LocaleHints {
            query: param.locale.as_deref(),
            user_language: header_str(parts, USER_LANGUAGE_HEADER),
            accept_language: header_str(parts, ACCEPT_LANGUAGE.as_str()),
        };
        Ok(RequestedLocale(hints.negotiate()))
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Negotiated locale, falling back to the configured default.
#[derive(Debug, Clone, Copy)]
pub struct Locale(pub Language);

impl FromRequestParts<AppState> for Locale {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequestedLocale(requested) = RequestedLocale::from_request_parts(parts, state).await?;
        Ok(Locale(requested.unwrap_or(state.config.default_locale)))
    }
}

/// Constant-time check of the console credential. A disabled console
/// rejects every token.
pub(crate) fn verify_admin_token(token: &str, config: &ServerConfig) -> Result<(), ApiError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ApiError::Forbidden(
            "Admin console is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let token_bytes = token.trim().as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len() || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1 {
        return Err(ApiError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_token_compare() {
        let config = ServerConfig {
            admin_token: Some("s3cret".into()),
            ..Default::default()
        };
        assert!(verify_admin_token("s3cret", &config).is_ok());
        assert!(verify_admin_token("s3cre", &config).is_err());
        assert!(verify_admin_token("s3cred", &config).is_err());

        let disabled = ServerConfig::default();
        assert!(matches!(
            verify_admin_token("anything", &disabled),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_requested_locale_sources() {
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/api/cities?limit=2")
            .header(USER_LANGUAGE_HEADER, "de")
            .header("accept-language", "fa-IR,en;q=0.5")
            .body(())
            .unwrap()
            .into_parts();

        let RequestedLocale(locale) = RequestedLocale::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(locale, Some(Language::Fa));

        // An unsupported query value is not rescued by the headers.
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/api/cities?locale=xx&limit=2")
            .header("accept-language", "fa-IR,en;q=0.5")
            .body(())
            .unwrap()
            .into_parts();

        let RequestedLocale(locale) = RequestedLocale::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(locale, None);
    }
}
