//! Local JWT verification.
//!
//! Keys come from a [`KeySource`]: either the project's shared HS256
//! secret, or the provider's JWKS document. Without a secret nothing
//! verifies. The key set is fetched once on
//! first use and then held for the life of the process; a failed first
//! fetch leaves the cell empty so the next request retries.

use async_trait::async_trait;
use dastyar_shared::types::Principal;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{AuthError, IdentityClaims, TokenVerifier};

pub enum KeySource {
    /// Shared HS256 secret.
    Secret(DecodingKey),
    /// No secret configured; every token is rejected.
    Unconfigured,
    /// Published key set, fetched lazily.
    Jwks {
        url: String,
        http: reqwest::Client,
        keys: OnceCell<JwkSet>,
    },
}

pub struct JwtVerifier {
    source: KeySource,
    issuer: String,
    audience: String,
}

impl JwtVerifier {
    /// A missing or blank `secret` yields a verifier that accepts nothing,
    /// never one keyed on the empty string.
    pub fn with_secret(secret: Option<&str>, issuer: String, audience: String) -> Self {
        let source = match secret.filter(|s| !s.trim().is_empty()) {
            Some(secret) => KeySource::Secret(DecodingKey::from_secret(secret.as_bytes())),
            None => KeySource::Unconfigured,
        };
        Self {
            source,
            issuer,
            audience,
        }
    }

    pub fn with_jwks(url: String, http: reqwest::Client, issuer: String, audience: String) -> Self {
        Self {
            source: KeySource::Jwks {
                url,
                http,
                keys: OnceCell::new(),
            },
            issuer,
            audience,
        }
    }

    /// Pick the decoding key and the algorithm the token must use.
    async fn key_for(&self, header: &Header) -> Result<(DecodingKey, Algorithm), AuthError> {
        match &self.source {
            KeySource::Secret(key) => Ok((key.clone(), Algorithm::HS256)),
            KeySource::Unconfigured => {
                Err(AuthError::InvalidToken("no signing secret configured".into()))
            }
            KeySource::Jwks { url, http, keys } => {
                let set = keys.get_or_try_init(|| fetch_jwks(http, url)).await?;

                let jwk = match header.kid.as_deref() {
                    Some(kid) => set.find(kid),
                    None if set.keys.len() == 1 => set.keys.first(),
                    None => None,
                }
                .ok_or_else(|| AuthError::InvalidToken("no matching signing key".into()))?;

                let algorithm = algorithm_of(jwk).ok_or_else(|| {
                    AuthError::InvalidToken("signing key has an unsupported algorithm".into())
                })?;
                let key = DecodingKey::from_jwk(jwk)
                    .map_err(|e| AuthError::InvalidToken(format!("unusable signing key: {e}")))?;
                Ok((key, algorithm))
            }
        }
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let header =
            decode_header(token).map_err(|e| AuthError::InvalidToken(format!("malformed: {e}")))?;
        let (key, algorithm) = self.key_for(&header).await?;

        let data = decode::<IdentityClaims>(token, &key, &self.validation(algorithm))
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        debug!(subject = %data.claims.sub, "Token verified locally");
        Ok(data.claims.into())
    }
}

async fn fetch_jwks(http: &reqwest::Client, url: &str) -> Result<JwkSet, AuthError> {
    let set: JwkSet = http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| AuthError::Provider(format!("JWKS fetch failed: {e}")))?
        .json()
        .await
        .map_err(|e| AuthError::Provider(format!("JWKS parse failed: {e}")))?;

    info!(url, keys = set.keys.len(), "Fetched identity provider key set");
    Ok(set)
}

/// The algorithm a key is published for. Keys without an explicit `alg`
/// use the customary algorithm of their key type.
fn algorithm_of(jwk: &Jwk) -> Option<Algorithm> {
    if let Some(alg) = &jwk.common.key_algorithm {
        return match alg {
            KeyAlgorithm::HS256 => Some(Algorithm::HS256),
            KeyAlgorithm::HS384 => Some(Algorithm::HS384),
            KeyAlgorithm::HS512 => Some(Algorithm::HS512),
            KeyAlgorithm::ES256 => Some(Algorithm::ES256),
            KeyAlgorithm::ES384 => Some(Algorithm::ES384),
            KeyAlgorithm::RS256 => Some(Algorithm::RS256),
            KeyAlgorithm::RS384 => Some(Algorithm::RS384),
            KeyAlgorithm::RS512 => Some(Algorithm::RS512),
            KeyAlgorithm::PS256 => Some(Algorithm::PS256),
            KeyAlgorithm::PS384 => Some(Algorithm::PS384),
            KeyAlgorithm::PS512 => Some(Algorithm::PS512),
            KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
            _ => None,
        };
    }

    match &jwk.algorithm {
        AlgorithmParameters::EllipticCurve(_) => Some(Algorithm::ES256),
        AlgorithmParameters::RSA(_) => Some(Algorithm::RS256),
        AlgorithmParameters::OctetKey(_) => Some(Algorithm::HS256),
        AlgorithmParameters::OctetKeyPair(_) => Some(Algorithm::EdDSA),
    }
}
