//! Remote token introspection against the identity provider's user endpoint.

use async_trait::async_trait;
use dastyar_shared::types::Principal;
use tracing::debug;

use super::{AuthError, IdentityClaims, TokenVerifier};

pub struct RemoteVerifier {
    user_url: String,
    anon_key: String,
    http: reqwest::Client,
}

impl RemoteVerifier {
    pub fn new(base_url: &str, anon_key: &str, http: reqwest::Client) -> Self {
        Self {
            user_url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            http,
        }
    }
}

#[async_trait]
impl TokenVerifier for RemoteVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let response = self
            .http
            .get(&self.user_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::InvalidToken(format!("provider answered {status}")));
        }

        let claims: IdentityClaims = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed user body: {e}")))?;

        debug!(subject = %claims.sub, "Token verified remotely");
        Ok(claims.into())
    }
}
