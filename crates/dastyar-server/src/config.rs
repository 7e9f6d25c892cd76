//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development. Invalid values are logged and
//! ignored.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dastyar_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_JWT_AUDIENCE};
use dastyar_shared::types::Language;

/// How bearer tokens are verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Local signature check against the provider's published key set.
    Jwks,
    /// Local HS256 check against the shared project secret.
    Secret,
    /// Forward every token to the provider's user endpoint.
    Remote,
}

impl FromStr for AuthStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jwks" => Ok(Self::Jwks),
            "secret" => Ok(Self::Secret),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown auth strategy: {other}")),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./dastyar.db`
    pub database_path: PathBuf,

    // -- Identity provider --

    /// Env: `SUPABASE_URL`
    pub supabase_url: String,

    /// Sent as `apikey` on remote introspection.
    /// Env: `SUPABASE_ANON_KEY`
    pub supabase_anon_key: String,

    /// Env: `SUPABASE_JWT_SECRET`
    pub supabase_jwt_secret: Option<String>,

    /// Env: `AUTH_STRATEGY` (`jwks` | `secret` | `remote`)
    /// Default: `jwks`
    pub auth_strategy: AuthStrategy,

    /// Env: `JWT_AUDIENCE`
    /// Default: `authenticated`
    pub jwt_audience: String,

    /// Administrative console credential, compared against `X-Admin-Token`.
    /// Env: `ADMIN_TOKEN`
    /// Default: unset (console disabled).
    pub admin_token: Option<String>,

    /// Locale used when a request names none, and for missing translations.
    /// Env: `DEFAULT_LOCALE`
    /// Default: `en`
    pub default_locale: Language,

    // -- Generation provider --

    /// Env: `GEMINI_API_KEY`
    pub gemini_api_key: String,
    /// Env: `GEMINI_BASE_URL`
    pub gemini_base_url: String,
    /// Model behind the chat endpoint and weather captions.
    /// Env: `GEMINI_CHAT_MODEL`
    pub gemini_chat_model: String,
    /// Lighter model behind search suggestions.
    /// Env: `GEMINI_FAST_MODEL`
    pub gemini_fast_model: String,

    // -- Weather provider --

    /// Env: `OPENWEATHERMAP_API_KEY`
    pub openweathermap_api_key: String,
    /// Env: `OPENWEATHERMAP_BASE_URL`
    pub openweathermap_base_url: String,

    // -- Limits --

    /// Wall-clock ceiling for one streamed chat reply.
    /// Env: `CHAT_MAX_DURATION_SECS`
    /// Default: 30 s
    pub chat_max_duration: Duration,

    /// Sustained requests per second per IP on AI-backed routes.
    /// Env: `RATE_LIMIT_PER_SEC`
    pub rate_limit_per_sec: f64,

    /// Burst capacity per IP on AI-backed routes.
    /// Env: `RATE_LIMIT_BURST`
    pub rate_limit_burst: f64,

    /// Reverse proxy whose `X-Forwarded-For` names the client for rate
    /// limiting. Forwarding headers from any other peer are ignored.
    /// Env: `TRUSTED_PROXY`
    /// Default: unset
    pub trusted_proxy: Option<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./dastyar.db"),
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: None,
            auth_strategy: AuthStrategy::Jwks,
            jwt_audience: DEFAULT_JWT_AUDIENCE.to_string(),
            admin_token: None,
            default_locale: Language::En,
            gemini_api_key: String::new(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            gemini_chat_model: "gemini-2.5-flash".to_string(),
            gemini_fast_model: "gemma-3n-e4b-it".to_string(),
            openweathermap_api_key: String::new(),
            openweathermap_base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            chat_max_duration: Duration::from_secs(30),
            rate_limit_per_sec: 2.0,
            rate_limit_burst: 10.0,
            trusted_proxy: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        parse_into(&lookup, "HTTP_ADDR", &mut config.http_addr);

        if let Some(path) = non_empty(&lookup, "DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        // -- Identity provider --

        if let Some(url) = non_empty(&lookup, "SUPABASE_URL") {
            config.supabase_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = non_empty(&lookup, "SUPABASE_ANON_KEY") {
            config.supabase_anon_key = key;
        }
        config.supabase_jwt_secret = non_empty(&lookup, "SUPABASE_JWT_SECRET");
        parse_into(&lookup, "AUTH_STRATEGY", &mut config.auth_strategy);
        if let Some(aud) = non_empty(&lookup, "JWT_AUDIENCE") {
            config.jwt_audience = aud;
        }
        config.admin_token = non_empty(&lookup, "ADMIN_TOKEN");
        parse_into(&lookup, "DEFAULT_LOCALE", &mut config.default_locale);

        // -- Providers --

        if let Some(key) = non_empty(&lookup, "GEMINI_API_KEY") {
            config.gemini_api_key = key;
        }
        if let Some(url) = non_empty(&lookup, "GEMINI_BASE_URL") {
            config.gemini_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = non_empty(&lookup, "GEMINI_CHAT_MODEL") {
            config.gemini_chat_model = model;
        }
        if let Some(model) = non_empty(&lookup, "GEMINI_FAST_MODEL") {
            config.gemini_fast_model = model;
        }
        if let Some(key) = non_empty(&lookup, "OPENWEATHERMAP_API_KEY") {
            config.openweathermap_api_key = key;
        }
        if let Some(url) = non_empty(&lookup, "OPENWEATHERMAP_BASE_URL") {
            config.openweathermap_base_url = url.trim_end_matches('/').to_string();
        }

        // -- Limits --

        let mut secs = config.chat_max_duration.as_secs();
        parse_into(&lookup, "CHAT_MAX_DURATION_SECS", &mut secs);
        config.chat_max_duration = Duration::from_secs(secs.max(1));

        parse_into(&lookup, "RATE_LIMIT_PER_SEC", &mut config.rate_limit_per_sec);
        parse_into(&lookup, "RATE_LIMIT_BURST", &mut config.rate_limit_burst);
        if let Some(raw) = non_empty(&lookup, "TRUSTED_PROXY") {
            match raw.trim().parse::<IpAddr>() {
                Ok(ip) => config.trusted_proxy = Some(ip),
                Err(_) => tracing::warn!(variable = "TRUSTED_PROXY", value = %raw, "Invalid value, ignoring"),
            }
        }

        if config.auth_strategy == AuthStrategy::Secret && config.supabase_jwt_secret.is_none() {
            tracing::warn!("AUTH_STRATEGY=secret without SUPABASE_JWT_SECRET; every bearer token will be rejected");
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    /// Issuer stamped on provider-issued access tokens.
    pub fn jwt_issuer(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.trim().is_empty())
}

/// Overwrite `slot` with the parsed variable, warning when it does not parse.
fn parse_into<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut T) {
    let Some(raw) = non_empty(lookup, name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(variable = name, value = %raw, "Invalid value, using default"),
    }
}
