use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use dastyar_server::api::{self, AppState};
use dastyar_server::auth::build_verifier;
use dastyar_server::config::ServerConfig;
use dastyar_server::db::Db;
use dastyar_server::llm::gemini::GeminiClient;
use dastyar_server::rate_limit::RateLimiter;
use dastyar_server::weather::captions::CaptionCache;
use dastyar_server::weather::openweathermap::OpenWeatherMap;
use dastyar_store::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dastyar_server=debug,dastyar_store=debug")),
        )
        .init();

    info!("Starting Dastyar server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        addr = %config.http_addr,
        database = %config.database_path.display(),
        auth_strategy = ?config.auth_strategy,
        default_locale = config.default_locale.as_str(),
        admin_enabled = config.admin_token.is_some(),
        gemini_configured = !config.gemini_api_key.is_empty(),
        weather_configured = !config.openweathermap_api_key.is_empty(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let database = Database::open_at(&config.database_path)
        .with_context(|| format!("opening database at {}", config.database_path.display()))?;

    let http = reqwest::Client::builder()
        .user_agent(concat!("dastyar-server/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("building HTTP client")?;

    let rate_limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst)
        .with_trusted_proxy(config.trusted_proxy);
    let captions = CaptionCache::default();

    let app_state = AppState {
        db: Db::new(database),
        verifier: build_verifier(&config, http.clone()),
        model: Arc::new(GeminiClient::new(&config, http.clone())),
        weather: Arc::new(OpenWeatherMap::new(&config, http)),
        captions: captions.clone(),
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
        started_at: Instant::now(),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Rate limiter cleanup every 5 minutes, evicting buckets idle >10 min
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(600.0).await;
        }
    });

    // Weather caption cleanup every 10 minutes
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            captions.purge_expired().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
