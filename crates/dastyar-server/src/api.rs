use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, Method},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use dastyar_shared::constants::{ADMIN_TOKEN_HEADER, APP_NAME, CONVERSATION_ID_HEADER};
use dastyar_shared::types::Language;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::TokenVerifier;
use crate::config::{AuthStrategy, ServerConfig};
use crate::db::Db;
use crate::error::ApiError;
use crate::extract::verify_admin_token;
use crate::llm::ChatModel;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::routes::{chat, content, suggestions, user_config, weather};
use crate::weather::captions::CaptionCache;
use crate::weather::WeatherProvider;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub verifier: Arc<dyn TokenVerifier>,
    pub model: Arc<dyn ChatModel>,
    pub weather: Arc<dyn WeatherProvider>,
    pub captions: CaptionCache,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
    pub started_at: Instant,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(CONVERSATION_ID_HEADER)]);

    // Routes that call out to the generation or weather provider.
    let metered = Router::new()
        .route("/api/chat", post(chat::chat_turn))
        .route("/api/suggestions", post(suggestions::suggest))
        .route("/api/weather", get(weather::weather))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/admin/status", get(admin_status))
        .route("/api/chat/history", get(chat::history))
        .route(
            "/api/chat/{id}",
            get(chat::conversation_detail)
                .patch(chat::rename_conversation)
                .delete(chat::delete_conversation),
        )
        .route("/api/messages/{id}", delete(chat::delete_message))
        .route(
            "/api/user/config",
            get(user_config::get_config).patch(user_config::update_config),
        )
        .route("/api/wallpaper-categories/grouped", get(content::grouped_wallpapers))
        .route("/api/{collection}", get(content::list).post(content::create))
        .route("/api/{collection}/{id}", get(content::get_one).delete(content::delete_one))
        .merge(metered)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: &'static str,
    version: &'static str,
    auth_strategy: &'static str,
    default_locale: Language,
    admin_enabled: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminStatusResponse {
    name: &'static str,
    uptime_secs: u64,
    app_users: u64,
    conversations: u64,
    messages: u64,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    let auth_strategy = match state.config.auth_strategy {
        AuthStrategy::Jwks => "jwks",
        AuthStrategy::Secret => "secret",
        AuthStrategy::Remote => "remote",
    };
    Json(ServerInfoResponse {
        name: APP_NAME,
        version: env!("CARGO_PKG_VERSION"),
        auth_strategy,
        default_locale: state.config.default_locale,
        admin_enabled: state.config.admin_token.is_some(),
    })
}

async fn admin_status(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<AdminStatusResponse>, ApiError> {
    let token = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    verify_admin_token(token, &state.config)?;

    let (app_users, conversations, messages) = state
        .db
        .call(|db| {
            Ok((
                db.count_app_users()?,
                db.count_conversations()?,
                db.count_messages()?,
            ))
        })
        .await?;

    Ok(Json(AdminStatusResponse {
        name: APP_NAME,
        uptime_secs: state.started_at.elapsed().as_secs(),
        app_users,
        conversations,
        messages,
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
