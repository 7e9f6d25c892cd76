//! Common test utilities for server integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum_test::{TestRequest, TestServer};
use dastyar_server::api::{build_router, AppState};
use dastyar_server::auth::{AuthError, TokenVerifier};
use dastyar_server::config::ServerConfig;
use dastyar_server::db::Db;
use dastyar_server::llm::{ChatModel, GenerationRequest, LlmError, TextStream};
use dastyar_server::rate_limit::RateLimiter;
use dastyar_server::weather::captions::CaptionCache;
use dastyar_server::weather::{Condition, CurrentWeather, ForecastSample, WeatherError, WeatherProvider};
use dastyar_shared::types::{Language, Principal};
use dastyar_store::Database;
use futures::stream::{self, StreamExt};

pub const ADMIN_TOKEN: &str = "console-secret";

/// Socket peer every test request appears to come from.
pub const TEST_PEER: [u8; 4] = [192, 0, 2, 10];

/// Accepts `valid-<sub>` tokens; everything else is rejected.
pub struct FakeVerifier;

#[async_trait]
impl TokenVerifier for FakeVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        match token.strip_prefix("valid-") {
            Some(sub) if !sub.is_empty() => Ok(Principal::new(sub, Some(format!("{sub}@example.com")))),
            _ => Err(AuthError::InvalidToken("unknown test token".into())),
        }
    }
}

/// What the fake model answers to `stream`.
#[derive(Clone)]
pub enum Reply {
    Chunks(Vec<&'static str>),
    /// The provider refuses before producing any text.
    Refuse,
}

/// Scripted generation provider that records every request.
pub struct FakeModel {
    pub reply: Mutex<Reply>,
    /// Answer to `generate`; `None` fails the call.
    pub generated: Mutex<Option<String>>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeModel {
    pub fn new() -> Self {
        Self {
            reply: Mutex::new(Reply::Chunks(vec!["Hello", " there"])),
            generated: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn set_generated(&self, text: Option<&str>) {
        *self.generated.lock().unwrap() = text.map(String::from);
    }

    pub fn last_request(&self) -> GenerationRequest {
        self.requests.lock().unwrap().last().cloned().expect("no generation request")
    }
}

#[async_trait]
impl ChatModel for FakeModel {
    async fn stream(&self, request: GenerationRequest) -> Result<TextStream, LlmError> {
        self.requests.lock().unwrap().push(request);
        match self.reply.lock().unwrap().clone() {
            Reply::Chunks(chunks) => Ok(stream::iter(chunks.into_iter().map(|c| Ok(c.to_string()))).boxed()),
            Reply::Refuse => Err(LlmError::Status {
                status: 503,
                body: "overloaded".into(),
            }),
        }
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.generated
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| LlmError::Transport("unavailable".into()))
    }
}

/// Fixed weather for every location; `failing` makes both calls error.
pub struct FakeWeather {
    pub failing: bool,
}

pub fn condition(id: u32, main: &str) -> Condition {
    Condition {
        id,
        main: main.into(),
        description: main.to_lowercase(),
        icon: "01d".into(),
    }
}

#[async_trait]
impl WeatherProvider for FakeWeather {
    async fn current(&self, _lat: f64, _lon: f64) -> Result<CurrentWeather, WeatherError> {
        if self.failing {
            return Err(WeatherError::Status(500));
        }
        Ok(CurrentWeather {
            temp: 18.0,
            humidity: 40.0,
            wind_speed: 2.0,
            conditions: vec![condition(803, "Clouds")],
        })
    }

    async fn forecast(&self, _lat: f64, _lon: f64) -> Result<Vec<ForecastSample>, WeatherError> {
        if self.failing {
            return Err(WeatherError::Status(500));
        }
        let today = chrono::Utc::now().date_naive();
        let tomorrow = today.succ_opt().unwrap();
        let sample = |date: chrono::NaiveDate, hour: u32, min: f64, max: f64, main: &str| ForecastSample {
            dt: 0,
            dt_txt: format!("{} {hour:02}:00:00", date.format("%Y-%m-%d")),
            temp_min: min,
            temp_max: max,
            conditions: vec![condition(800, main)],
        };
        Ok(vec![
            sample(today, 21, 15.0, 19.0, "Clouds"),
            sample(tomorrow, 0, 12.0, 14.0, "Rain"),
            sample(tomorrow, 3, 10.0, 13.0, "Clear"),
            sample(tomorrow, 6, 11.0, 20.0, "Rain"),
        ])
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub db: Db,
    pub model: Arc<FakeModel>,
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        admin_token: Some(ADMIN_TOKEN.into()),
        default_locale: Language::En,
        rate_limit_per_sec: 1000.0,
        rate_limit_burst: 1000.0,
        ..Default::default()
    }
}

/// Create a test server over an in-memory database.
pub fn create_test_app() -> TestApp {
    create_test_app_with(test_config(), false)
}

pub fn create_test_app_with(config: ServerConfig, weather_failing: bool) -> TestApp {
    let db = Db::new(Database::open_in_memory().expect("Failed to open database"));
    let model = Arc::new(FakeModel::new());

    let state = AppState {
        db: db.clone(),
        verifier: Arc::new(FakeVerifier),
        model: model.clone(),
        weather: Arc::new(FakeWeather {
            failing: weather_failing,
        }),
        captions: CaptionCache::default(),
        rate_limiter: RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst)
            .with_trusted_proxy(config.trusted_proxy),
        config: Arc::new(config),
        started_at: Instant::now(),
    };

    let router = build_router(state).layer(middleware::map_request(with_test_peer));
    let server = TestServer::new(router).expect("Failed to create test server");
    TestApp { server, db, model }
}

/// The in-process transport carries no socket address; stand one in the way
/// `into_make_service_with_connect_info` would.
async fn with_test_peer(mut req: Request) -> Request {
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((TEST_PEER, 41000))));
    req
}

/// `(app users, conversations)` currently stored.
pub async fn stored_counts(app: &TestApp) -> (u64, u64) {
    app.db
        .call(|db| Ok((db.count_app_users()?, db.count_conversations()?)))
        .await
        .expect("count records")
}

pub fn header(request: TestRequest, name: &'static str, value: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static(name),
        HeaderValue::from_str(value).expect("invalid header value"),
    )
}

/// Attach a bearer token for `sub`.
pub fn as_user(request: TestRequest, sub: &str) -> TestRequest {
    header(request, "authorization", &format!("Bearer valid-{sub}"))
}

pub fn as_console(request: TestRequest) -> TestRequest {
    header(request, "x-admin-token", ADMIN_TOKEN)
}
