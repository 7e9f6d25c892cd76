//! `/api/user/config`: the signed-in user's start-page preferences.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use dastyar_shared::access::{decide, Actor, Collection, Operation};
use dastyar_shared::types::{Language, Theme};
use dastyar_store::{AppUser, ContentQuery, Database, StoreError, UserConfigUpdate, Wallpaper};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::AppState;
use crate::error::ApiError;
use crate::extract::{AuthUser, Locale};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    selected_language: Language,
    selected_theme: Theme,
    selected_background: Option<Wallpaper>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    success: bool,
    config: UserConfig,
}

/// One accepted field of a PATCH body. `apply` leaves the update untouched
/// when the value is not valid for the field.
struct ConfigField {
    name: &'static str,
    apply: fn(&Value, &mut UserConfigUpdate),
}

const FIELDS: &[ConfigField] = &[
    ConfigField {
        name: "selectedLanguage",
        apply: |value, update| update.language = value.as_str().and_then(|s| s.parse().ok()),
    },
    ConfigField {
        name: "selectedTheme",
        apply: |value, update| update.theme = value.as_str().and_then(|s| s.parse().ok()),
    },
    ConfigField {
        name: "selectedBackground",
        apply: |value, update| update.background = wallpaper_id(value),
    },
];

/// Wallpaper references arrive as numbers or numeric strings.
fn wallpaper_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_update(body: &Map<String, Value>) -> UserConfigUpdate {
    let mut update = UserConfigUpdate::default();
    for field in FIELDS {
        if let Some(value) = body.get(field.name) {
            (field.apply)(value, &mut update);
        }
    }
    update
}

fn config_view(db: &Database, query: &ContentQuery, user: &AppUser) -> dastyar_store::Result<UserConfig> {
    let background = match user.selected_background {
        Some(id) => match db.get_wallpaper(query, id) {
            Ok(wallpaper) => Some(wallpaper),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e),
        },
        None => None,
    };
    Ok(UserConfig {
        selected_language: user.selected_language,
        selected_theme: user.selected_theme,
        selected_background: background,
    })
}

/// `GET /api/user/config`
pub async fn get_config(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Locale(locale): Locale,
) -> Result<Json<UserConfig>, ApiError> {
    let query = ContentQuery::new(locale, state.config.default_locale);
    let config = state
        .db
        .call(move |db| {
            let user = db.resolve_app_user(&principal)?;
            config_view(db, &query, &user)
        })
        .await?;
    Ok(Json(config))
}

/// `PATCH /api/user/config`
pub async fn update_config(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Locale(locale): Locale,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let fields = body
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("config must be a JSON object".into()))?;
    let mut update = parse_update(fields);
    if update.is_empty() {
        return Err(ApiError::BadRequest("no valid config fields".into()));
    }

    let decision = decide(Collection::AppUsers, Operation::Update, &Actor::User(principal.clone()));
    let query = ContentQuery::new(locale, state.config.default_locale);

    let config = state
        .db
        .call(move |db| {
            if let Some(id) = update.background {
                if !db.wallpaper_exists(id)? {
                    debug!(id, "Dropping unknown wallpaper from config update");
                    update.background = None;
                }
            }
            if update.is_empty() {
                return Err(StoreError::InvalidData("no valid config fields".into()));
            }

            let user = db.resolve_app_user(&principal)?;
            let user = db.update_app_user_config(&decision, user.id, &update)?;
            config_view(db, &query, &user)
        })
        .await?;

    Ok(Json(UpdateResponse { success: true, config }))
}
