//! Read-mostly reference collections under `/api/{collection}`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use dastyar_shared::access::{decide, AccessDecision, Actor, Collection, Operation};
use dastyar_shared::constants::DEFAULT_PAGE_SIZE;
use dastyar_store::{ContentQuery, Database};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::api::AppState;
use crate::error::ApiError;
use crate::extract::{Caller, Locale};

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    limit: Option<u32>,
    page: Option<u32>,
}

fn reference_collection(slug: &str) -> Result<Collection, ApiError> {
    slug.parse::<Collection>()
        .ok()
        .filter(|c| c.is_reference())
        .ok_or_else(|| ApiError::NotFound(format!("Unknown collection: {slug}")))
}

/// Map a write decision to an error status: anonymous callers are told to
/// authenticate, users that the policy refuses are forbidden.
fn require_write(collection: Collection, operation: Operation, actor: &Actor) -> Result<(), ApiError> {
    match decide(collection, operation, actor) {
        AccessDecision::AllowAll => Ok(()),
        _ if *actor == Actor::Anonymous => Err(ApiError::Unauthenticated),
        _ => Err(ApiError::Forbidden(format!("{collection} is managed by administrators"))),
    }
}

async fn fetch<T, F>(state: &AppState, f: F) -> Result<Value, ApiError>
where
    F: FnOnce(&Database) -> dastyar_store::Result<T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let value = state.db.call(f).await?;
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}

type CreateFn<N> = fn(&Database, &N) -> dastyar_store::Result<i64>;
type GetFn<T> = fn(&Database, &ContentQuery, i64) -> dastyar_store::Result<T>;

/// Insert from a JSON body and read the new record back in `query`'s locale.
async fn create_from<N, T>(
    state: &AppState,
    body: Value,
    query: ContentQuery,
    create: CreateFn<N>,
    get: GetFn<T>,
) -> Result<Value, ApiError>
where
    N: DeserializeOwned + Send + 'static,
    T: Serialize + Send + 'static,
{
    let new: N = serde_json::from_value(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    fetch(state, move |db| {
        let id = create(db, &new)?;
        get(db, &query, id)
    })
    .await
}

/// `GET /api/{collection}`
pub async fn list(
    State(state): State<AppState>,
    Locale(locale): Locale,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, ApiError> {
    let collection = reference_collection(&slug)?;
    let query = ContentQuery::new(locale, state.config.default_locale)
        .with_page(params.limit.unwrap_or(DEFAULT_PAGE_SIZE), params.page.unwrap_or(1));

    let page = match collection {
        Collection::Cities => fetch(&state, move |db| db.list_cities(&query)).await?,
        Collection::Wallpapers => fetch(&state, move |db| db.list_wallpapers(&query)).await?,
        Collection::WallpaperCategories => fetch(&state, move |db| db.list_wallpaper_categories(&query)).await?,
        Collection::CalendarEvents => fetch(&state, move |db| db.list_calendar_events(&query)).await?,
        Collection::SearchSuggestions => fetch(&state, move |db| db.list_search_suggestions(&query)).await?,
        Collection::AiSuggestions => fetch(&state, move |db| db.list_ai_suggestions(&query)).await?,
        Collection::Timezones => fetch(&state, move |db| db.list_timezones(&query)).await?,
        Collection::AppUsers | Collection::Conversations | Collection::Messages => {
            return Err(ApiError::NotFound(format!("Unknown collection: {slug}")))
        }
    };
    Ok(Json(page))
}

/// `GET /api/{collection}/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    Locale(locale): Locale,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<Json<Value>, ApiError> {
    let collection = reference_collection(&slug)?;
    let query = ContentQuery::new(locale, state.config.default_locale);

    let doc = match collection {
        Collection::Cities => fetch(&state, move |db| db.get_city(&query, id)).await?,
        Collection::Wallpapers => fetch(&state, move |db| db.get_wallpaper(&query, id)).await?,
        Collection::WallpaperCategories => fetch(&state, move |db| db.get_wallpaper_category(&query, id)).await?,
        Collection::CalendarEvents => fetch(&state, move |db| db.get_calendar_event(&query, id)).await?,
        Collection::SearchSuggestions => fetch(&state, move |db| db.get_search_suggestion(&query, id)).await?,
        Collection::AiSuggestions => fetch(&state, move |db| db.get_ai_suggestion(&query, id)).await?,
        Collection::Timezones => fetch(&state, move |db| db.get_timezone(&query, id)).await?,
        Collection::AppUsers | Collection::Conversations | Collection::Messages => {
            return Err(ApiError::NotFound(format!("Unknown collection: {slug}")))
        }
    };
    Ok(Json(doc))
}

/// `GET /api/wallpaper-categories/grouped`
pub async fn grouped_wallpapers(
    State(state): State<AppState>,
    Locale(locale): Locale,
) -> Result<Json<Value>, ApiError> {
    let query = ContentQuery::new(locale, state.config.default_locale);
    let groups = fetch(&state, move |db| db.grouped_wallpapers(&query)).await?;
    Ok(Json(groups))
}

/// `POST /api/{collection}`: console only.
pub async fn create(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Locale(locale): Locale,
    Path(slug): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let collection = reference_collection(&slug)?;
    require_write(collection, Operation::Create, &actor)?;
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let query = ContentQuery::new(locale, state.config.default_locale);

    let doc = match collection {
        Collection::Cities => create_from(&state, body, query, Database::create_city, Database::get_city).await?,
        Collection::Wallpapers => {
            create_from(&state, body, query, Database::create_wallpaper, Database::get_wallpaper).await?
        }
        Collection::WallpaperCategories => {
            create_from(
                &state,
                body,
                query,
                Database::create_wallpaper_category,
                Database::get_wallpaper_category,
            )
            .await?
        }
        Collection::CalendarEvents => {
            create_from(&state, body, query, Database::create_calendar_event, Database::get_calendar_event).await?
        }
        Collection::SearchSuggestions => {
            create_from(
                &state,
                body,
                query,
                Database::create_search_suggestion,
                Database::get_search_suggestion,
            )
            .await?
        }
        Collection::AiSuggestions => {
            create_from(&state, body, query, Database::create_ai_suggestion, Database::get_ai_suggestion).await?
        }
        Collection::Timezones => {
            create_from(&state, body, query, Database::create_timezone, Database::get_timezone).await?
        }
        Collection::AppUsers | Collection::Conversations | Collection::Messages => {
            return Err(ApiError::NotFound(format!("Unknown collection: {slug}")))
        }
    };

    info!(%collection, "Reference record created");
    Ok(Json(doc))
}

/// `DELETE /api/{collection}/{id}`: console only.
pub async fn delete_one(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<Json<Value>, ApiError> {
    let collection = reference_collection(&slug)?;
    require_write(collection, Operation::Delete, &actor)?;

    let delete: fn(&Database, i64) -> dastyar_store::Result<()> = match collection {
        Collection::Cities => Database::delete_city,
        Collection::Wallpapers => Database::delete_wallpaper,
        Collection::WallpaperCategories => Database::delete_wallpaper_category,
        Collection::CalendarEvents => Database::delete_calendar_event,
        Collection::SearchSuggestions => Database::delete_search_suggestion,
        Collection::AiSuggestions => Database::delete_ai_suggestion,
        Collection::Timezones => Database::delete_timezone,
        Collection::AppUsers | Collection::Conversations | Collection::Messages => {
            return Err(ApiError::NotFound(format!("Unknown collection: {slug}")))
        }
    };
    state.db.call(move |db| delete(db, id)).await?;

    info!(%collection, id, "Reference record deleted");
    Ok(Json(json!({ "success": true, "id": id })))
}
