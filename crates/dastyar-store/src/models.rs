//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer; field names are emitted in camelCase.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use dastyar_shared::types::{Language, MessageRole, Theme};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Application user
// ---------------------------------------------------------------------------

/// The system's own record of an identity-provider subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    pub id: Uuid,
    /// Identity provider `sub`, unique across the table.
    pub subject_id: String,
    /// Blank when the provider did not disclose one.
    pub email: String,
    pub selected_language: Language,
    pub selected_theme: Theme,
    /// Wallpaper id.
    pub selected_background: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial preference update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserConfigUpdate {
    pub language: Option<Language>,
    pub theme: Option<Theme>,
    /// Once chosen, a background can be replaced but not cleared.
    pub background: Option<i64>,
}

impl UserConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.theme.is_none() && self.background.is_none()
    }
}

// ---------------------------------------------------------------------------
// Conversation / Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    /// Owning application user.
    pub owner_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single chat turn. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reference content
// ---------------------------------------------------------------------------

/// Translations of one field, keyed by language.
pub type LocalizedText = BTreeMap<Language, String>;

/// Locale selection plus pagination for reference reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentQuery {
    pub locale: Language,
    /// Used for fields with no translation in `locale`.
    pub fallback: Language,
    pub limit: u32,
    /// 1-based.
    pub page: u32,
}

impl ContentQuery {
    pub fn new(locale: Language, fallback: Language) -> Self {
        Self {
            locale,
            fallback,
            limit: dastyar_shared::constants::DEFAULT_PAGE_SIZE,
            page: 1,
        }
    }

    pub fn with_page(mut self, limit: u32, page: u32) -> Self {
        self.limit = limit.clamp(1, dastyar_shared::constants::MAX_PAGE_SIZE);
        self.page = page.max(1);
        self
    }

    pub(crate) fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// One page of a collection.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total_docs: u64,
    pub limit: u32,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WallpaperCategory {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Wallpaper {
    pub id: i64,
    pub title: String,
    pub file_url: String,
    pub category: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithWallpapers {
    #[serde(flatten)]
    pub category: WallpaperCategory,
    pub wallpapers: Vec<Wallpaper>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: i64,
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchSuggestion {
    pub id: i64,
    pub keyword: String,
    pub url: String,
    pub logo_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AiSuggestion {
    pub id: i64,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Timezone {
    pub id: i64,
    pub label: String,
    pub offset: String,
    pub timezone_id: String,
}

// ---------------------------------------------------------------------------
// Console input for reference content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWallpaperCategory {
    pub title: LocalizedText,
    /// Derived from the title when omitted.
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWallpaper {
    pub title: LocalizedText,
    pub file_url: String,
    pub category: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCity {
    pub name: LocalizedText,
    pub country: LocalizedText,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCalendarEvent {
    pub title: LocalizedText,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: LocalizedText,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSearchSuggestion {
    pub keyword: LocalizedText,
    pub url: String,
    pub logo_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAiSuggestion {
    pub prompt: LocalizedText,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimezone {
    pub label: String,
    pub offset: String,
    pub timezone_id: String,
}
