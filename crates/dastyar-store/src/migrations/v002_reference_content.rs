//! v002 -- Reference content.
//!
//! Administrator-curated collections. Translatable fields live in a
//! `<table>_locales` companion keyed by `(parent_id, locale)`.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS wallpaper_categories (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    slug       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS wallpaper_categories_locales (
    parent_id INTEGER NOT NULL,
    locale    TEXT NOT NULL,
    title     TEXT NOT NULL,
    PRIMARY KEY (parent_id, locale),
    FOREIGN KEY (parent_id) REFERENCES wallpaper_categories(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS wallpapers (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    file_url    TEXT NOT NULL,
    category_id INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    FOREIGN KEY (category_id) REFERENCES wallpaper_categories(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_wallpapers_category ON wallpapers(category_id);

CREATE TABLE IF NOT EXISTS wallpapers_locales (
    parent_id INTEGER NOT NULL,
    locale    TEXT NOT NULL,
    title     TEXT NOT NULL,
    PRIMARY KEY (parent_id, locale),
    FOREIGN KEY (parent_id) REFERENCES wallpapers(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS cities (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    latitude   REAL NOT NULL,
    longitude  REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cities_locales (
    parent_id INTEGER NOT NULL,
    locale    TEXT NOT NULL,
    name      TEXT,
    country   TEXT,
    PRIMARY KEY (parent_id, locale),
    FOREIGN KEY (parent_id) REFERENCES cities(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS calendar_events (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    date       TEXT NOT NULL,                 -- YYYY-MM-DD
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_calendar_events_date ON calendar_events(date);

CREATE TABLE IF NOT EXISTS calendar_events_locales (
    parent_id   INTEGER NOT NULL,
    locale      TEXT NOT NULL,
    title       TEXT,
    description TEXT,
    PRIMARY KEY (parent_id, locale),
    FOREIGN KEY (parent_id) REFERENCES calendar_events(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS search_suggestions (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    url        TEXT NOT NULL,
    logo_url   TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS search_suggestions_locales (
    parent_id INTEGER NOT NULL,
    locale    TEXT NOT NULL,
    keyword   TEXT NOT NULL,
    PRIMARY KEY (parent_id, locale),
    FOREIGN KEY (parent_id) REFERENCES search_suggestions(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS ai_suggestions (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ai_suggestions_locales (
    parent_id INTEGER NOT NULL,
    locale    TEXT NOT NULL,
    prompt    TEXT NOT NULL,
    PRIMARY KEY (parent_id, locale),
    FOREIGN KEY (parent_id) REFERENCES ai_suggestions(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS timezones (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    label       TEXT NOT NULL,
    utc_offset  TEXT NOT NULL,                -- e.g. "+03:30"
    timezone_id TEXT NOT NULL,                -- e.g. "Asia/Tehran"
    created_at  TEXT NOT NULL
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
