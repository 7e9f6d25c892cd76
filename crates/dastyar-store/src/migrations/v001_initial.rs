//! v001 -- Initial schema creation.
//!
//! Creates the user-owned tables: `app_users`, `conversations` and
//! `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Application users (one per identity-provider subject)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS app_users (
    id                  TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    subject_id          TEXT NOT NULL,               -- identity provider `sub`
    email               TEXT NOT NULL DEFAULT '',
    selected_language   TEXT NOT NULL DEFAULT 'en',  -- en | ar | fa
    selected_theme      TEXT NOT NULL DEFAULT 'system', -- light | dark | system
    selected_background INTEGER,                     -- nullable FK -> wallpapers(id)
    created_at          TEXT NOT NULL,               -- RFC-3339
    updated_at          TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_app_users_subject ON app_users(subject_id);

-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    owner_id   TEXT NOT NULL,                 -- FK -> app_users(id)
    title      TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES app_users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_conversations_owner_created
    ON conversations(owner_id, created_at DESC);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    conversation_id TEXT NOT NULL,              -- FK -> conversations(id)
    role            TEXT NOT NULL,              -- user | assistant | system
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
    ON messages(conversation_id, created_at ASC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
