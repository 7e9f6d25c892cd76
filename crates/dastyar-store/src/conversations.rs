//! CRUD operations for [`Conversation`] records.

use chrono::Utc;
use dastyar_shared::access::AccessDecision;
use rusqlite::{params, ToSql};
use uuid::Uuid;

use crate::database::{parse_timestamp, parse_uuid, timestamp, Database};
use crate::error::{not_found_on_empty, Result, StoreError};
use crate::models::{AppUser, Conversation};
use crate::scope::Scope;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Start a conversation owned by `owner`.
    pub fn create_conversation(&self, owner: &AppUser, title: &str) -> Result<Conversation> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.conn().execute(
            "INSERT INTO conversations (id, owner_id, title, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                conversation.id.to_string(),
                conversation.owner_id.to_string(),
                conversation.title,
                timestamp(now),
            ],
        )?;

        Ok(conversation)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single conversation visible under `decision`.
    pub fn get_conversation(&self, decision: &AccessDecision, id: Uuid) -> Result<Conversation> {
        let scope = Scope::of(decision).ok_or(StoreError::NotFound)?;
        let id = id.to_string();
        let mut params: Vec<&dyn ToSql> = vec![&id];
        scope.bind(&mut params);

        self.conn()
            .query_row(
                &format!(
                    "SELECT id, owner_id, title, created_at, updated_at
                     FROM conversations
                     WHERE id = ? AND {}",
                    scope.predicate()
                ),
                params.as_slice(),
                row_to_conversation,
            )
            .map_err(not_found_on_empty)
    }

    /// Visible conversations, newest first.
    pub fn list_conversations(
        &self,
        decision: &AccessDecision,
        limit: u32,
    ) -> Result<Vec<Conversation>> {
        let Some(scope) = Scope::of(decision) else {
            return Ok(Vec::new());
        };
        let mut params: Vec<&dyn ToSql> = Vec::new();
        scope.bind(&mut params);
        params.push(&limit);

        let mut stmt = self.conn().prepare(&format!(
            "SELECT id, owner_id, title, created_at, updated_at
             FROM conversations
             WHERE {}
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
            scope.predicate()
        ))?;

        let rows = stmt.query_map(params.as_slice(), row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }

    pub fn count_conversations(&self) -> Result<u64> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn rename_conversation(
        &self,
        decision: &AccessDecision,
        id: Uuid,
        title: &str,
    ) -> Result<Conversation> {
        let scope = Scope::of(decision).ok_or(StoreError::NotFound)?;
        let now = timestamp(Utc::now());
        let id_str = id.to_string();
        let mut params: Vec<&dyn ToSql> = vec![&title, &now, &id_str];
        scope.bind(&mut params);

        let affected = self.conn().execute(
            &format!(
                "UPDATE conversations SET title = ?, updated_at = ?
                 WHERE id = ? AND {}",
                scope.predicate()
            ),
            params.as_slice(),
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        self.get_conversation(decision, id)
    }

    /// Bump `updated_at`, e.g. after a new message was appended.
    pub fn touch_conversation(&self, id: Uuid) -> Result<()> {
        self.conn().execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![timestamp(Utc::now()), id.to_string()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a conversation and (by cascade) its messages.
    pub fn delete_conversation(&self, decision: &AccessDecision, id: Uuid) -> Result<()> {
        let scope = Scope::of(decision).ok_or(StoreError::NotFound)?;
        let id = id.to_string();
        let mut params: Vec<&dyn ToSql> = vec![&id];
        scope.bind(&mut params);

        let affected = self.conn().execute(
            &format!("DELETE FROM conversations WHERE id = ? AND {}", scope.predicate()),
            params.as_slice(),
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let id: String = row.get(0)?;
    let owner: String = row.get(1)?;
    let created: String = row.get(3)?;
    let updated: String = row.get(4)?;

    Ok(Conversation {
        id: parse_uuid(0, &id)?,
        owner_id: parse_uuid(1, &owner)?,
        title: row.get(2)?,
        created_at: parse_timestamp(3, &created)?,
        updated_at: parse_timestamp(4, &updated)?,
    })
}
