use chrono::Utc;
use dastyar_shared::access::AccessDecision;
use dastyar_shared::types::MessageRole;
use rusqlite::{params, ToSql};
use uuid::Uuid;

use crate::database::{parse_enum, parse_timestamp, parse_uuid, timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::Message;
use crate::scope::Scope;

impl Database {
    /// Append a message. The caller must already have resolved the
    /// conversation under the requester's access decision.
    pub fn append_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO messages (id, conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                message.conversation_id.to_string(),
                message.role.as_str(),
                message.content,
                timestamp(message.created_at),
            ],
        )?;
        self.touch_conversation(conversation_id)?;

        Ok(message)
    }

    /// Messages of one conversation in replay order (oldest first).
    pub fn list_messages(
        &self,
        decision: &AccessDecision,
        conversation_id: Uuid,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let Some(scope) = Scope::of(decision) else {
            return Ok(Vec::new());
        };
        let conversation_id = conversation_id.to_string();
        let mut params: Vec<&dyn ToSql> = vec![&conversation_id];
        scope.bind(&mut params);
        params.push(&limit);

        let mut stmt = self.conn().prepare(&format!(
            "SELECT id, conversation_id, role, content, created_at
             FROM messages
             WHERE conversation_id = ? AND {}
             ORDER BY created_at ASC, rowid ASC
             LIMIT ?",
            scope.predicate()
        ))?;

        let rows = stmt.query_map(params.as_slice(), row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn count_messages(&self) -> Result<u64> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Delete one message. Ownership is checked through its conversation.
    pub fn delete_message(&self, decision: &AccessDecision, id: Uuid) -> Result<()> {
        let scope = Scope::of(decision).ok_or(StoreError::NotFound)?;
        let id = id.to_string();
        let mut params: Vec<&dyn ToSql> = vec![&id];
        scope.bind(&mut params);

        let affected = self.conn().execute(
            &format!("DELETE FROM messages WHERE id = ? AND {}", scope.predicate()),
            params.as_slice(),
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let conversation_id: String = row.get(1)?;
    let role: String = row.get(2)?;
    let created: String = row.get(4)?;

    Ok(Message {
        id: parse_uuid(0, &id)?,
        conversation_id: parse_uuid(1, &conversation_id)?,
        role: parse_enum(2, &role)?,
        content: row.get(3)?,
        created_at: parse_timestamp(4, &created)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dastyar_shared::access::{decide, Actor, Collection, Operation};
    use dastyar_shared::types::Principal;

    fn as_user(sub: &str, op: Operation) -> AccessDecision {
        decide(Collection::Messages, op, &Actor::User(Principal::new(sub, None)))
    }

    #[test]
    fn messages_replay_in_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.resolve_app_user(&Principal::new("a", None)).unwrap();
        let conv = db.create_conversation(&owner, "t").unwrap();

        db.append_message(conv.id, MessageRole::User, "hi").unwrap();
        db.append_message(conv.id, MessageRole::Assistant, "hello").unwrap();
        db.append_message(conv.id, MessageRole::User, "bye").unwrap();

        let messages = db
            .list_messages(&as_user("a", Operation::Read), conv.id, 1000)
            .unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello", "bye"]);
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }

    #[test]
    fn list_respects_limit() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.resolve_app_user(&Principal::new("a", None)).unwrap();
        let conv = db.create_conversation(&owner, "t").unwrap();
        for i in 0..5 {
            db.append_message(conv.id, MessageRole::User, &i.to_string()).unwrap();
        }

        let messages = db
            .list_messages(&AccessDecision::AllowAll, conv.id, 3)
            .unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "0");
    }

    #[test]
    fn ownership_is_transitive_through_conversation() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.resolve_app_user(&Principal::new("a", None)).unwrap();
        db.resolve_app_user(&Principal::new("b", None)).unwrap();
        let conv = db.create_conversation(&owner, "t").unwrap();
        let msg = db.append_message(conv.id, MessageRole::User, "secret").unwrap();

        assert!(db
            .list_messages(&as_user("b", Operation::Read), conv.id, 1000)
            .unwrap()
            .is_empty());
        assert!(matches!(
            db.delete_message(&as_user("b", Operation::Delete), msg.id),
            Err(StoreError::NotFound)
        ));

        db.delete_message(&as_user("a", Operation::Delete), msg.id)
            .unwrap();
        assert_eq!(db.count_messages().unwrap(), 0);
    }

    #[test]
    fn deleting_conversation_cascades() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.resolve_app_user(&Principal::new("a", None)).unwrap();
        let conv = db.create_conversation(&owner, "t").unwrap();
        db.append_message(conv.id, MessageRole::User, "x").unwrap();

        db.delete_conversation(&AccessDecision::AllowAll, conv.id)
            .unwrap();
        assert_eq!(db.count_messages().unwrap(), 0);
    }
}
