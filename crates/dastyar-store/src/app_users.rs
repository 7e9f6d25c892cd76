//! [`AppUser`] records: lookup-or-create and preference updates.

use chrono::Utc;
use dastyar_shared::access::AccessDecision;
use dastyar_shared::types::Principal;
use rusqlite::{params, ToSql};
use uuid::Uuid;

use crate::database::{parse_enum, parse_timestamp, parse_uuid, timestamp, Database};
use crate::error::{not_found_on_empty, Result, StoreError};
use crate::models::{AppUser, UserConfigUpdate};
use crate::scope::Scope;

const SELECT_COLUMNS: &str = "id, subject_id, email, selected_language, selected_theme,
     selected_background, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Resolve
    // ------------------------------------------------------------------

    /// Return the application user for `principal`, creating it if absent.
    ///
    /// The insert is a no-op when the subject already exists (unique index),
    /// so concurrent first requests from one subject converge on one row.
    pub fn resolve_app_user(&self, principal: &Principal) -> Result<AppUser> {
        let now = timestamp(Utc::now());
        let inserted = self.conn().execute(
            "INSERT INTO app_users (id, subject_id, email, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(subject_id) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                principal.subject,
                principal.email.as_deref().unwrap_or(""),
                now,
            ],
        )?;

        if inserted > 0 {
            tracing::info!(subject = %principal.subject, "created application user");
        }

        self.conn()
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM app_users WHERE subject_id = ?1"),
                params![principal.subject],
                row_to_app_user,
            )
            .map_err(not_found_on_empty)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch one application user, subject to `decision`.
    pub fn get_app_user(&self, decision: &AccessDecision, id: Uuid) -> Result<AppUser> {
        let scope = Scope::of(decision).ok_or(StoreError::NotFound)?;
        let id = id.to_string();
        let mut params: Vec<&dyn ToSql> = vec![&id];
        scope.bind(&mut params);

        self.conn()
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM app_users WHERE id = ? AND {}",
                    scope.predicate()
                ),
                params.as_slice(),
                row_to_app_user,
            )
            .map_err(not_found_on_empty)
    }

    pub fn count_app_users(&self) -> Result<u64> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM app_users", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a partial preference update and return the stored record.
    pub fn update_app_user_config(
        &self,
        decision: &AccessDecision,
        id: Uuid,
        update: &UserConfigUpdate,
    ) -> Result<AppUser> {
        if update.is_empty() {
            return Err(StoreError::InvalidData("empty config update".into()));
        }
        let scope = Scope::of(decision).ok_or(StoreError::NotFound)?;

        let language = update.language.map(|l| l.as_str());
        let theme = update.theme.map(|t| t.as_str());
        let now = timestamp(Utc::now());
        let id_str = id.to_string();

        let mut params: Vec<&dyn ToSql> = vec![&language, &theme, &update.background, &now, &id_str];
        scope.bind(&mut params);

        let affected = self.conn().execute(
            &format!(
                "UPDATE app_users SET
                    selected_language   = COALESCE(?, selected_language),
                    selected_theme      = COALESCE(?, selected_theme),
                    selected_background = COALESCE(?, selected_background),
                    updated_at          = ?
                 WHERE id = ? AND {}",
                scope.predicate()
            ),
            params.as_slice(),
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        self.get_app_user(decision, id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an application user and everything it owns.
    pub fn delete_app_user(&self, decision: &AccessDecision, id: Uuid) -> Result<()> {
        let scope = Scope::of(decision).ok_or(StoreError::NotFound)?;
        let id = id.to_string();
        let mut params: Vec<&dyn ToSql> = vec![&id];
        scope.bind(&mut params);

        let affected = self.conn().execute(
            &format!("DELETE FROM app_users WHERE id = ? AND {}", scope.predicate()),
            params.as_slice(),
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn row_to_app_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppUser> {
    let id: String = row.get(0)?;
    let language: String = row.get(3)?;
    let theme: String = row.get(4)?;
    let created: String = row.get(6)?;
    let updated: String = row.get(7)?;

    Ok(AppUser {
        id: parse_uuid(0, &id)?,
        subject_id: row.get(1)?,
        email: row.get(2)?,
        selected_language: parse_enum(3, &language)?,
        selected_theme: parse_enum(4, &theme)?,
        selected_background: row.get(5)?,
        created_at: parse_timestamp(6, &created)?,
        updated_at: parse_timestamp(7, &updated)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dastyar_shared::access::{decide, Actor, Collection, Operation};
    use dastyar_shared::types::{Language, Theme};

    fn principal(sub: &str) -> Principal {
        Principal::new(sub, Some(format!("{sub}@example.com")))
    }

    fn read_as(p: &Principal) -> AccessDecision {
        decide(Collection::AppUsers, Operation::Read, &Actor::User(p.clone()))
    }

    #[test]
    fn resolve_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let p = principal("sub-1");

        let first = db.resolve_app_user(&p).unwrap();
        let second = db.resolve_app_user(&p).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.email, "sub-1@example.com");
        assert_eq!(first.selected_language, Language::En);
        assert_eq!(first.selected_theme, Theme::System);
        assert_eq!(db.count_app_users().unwrap(), 1);
    }

    #[test]
    fn resolve_without_email_stores_blank() {
        let db = Database::open_in_memory().unwrap();
        let user = db.resolve_app_user(&Principal::new("anon-sub", None)).unwrap();
        assert_eq!(user.email, "");
    }

    #[test]
    fn self_filter_hides_other_users() {
        let db = Database::open_in_memory().unwrap();
        let a = principal("a");
        let b = principal("b");
        let user_a = db.resolve_app_user(&a).unwrap();

        assert!(db.get_app_user(&read_as(&a), user_a.id).is_ok());
        assert!(matches!(
            db.get_app_user(&read_as(&b), user_a.id),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn update_config_is_partial() {
        let db = Database::open_in_memory().unwrap();
        let p = principal("sub-2");
        let user = db.resolve_app_user(&p).unwrap();
        let decision = decide(Collection::AppUsers, Operation::Update, &Actor::User(p.clone()));

        let updated = db
            .update_app_user_config(
                &decision,
                user.id,
                &UserConfigUpdate {
                    language: Some(Language::Fa),
                    background: Some(7),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.selected_language, Language::Fa);
        assert_eq!(updated.selected_theme, Theme::System);
        assert_eq!(updated.selected_background, Some(7));

        let updated = db
            .update_app_user_config(
                &decision,
                user.id,
                &UserConfigUpdate {
                    theme: Some(Theme::Dark),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.selected_language, Language::Fa);
        assert_eq!(updated.selected_theme, Theme::Dark);
        // No update form clears the background.
        assert_eq!(updated.selected_background, Some(7));
    }

    #[test]
    fn update_other_users_record_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.resolve_app_user(&principal("owner")).unwrap();
        let intruder = principal("intruder");
        let decision = decide(Collection::AppUsers, Operation::Update, &Actor::User(intruder));

        let result = db.update_app_user_config(
            &decision,
            owner.id,
            &UserConfigUpdate {
                theme: Some(Theme::Light),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[test]
    fn delete_is_denied_for_users_but_allowed_for_console() {
        let db = Database::open_in_memory().unwrap();
        let p = principal("sub-3");
        let user = db.resolve_app_user(&p).unwrap();

        let denied = decide(Collection::AppUsers, Operation::Delete, &Actor::User(p));
        assert!(matches!(db.delete_app_user(&denied, user.id), Err(StoreError::NotFound)));
        assert_eq!(db.count_app_users().unwrap(), 1);

        let console = decide(Collection::AppUsers, Operation::Delete, &Actor::Console);
        db.delete_app_user(&console, user.id).unwrap();
        assert_eq!(db.count_app_users().unwrap(), 0);
    }
}
