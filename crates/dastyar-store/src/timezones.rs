use chrono::Utc;
use rusqlite::params;

use crate::database::{timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{ContentQuery, NewTimezone, Page, Timezone};

// Timezones carry no translations; the locale placeholders are bound but
// unused so the shared paging helper applies unchanged.
const SELECT_PAGE: &str = "SELECT t.id, t.label, t.utc_offset, t.timezone_id
     FROM timezones t
     WHERE ?1 IS NOT NULL AND ?2 IS NOT NULL
     ORDER BY t.id
     LIMIT ?3 OFFSET ?4";

const SELECT_ONE: &str = "SELECT t.id, t.label, t.utc_offset, t.timezone_id
     FROM timezones t
     WHERE ?1 IS NOT NULL AND ?2 IS NOT NULL AND t.id = ?3";

impl Database {
    pub fn list_timezones(&self, query: &ContentQuery) -> Result<Page<Timezone>> {
        self.content_page("timezones", SELECT_PAGE, query, row_to_timezone)
    }

    pub fn get_timezone(&self, query: &ContentQuery, id: i64) -> Result<Timezone> {
        self.content_one(SELECT_ONE, query, id, row_to_timezone)
    }

    pub fn create_timezone(&self, new: &NewTimezone) -> Result<i64> {
        if new.timezone_id.trim().is_empty() {
            return Err(StoreError::InvalidData("timezoneId is required".into()));
        }
        self.conn().execute(
            "INSERT INTO timezones (label, utc_offset, timezone_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![new.label, new.offset, new.timezone_id, timestamp(Utc::now())],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    pub fn delete_timezone(&self, id: i64) -> Result<()> {
        self.delete_content("timezones", id)
    }
}

fn row_to_timezone(row: &rusqlite::Row<'_>) -> rusqlite::Result<Timezone> {
    Ok(Timezone {
        id: row.get(0)?,
        label: row.get(1)?,
        offset: row.get(2)?,
        timezone_id: row.get(3)?,
    })
}
