use chrono::{NaiveDate, Utc};
use rusqlite::params;

use crate::content::{insert_locales, locale_joins, require};
use crate::database::{timestamp, Database};
use crate::error::Result;
use crate::models::{CalendarEvent, ContentQuery, NewCalendarEvent, Page};

fn select(tail: &str) -> String {
    format!(
        "SELECT t.id, COALESCE(l.title, d.title, ''), t.date,
                COALESCE(l.description, d.description)
         FROM calendar_events t
         {}
         {tail}",
        locale_joins("calendar_events")
    )
}

impl Database {
    /// Events ordered by date.
    pub fn list_calendar_events(&self, query: &ContentQuery) -> Result<Page<CalendarEvent>> {
        self.content_page(
            "calendar_events",
            &select("ORDER BY t.date, t.id LIMIT ?3 OFFSET ?4"),
            query,
            row_to_event,
        )
    }

    pub fn get_calendar_event(&self, query: &ContentQuery, id: i64) -> Result<CalendarEvent> {
        self.content_one(&select("WHERE t.id = ?3"), query, id, row_to_event)
    }

    pub fn create_calendar_event(&self, new: &NewCalendarEvent) -> Result<i64> {
        require("title", &new.title)?;

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO calendar_events (date, created_at) VALUES (?1, ?2)",
            params![new.date.format("%Y-%m-%d").to_string(), timestamp(Utc::now())],
        )?;
        let id = tx.last_insert_rowid();
        insert_locales(
            &tx,
            "calendar_events",
            id,
            &[("title", &new.title), ("description", &new.description)],
        )?;
        tx.commit()?;
        Ok(id)
    }

    pub fn delete_calendar_event(&self, id: i64) -> Result<()> {
        self.delete_content("calendar_events", id)
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<CalendarEvent> {
    let date: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CalendarEvent {
        id: row.get(0)?,
        title: row.get(1)?,
        date,
        description: row.get(3)?,
    })
}
