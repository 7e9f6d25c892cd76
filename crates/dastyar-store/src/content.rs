//! Shared plumbing for the localized reference collections.
//!
//! Every collection stores its language-neutral columns in the base table
//! and its translatable fields in `<table>_locales`. Reads join the
//! requested locale and the fallback locale and take the first non-null
//! value per field.

use rusqlite::{Connection, ToSql};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ContentQuery, LocalizedText, Page};

/// `LEFT JOIN` clauses binding `l` to the requested locale (`?1`) and `d`
/// to the fallback locale (`?2`) of `table`, aliased as `t`.
pub(crate) fn locale_joins(table: &str) -> String {
    format!(
        "LEFT JOIN {table}_locales l ON l.parent_id = t.id AND l.locale = ?1
         LEFT JOIN {table}_locales d ON d.parent_id = t.id AND d.locale = ?2"
    )
}

impl Database {
    /// Run a paged read. `select` must bind `?1` locale, `?2` fallback,
    /// `?3` limit and `?4` offset.
    pub(crate) fn content_page<T>(
        &self,
        table: &str,
        select: &str,
        query: &ContentQuery,
        map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Page<T>> {
        let total: i64 =
            self.conn()
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        let total = total as u64;

        let docs = self.content_rows(select, query, query.limit, query.offset(), map)?;

        Ok(Page {
            docs,
            total_docs: total,
            limit: query.limit,
            page: query.page,
            total_pages: total.div_ceil(u64::from(query.limit)) as u32,
        })
    }

    /// Like [`Database::content_page`] without the count, for internal
    /// bulk reads.
    pub(crate) fn content_rows<T>(
        &self,
        select: &str,
        query: &ContentQuery,
        limit: u32,
        offset: u32,
        map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let locale = query.locale.as_str();
        let fallback = query.fallback.as_str();
        let params: [&dyn ToSql; 4] = [&locale, &fallback, &limit, &offset];

        let mut stmt = self.conn().prepare(select)?;
        let rows = stmt.query_map(params.as_slice(), map)?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        Ok(docs)
    }

    /// Fetch one localized record. `select` binds `?1` locale, `?2`
    /// fallback and `?3` id.
    pub(crate) fn content_one<T>(
        &self,
        select: &str,
        query: &ContentQuery,
        id: i64,
        map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<T> {
        self.conn()
            .query_row(
                select,
                rusqlite::params![query.locale.as_str(), query.fallback.as_str(), id],
                map,
            )
            .map_err(crate::error::not_found_on_empty)
    }

    /// Delete a reference record by id; translations cascade.
    pub(crate) fn delete_content(&self, table: &str, id: i64) -> Result<()> {
        let affected = self
            .conn()
            .execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        tracing::debug!(table, id, "deleted reference record");
        Ok(())
    }
}

/// Reject a translatable field with no non-blank translation.
pub(crate) fn require(field: &str, text: &LocalizedText) -> Result<()> {
    if text.values().any(|v| !v.trim().is_empty()) {
        Ok(())
    } else {
        Err(StoreError::InvalidData(format!("{field} needs at least one translation")))
    }
}

/// Insert one `<table>_locales` row per language that appears in any of
/// `fields`. Missing translations are stored as NULL.
pub(crate) fn insert_locales(
    conn: &Connection,
    table: &str,
    parent_id: i64,
    fields: &[(&str, &LocalizedText)],
) -> Result<()> {
    let mut languages: Vec<_> = fields.iter().flat_map(|(_, text)| text.keys()).collect();
    languages.sort();
    languages.dedup();

    let columns: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {table}_locales (parent_id, locale, {}) VALUES (?, ?, {placeholders})",
        columns.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;

    for language in languages {
        let locale = language.as_str();
        let values: Vec<Option<&String>> =
            fields.iter().map(|(_, text)| text.get(language)).collect();

        let mut params: Vec<&dyn ToSql> = vec![&parent_id, &locale];
        for value in &values {
            params.push(value);
        }
        stmt.execute(params.as_slice())?;
    }
    Ok(())
}
