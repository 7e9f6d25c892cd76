//! Cities with coordinates, used by the weather endpoint and listed for
//! the extension's city picker.

use chrono::Utc;
use rusqlite::params;

use crate::content::{insert_locales, locale_joins, require};
use crate::database::{timestamp, Database};
use crate::error::Result;
use crate::models::{City, ContentQuery, NewCity, Page};

/// Upper bound on rows scanned by the nearest-city lookup.
pub const NEAREST_CITY_SCAN_LIMIT: u32 = 1000;

fn select(tail: &str) -> String {
    format!(
        "SELECT t.id,
                COALESCE(l.name, d.name, ''),
                COALESCE(l.country, d.country, ''),
                t.latitude, t.longitude
         FROM cities t
         {}
         {tail}",
        locale_joins("cities")
    )
}

impl Database {
    pub fn list_cities(&self, query: &ContentQuery) -> Result<Page<City>> {
        self.content_page(
            "cities",
            &select("ORDER BY t.id LIMIT ?3 OFFSET ?4"),
            query,
            row_to_city,
        )
    }

    pub fn get_city(&self, query: &ContentQuery, id: i64) -> Result<City> {
        self.content_one(&select("WHERE t.id = ?3"), query, id, row_to_city)
    }

    /// Every city (up to [`NEAREST_CITY_SCAN_LIMIT`]) for coordinate lookups.
    pub fn all_cities(&self, query: &ContentQuery) -> Result<Vec<City>> {
        self.content_rows(
            &select("ORDER BY t.id LIMIT ?3 OFFSET ?4"),
            query,
            NEAREST_CITY_SCAN_LIMIT,
            0,
            row_to_city,
        )
    }

    /// First city (by id) whose localized name contains `fragment`,
    /// case-insensitively. `None` when nothing matches.
    pub fn find_city_by_name(&self, query: &ContentQuery, fragment: &str) -> Result<Option<City>> {
        let pattern = format!("%{}%", escape_like(fragment.trim()));
        let sql = select(
            "WHERE COALESCE(l.name, d.name, '') LIKE ?3 ESCAPE '\\'
             ORDER BY t.id
             LIMIT 1",
        );

        let result = self.conn().query_row(
            &sql,
            params![query.locale.as_str(), query.fallback.as_str(), pattern],
            row_to_city,
        );
        match result {
            Ok(city) => Ok(Some(city)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn create_city(&self, new: &NewCity) -> Result<i64> {
        require("name", &new.name)?;

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO cities (latitude, longitude, created_at) VALUES (?1, ?2, ?3)",
            params![new.latitude, new.longitude, timestamp(Utc::now())],
        )?;
        let id = tx.last_insert_rowid();
        insert_locales(
            &tx,
            "cities",
            id,
            &[("name", &new.name), ("country", &new.country)],
        )?;
        tx.commit()?;

        tracing::debug!(id, "created city");
        Ok(id)
    }

    pub fn delete_city(&self, id: i64) -> Result<()> {
        self.delete_content("cities", id)
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn row_to_city(row: &rusqlite::Row<'_>) -> rusqlite::Result<City> {
    Ok(City {
        id: row.get(0)?,
        name: row.get(1)?,
        country: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
    })
}
