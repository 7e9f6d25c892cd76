//! Wallpaper categories and wallpapers.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::params;

use crate::content::{insert_locales, locale_joins, require};
use crate::database::{timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{
    CategoryWithWallpapers, ContentQuery, NewWallpaper, NewWallpaperCategory, Page, Wallpaper,
    WallpaperCategory,
};

/// Limits applied by [`Database::grouped_wallpapers`].
pub const GROUPED_CATEGORY_LIMIT: u32 = 100;
pub const GROUPED_WALLPAPER_LIMIT: u32 = 1000;

fn select_category(tail: &str) -> String {
    format!(
        "SELECT t.id, t.slug, COALESCE(l.title, d.title, '')
         FROM wallpaper_categories t
         {}
         {tail}",
        locale_joins("wallpaper_categories")
    )
}

fn select_wallpaper(tail: &str) -> String {
    format!(
        "SELECT t.id, COALESCE(l.title, d.title, ''), t.file_url, t.category_id
         FROM wallpapers t
         {}
         {tail}",
        locale_joins("wallpapers")
    )
}

impl Database {
    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    pub fn list_wallpaper_categories(
        &self,
        query: &ContentQuery,
    ) -> Result<Page<WallpaperCategory>> {
        self.content_page(
            "wallpaper_categories",
            &select_category("ORDER BY t.id LIMIT ?3 OFFSET ?4"),
            query,
            row_to_category,
        )
    }

    pub fn get_wallpaper_category(
        &self,
        query: &ContentQuery,
        id: i64,
    ) -> Result<WallpaperCategory> {
        self.content_one(&select_category("WHERE t.id = ?3"), query, id, row_to_category)
    }

    pub fn create_wallpaper_category(&self, new: &NewWallpaperCategory) -> Result<i64> {
        require("title", &new.title)?;
        let slug = match new.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => slugify(&new.title)?,
        };

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO wallpaper_categories (slug, created_at) VALUES (?1, ?2)",
            params![slug, timestamp(Utc::now())],
        )?;
        let id = tx.last_insert_rowid();
        insert_locales(&tx, "wallpaper_categories", id, &[("title", &new.title)])?;
        tx.commit()?;

        tracing::debug!(id, %slug, "created wallpaper category");
        Ok(id)
    }

    pub fn delete_wallpaper_category(&self, id: i64) -> Result<()> {
        self.delete_content("wallpaper_categories", id)
    }

    // ------------------------------------------------------------------
    // Wallpapers
    // ------------------------------------------------------------------

    pub fn list_wallpapers(&self, query: &ContentQuery) -> Result<Page<Wallpaper>> {
        self.content_page(
            "wallpapers",
            &select_wallpaper("ORDER BY t.id LIMIT ?3 OFFSET ?4"),
            query,
            row_to_wallpaper,
        )
    }

    pub fn get_wallpaper(&self, query: &ContentQuery, id: i64) -> Result<Wallpaper> {
        self.content_one(&select_wallpaper("WHERE t.id = ?3"), query, id, row_to_wallpaper)
    }

    pub fn wallpaper_exists(&self, id: i64) -> Result<bool> {
        let found: i64 = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM wallpapers WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        Ok(found != 0)
    }

    pub fn create_wallpaper(&self, new: &NewWallpaper) -> Result<i64> {
        require("title", &new.title)?;
        if new.file_url.trim().is_empty() {
            return Err(StoreError::InvalidData("fileUrl is required".into()));
        }

        let tx = self.conn().unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT INTO wallpapers (file_url, category_id, created_at)
             SELECT ?1, id, ?3 FROM wallpaper_categories WHERE id = ?2",
            params![new.file_url, new.category, timestamp(Utc::now())],
        )?;
        if inserted == 0 {
            return Err(StoreError::InvalidData(format!(
                "unknown wallpaper category {}",
                new.category
            )));
        }
        let id = tx.last_insert_rowid();
        insert_locales(&tx, "wallpapers", id, &[("title", &new.title)])?;
        tx.commit()?;

        tracing::debug!(id, category = new.category, "created wallpaper");
        Ok(id)
    }

    pub fn delete_wallpaper(&self, id: i64) -> Result<()> {
        self.delete_content("wallpapers", id)
    }

    // ------------------------------------------------------------------
    // Grouped view
    // ------------------------------------------------------------------

    /// Categories with their wallpapers nested, in id order. Categories
    /// without wallpapers are included with an empty list.
    pub fn grouped_wallpapers(&self, query: &ContentQuery) -> Result<Vec<CategoryWithWallpapers>> {
        let categories = self.content_rows(
            &select_category("ORDER BY t.id LIMIT ?3 OFFSET ?4"),
            query,
            GROUPED_CATEGORY_LIMIT,
            0,
            row_to_category,
        )?;
        let wallpapers = self.content_rows(
            &select_wallpaper("ORDER BY t.id LIMIT ?3 OFFSET ?4"),
            query,
            GROUPED_WALLPAPER_LIMIT,
            0,
            row_to_wallpaper,
        )?;

        let mut by_category: BTreeMap<i64, Vec<Wallpaper>> = BTreeMap::new();
        for wallpaper in wallpapers {
            by_category.entry(wallpaper.category).or_default().push(wallpaper);
        }

        Ok(categories
            .into_iter()
            .map(|category| CategoryWithWallpapers {
                wallpapers: by_category.remove(&category.id).unwrap_or_default(),
                category,
            })
            .collect())
    }
}

/// Lowercased first non-blank title with whitespace runs turned into `-`.
fn slugify(title: &crate::models::LocalizedText) -> Result<String> {
    let source = title
        .values()
        .find(|v| !v.trim().is_empty())
        .ok_or_else(|| StoreError::InvalidData("title is required".into()))?;
    Ok(source
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-"))
}

fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<WallpaperCategory> {
    Ok(WallpaperCategory {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
    })
}

fn row_to_wallpaper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Wallpaper> {
    Ok(Wallpaper {
        id: row.get(0)?,
        title: row.get(1)?,
        file_url: row.get(2)?,
        category: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalizedText;
    use dastyar_shared::types::Language;

    fn en(s: &str) -> LocalizedText {
        LocalizedText::from([(Language::En, s.to_string())])
    }

    #[test]
    fn slug_is_derived_from_title() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .create_wallpaper_category(&NewWallpaperCategory {
                title: en("Mountain  Views"),
                slug: None,
            })
            .unwrap();
        let query = ContentQuery::new(Language::En, Language::En);
        assert_eq!(db.get_wallpaper_category(&query, id).unwrap().slug, "mountain-views");
    }

    #[test]
    fn wallpaper_needs_existing_category() {
        let db = Database::open_in_memory().unwrap();
        let result = db.create_wallpaper(&NewWallpaper {
            title: en("Lake"),
            file_url: "https://cdn.example.com/lake.jpg".into(),
            category: 42,
        });
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
        assert!(!db.wallpaper_exists(1).unwrap());
    }

    #[test]
    fn grouped_nests_wallpapers_under_categories() {
        let db = Database::open_in_memory().unwrap();
        let nature = db
            .create_wallpaper_category(&NewWallpaperCategory {
                title: en("Nature"),
                slug: None,
            })
            .unwrap();
        let empty = db
            .create_wallpaper_category(&NewWallpaperCategory {
                title: en("Cities"),
                slug: Some("urban".into()),
            })
            .unwrap();
        let lake = db
            .create_wallpaper(&NewWallpaper {
                title: en("Lake"),
                file_url: "https://cdn.example.com/lake.jpg".into(),
                category: nature,
            })
            .unwrap();
        assert!(db.wallpaper_exists(lake).unwrap());

        let grouped = db
            .grouped_wallpapers(&ContentQuery::new(Language::En, Language::En))
            .unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].category.id, nature);
        assert_eq!(grouped[0].wallpapers[0].id, lake);
        assert_eq!(grouped[1].category.id, empty);
        assert_eq!(grouped[1].category.slug, "urban");
        assert!(grouped[1].wallpapers.is_empty());
    }

    #[test]
    fn deleting_category_removes_its_wallpapers() {
        let db = Database::open_in_memory().unwrap();
        let cat = db
            .create_wallpaper_category(&NewWallpaperCategory {
                title: en("Space"),
                slug: None,
            })
            .unwrap();
        let wp = db
            .create_wallpaper(&NewWallpaper {
                title: en("Nebula"),
                file_url: "https://cdn.example.com/nebula.jpg".into(),
                category: cat,
            })
            .unwrap();

        db.delete_wallpaper_category(cat).unwrap();
        assert!(!db.wallpaper_exists(wp).unwrap());
    }
}
