//! Search shortcuts and canned AI prompts shown on the new-tab page.

use chrono::Utc;
use rusqlite::params;

use crate::content::{insert_locales, locale_joins, require};
use crate::database::{timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{
    AiSuggestion, ContentQuery, NewAiSuggestion, NewSearchSuggestion, Page, SearchSuggestion,
};

fn select_search(tail: &str) -> String {
    format!(
        "SELECT t.id, COALESCE(l.keyword, d.keyword, ''), t.url, t.logo_url
         FROM search_suggestions t
         {}
         {tail}",
        locale_joins("search_suggestions")
    )
}

fn select_ai(tail: &str) -> String {
    format!(
        "SELECT t.id, COALESCE(l.prompt, d.prompt, '')
         FROM ai_suggestions t
         {}
         {tail}",
        locale_joins("ai_suggestions")
    )
}

impl Database {
    pub fn list_search_suggestions(&self, query: &ContentQuery) -> Result<Page<SearchSuggestion>> {
        self.content_page(
            "search_suggestions",
            &select_search("ORDER BY t.id LIMIT ?3 OFFSET ?4"),
            query,
            row_to_search,
        )
    }

    pub fn get_search_suggestion(&self, query: &ContentQuery, id: i64) -> Result<SearchSuggestion> {
        self.content_one(&select_search("WHERE t.id = ?3"), query, id, row_to_search)
    }

    pub fn create_search_suggestion(&self, new: &NewSearchSuggestion) -> Result<i64> {
        require("keyword", &new.keyword)?;
        if new.url.trim().is_empty() {
            return Err(StoreError::InvalidData("url is required".into()));
        }

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO search_suggestions (url, logo_url, created_at) VALUES (?1, ?2, ?3)",
            params![new.url, new.logo_url, timestamp(Utc::now())],
        )?;
        let id = tx.last_insert_rowid();
        insert_locales(&tx, "search_suggestions", id, &[("keyword", &new.keyword)])?;
        tx.commit()?;
        Ok(id)
    }

    pub fn delete_search_suggestion(&self, id: i64) -> Result<()> {
        self.delete_content("search_suggestions", id)
    }

    pub fn list_ai_suggestions(&self, query: &ContentQuery) -> Result<Page<AiSuggestion>> {
        self.content_page(
            "ai_suggestions",
            &select_ai("ORDER BY t.id LIMIT ?3 OFFSET ?4"),
            query,
            row_to_ai,
        )
    }

    pub fn get_ai_suggestion(&self, query: &ContentQuery, id: i64) -> Result<AiSuggestion> {
        self.content_one(&select_ai("WHERE t.id = ?3"), query, id, row_to_ai)
    }

    pub fn create_ai_suggestion(&self, new: &NewAiSuggestion) -> Result<i64> {
        require("prompt", &new.prompt)?;

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO ai_suggestions (created_at) VALUES (?1)",
            params![timestamp(Utc::now())],
        )?;
        let id = tx.last_insert_rowid();
        insert_locales(&tx, "ai_suggestions", id, &[("prompt", &new.prompt)])?;
        tx.commit()?;
        Ok(id)
    }

    pub fn delete_ai_suggestion(&self, id: i64) -> Result<()> {
        self.delete_content("ai_suggestions", id)
    }
}

fn row_to_search(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchSuggestion> {
    Ok(SearchSuggestion {
        id: row.get(0)?,
        keyword: row.get(1)?,
        url: row.get(2)?,
        logo_url: row.get(3)?,
    })
}

fn row_to_ai(row: &rusqlite::Row<'_>) -> rusqlite::Result<AiSuggestion> {
    Ok(AiSuggestion {
        id: row.get(0)?,
        prompt: row.get(1)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalizedText;
    use dastyar_shared::types::Language;

    #[test]
    fn ai_prompt_falls_back_per_field() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .create_ai_suggestion(&NewAiSuggestion {
                prompt: LocalizedText::from([(Language::En, "Plan my week".to_string())]),
            })
            .unwrap();

        let ar = ContentQuery::new(Language::Ar, Language::En);
        assert_eq!(db.get_ai_suggestion(&ar, id).unwrap().prompt, "Plan my week");
    }

    #[test]
    fn search_suggestion_requires_url() {
        let db = Database::open_in_memory().unwrap();
        let result = db.create_search_suggestion(&NewSearchSuggestion {
            keyword: LocalizedText::from([(Language::En, "Maps".to_string())]),
            url: " ".into(),
            logo_url: String::new(),
        });
        assert!(matches!(result, Err(StoreError::InvalidData(_))));

        let id = db
            .create_search_suggestion(&NewSearchSuggestion {
                keyword: LocalizedText::from([(Language::En, "Maps".to_string())]),
                url: "https://maps.example.com".into(),
                logo_url: "https://maps.example.com/logo.png".into(),
            })
            .unwrap();
        let page = db
            .list_search_suggestions(&ContentQuery::new(Language::En, Language::En))
            .unwrap();
        assert_eq!(page.docs[0].id, id);
        assert_eq!(page.docs[0].keyword, "Maps");
    }
}
