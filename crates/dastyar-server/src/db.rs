//! Async access to the synchronous store.
//!
//! The single `rusqlite` connection lives behind a mutex; every batch of
//! queries runs on the blocking pool so request tasks never stall the
//! runtime.

use std::sync::{Arc, Mutex};

use dastyar_store::{Database, StoreError};

use crate::error::ApiError;

#[derive(Clone)]
pub struct Db {
    inner: Arc<Mutex<Database>>,
}

impl Db {
    pub fn new(database: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(database)),
        }
    }

    /// Run `f` against the database on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let db = inner
                .lock()
                .map_err(|_| ApiError::Internal("database mutex poisoned".into()))?;
            f(&db).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("database task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dastyar_shared::types::Principal;

    #[tokio::test]
    async fn test_call_runs_and_maps_errors() {
        let db = Db::new(Database::open_in_memory().unwrap());

        let user = db
            .call(|db| db.resolve_app_user(&Principal::new("sub", None)))
            .await
            .unwrap();
        assert_eq!(user.subject_id, "sub");

        let missing = db
            .call(|_| Err::<(), _>(StoreError::NotFound))
            .await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));
    }
}
