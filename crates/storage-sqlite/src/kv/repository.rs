use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use kds_core::persistence::KeyValueStore;
use kds_core::Result;

use super::model::KvEntryDB;
use crate::db::{create_pool, get_connection, init, run_migrations, DbPool};
use crate::errors::StorageError;
use crate::schema::kv_store;

/// [`KeyValueStore`] over the `kv_store` table.
#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    pool: Arc<DbPool>,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Prepare, migrate and pool the database under `app_data_dir`.
    pub fn open(app_data_dir: &str) -> Result<Self> {
        let db_path = init(app_data_dir)?;
        run_migrations(&db_path)?;
        let pool = create_pool(&db_path)?;
        Ok(Self::new(pool))
    }

    /// Stored keys in ascending order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let keys = kv_store::table
            .select(kv_store::key)
            .order(kv_store::key.asc())
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(keys)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get_item(&self, item_key: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        let row = kv_store::table
            .find(item_key)
            .select(KvEntryDB::as_select())
            .first::<KvEntryDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(|r| r.value))
    }

    fn set_item(&self, item_key: &str, item_value: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        let now = Utc::now().to_rfc3339();
        let row = KvEntryDB {
            key: item_key.to_string(),
            value: item_value.to_string(),
            updated_at: now.clone(),
        };

        diesel::insert_into(kv_store::table)
            .values(&row)
            .on_conflict(kv_store::key)
            .do_update()
            .set((
                kv_store::value.eq(item_value),
                kv_store::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn remove_item(&self, item_key: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        diesel::delete(kv_store::table.find(item_key))
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        Ok(())
    }
}
