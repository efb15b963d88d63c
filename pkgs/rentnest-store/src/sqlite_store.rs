//! SQLite-backed key/value store

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use crate::entities::kv_entries;
use crate::migration::Migrator;
use crate::{KeyValueStore, Result, StorageError, StoreConfig};

/// Key/value store persisted in the `kv_store` table
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    db: DatabaseConnection,
}

impl SqliteKeyValueStore {
    /// Wrap an already-migrated connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open (or create) the database file and run pending migrations
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let url = format!(
            "sqlite:{}?mode=rwc",
            config.db_path.to_string_lossy().replace('\\', "/")
        );
        info!("Opening key/value store at {}", config.db_path.display());

        let db = Database::connect(&url).await?;
        Migrator::up(&db, None)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        Ok(Self { db })
    }

    /// Number of stored entries
    pub async fn len(&self) -> Result<usize> {
        let count = kv_entries::Entity::find().count(&self.db).await?;
        Ok(count as usize)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        debug!("Reading key: {}", key);

        let row = kv_entries::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?;

        Ok(row.map(|model| model.value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        debug!("Writing key: {}", key);

        let entry = kv_entries::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(chrono::Utc::now().timestamp_millis()),
        };

        kv_entries::Entity::insert(entry)
            .on_conflict(
                OnConflict::column(kv_entries::Column::Key)
                    .update_columns([kv_entries::Column::Value, kv_entries::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        debug!("Removing key: {}", key);

        kv_entries::Entity::delete_by_id(key.to_string())
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let result = kv_entries::Entity::delete_many()
            .filter(kv_entries::Column::Key.is_in(keys.iter().copied()))
            .exec(&self.db)
            .await?;

        debug!(
            "Removed {} of {} requested keys",
            result.rows_affected,
            keys.len()
        );
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        info!("Clearing key/value store");

        kv_entries::Entity::delete_many().exec(&self.db).await?;
        Ok(())
    }
}
