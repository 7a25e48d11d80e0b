use anyhow::Context;
use entities::kv_entry;
use sea_orm::{DatabaseConnection, EntityTrait, Set, sea_query::OnConflict};

use super::KeyValueStore;
use crate::domain::models::now_millis;

/// Key-value store backed by the `kv_store` table.
#[derive(Clone, Debug)]
pub struct SqliteKvStore {
    db: DatabaseConnection,
}

impl SqliteKvStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for SqliteKvStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = kv_entry::Entity::find_by_id(key.to_owned())
            .one(&self.db)
            .await
            .with_context(|| format!("Failed to read key {}", key))?;
        Ok(row.map(|m| m.value))
    }

    #[tracing::instrument(level = "debug", skip(self, value), fields(len = value.len()))]
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let row = kv_entry::ActiveModel {
            key: Set(key.to_owned()),
            value: Set(value.to_owned()),
            updated_at: Set(now_millis()),
        };
        kv_entry::Entity::insert(row)
            .on_conflict(
                OnConflict::column(kv_entry::Column::Key)
                    .update_columns([kv_entry::Column::Value, kv_entry::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .with_context(|| format!("Failed to write key {}", key))?;
        Ok(())
    }
}
