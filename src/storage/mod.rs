// Local persistence: a key-value seam plus the two documents stored through it

mod memory;
mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

use std::sync::Arc;

use crate::domain::models::{ProgressMap, Settings};

/// Storage key of the JSON progress map.
pub const PROGRESS_KEY: &str = "driveread.progress.v1";
/// Storage key of the JSON settings record.
pub const SETTINGS_KEY: &str = "driveread.settings.v1";

/// Durable per-device string storage. Each key holds one whole JSON document.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Local progress persistence. Never fails towards the caller: unreadable or corrupt data
/// loads as an empty map and failed writes are logged.
pub struct PositionStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: tokio::sync::Mutex<()>,
}

impl PositionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn load(&self) -> ProgressMap {
        let raw = match self.kv.get(PROGRESS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return ProgressMap::new(),
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "failed to read local progress; starting empty");
                return ProgressMap::new();
            }
        };
        match ProgressMap::from_json_lenient(&raw) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "local progress is corrupt; starting empty");
                ProgressMap::new()
            }
        }
    }

    /// Persist whatever `snapshot` yields at the moment the write lock is acquired. Writers that
    /// queue behind each other therefore always land in snapshot order.
    pub async fn save_latest<F>(&self, snapshot: F) -> ProgressMap
    where
        F: FnOnce() -> ProgressMap,
    {
        let _guard = self.write_lock.lock().await;
        let map = snapshot();
        self.write(&map).await;
        map
    }

    async fn write(&self, map: &ProgressMap) {
        let json = match map.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "failed to encode local progress");
                return;
            }
        };
        match self.kv.set(PROGRESS_KEY, &json).await {
            Ok(()) => tracing::debug!(entries = map.len(), "saved local progress"),
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "failed to save local progress; keeping it in memory only")
            }
        }
    }
}

/// Local settings persistence with the same never-fail policy as [`PositionStore`].
pub struct SettingsStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn load(&self) -> Settings {
        match self.kv.get(SETTINGS_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stored settings are corrupt; using defaults");
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "failed to read settings; using defaults");
                Settings::default()
            }
        }
    }

    pub async fn save(&self, settings: &Settings) -> bool {
        let json = match serde_json::to_string(settings) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode settings");
                return false;
            }
        };
        match self.kv.set(SETTINGS_KEY, &json).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "failed to save settings");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{PositionRecord, Theme};

    #[tokio::test]
    async fn first_run_loads_empty_map() {
        let store = PositionStore::new(Arc::new(MemoryKvStore::new()));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn progress_is_written_under_well_known_key() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = PositionStore::new(kv.clone());
        let mut map = ProgressMap::new();
        map.insert("book1", PositionRecord::new("p1", 100));
        store.save_latest(|| map.clone()).await;

        let raw = kv.raw(PROGRESS_KEY).unwrap();
        assert_eq!(raw, r#"{"book1":{"position":"p1","updatedAt":100}}"#);
        assert_eq!(store.load().await, map);
    }

    #[tokio::test]
    async fn corrupt_progress_loads_empty() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set(PROGRESS_KEY, "{not json").await.unwrap();
        let store = PositionStore::new(kv);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn failing_storage_degrades_silently() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = PositionStore::new(kv.clone());
        kv.set_failing(true);

        let mut map = ProgressMap::new();
        map.insert("book1", PositionRecord::new("p1", 1));
        store.save_latest(|| map.clone()).await;
        assert!(store.load().await.is_empty());
        kv.set_failing(false);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn save_latest_snapshots_inside_the_lock() {
        let store = PositionStore::new(Arc::new(MemoryKvStore::new()));
        let saved = store
            .save_latest(|| {
                let mut m = ProgressMap::new();
                m.insert("b", PositionRecord::new("p", 7));
                m
            })
            .await;
        assert_eq!(store.load().await, saved);
    }

    #[tokio::test]
    async fn settings_round_trip_and_defaults() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = SettingsStore::new(kv.clone());
        assert_eq!(store.load().await, Settings::default());

        let dark = Settings {
            theme: Theme::Dark,
            ..Settings::default()
        };
        assert!(store.save(&dark).await);
        assert_eq!(store.load().await, dark);

        kv.set(SETTINGS_KEY, "{broken").await.unwrap();
        assert_eq!(store.load().await, Settings::default());
    }
}
