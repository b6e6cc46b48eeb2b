//! [`StateStore`] implementation over a directory of JSON files.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use relayhub_app::ports::StateStore;
use relayhub_domain::device::DeviceKind;
use relayhub_domain::error::HubError;
use relayhub_domain::record::{Category, DeviceRecord, ProfileRecord, StatusRecord};

use crate::error::StoreError;

/// Configuration for the JSON storage adapter.
pub struct Config {
    /// Directory holding `devices.json`, `profiles.json`, `relays.json`
    /// and `lights.json`. Created if missing.
    pub data_dir: PathBuf,
}

impl Config {
    /// Build a [`JsonFileStore`], creating the data directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Prepare`] if the directory cannot be created.
    pub async fn build(self) -> Result<JsonFileStore, StoreError> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|source| StoreError::Prepare {
                path: self.data_dir.clone(),
                source,
            })?;
        Ok(JsonFileStore {
            data_dir: self.data_dir,
        })
    }
}

/// Whole-table store: each write replaces one file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the file backing `category`.
    #[must_use]
    pub fn path(&self, category: Category) -> PathBuf {
        self.data_dir.join(format!("{}.json", category.table()))
    }

    async fn read_table<T: DeserializeOwned>(&self, category: Category) -> Result<Vec<T>, StoreError> {
        let path = self.path(category);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "table file missing, reading as empty");
                return Ok(Vec::new());
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        let mut tables: HashMap<String, Vec<T>> = match serde_json::from_slice(&raw) {
            Ok(tables) => tables,
            Err(source) => return Err(StoreError::Decode { path, source }),
        };
        Ok(tables.remove(category.table()).unwrap_or_default())
    }

    async fn write_table<T: Serialize>(&self, category: Category, rows: Vec<T>) -> Result<(), StoreError> {
        let table = category.table();
        let count = rows.len();
        let mut wrapped = BTreeMap::new();
        wrapped.insert(table, rows);
        let payload = serde_json::to_vec_pretty(&wrapped)
            .map_err(|source| StoreError::Encode { table, source })?;

        let path = self.path(category);
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        if let Err(source) = tokio::fs::write(&temp_path, payload).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Write {
                path: temp_path,
                source,
            });
        }
        if let Err(source) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Write { path, source });
        }
        tracing::debug!(path = %path.display(), rows = count, "table written");
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    async fn load_devices(&self) -> Result<Vec<DeviceRecord>, HubError> {
        Ok(self.read_table(Category::Devices).await?)
    }

    async fn load_profiles(&self) -> Result<Vec<ProfileRecord>, HubError> {
        Ok(self.read_table(Category::Profiles).await?)
    }

    async fn load_statuses(&self, kind: DeviceKind) -> Result<Vec<StatusRecord>, HubError> {
        Ok(self.read_table(Category::Statuses(kind)).await?)
    }

    async fn save_devices(&self, records: Vec<DeviceRecord>) -> Result<(), HubError> {
        Ok(self.write_table(Category::Devices, records).await?)
    }

    async fn save_profiles(&self, records: Vec<ProfileRecord>) -> Result<(), HubError> {
        Ok(self.write_table(Category::Profiles, records).await?)
    }

    async fn save_statuses(&self, kind: DeviceKind, records: Vec<StatusRecord>) -> Result<(), HubError> {
        Ok(self.write_table(Category::Statuses(kind), records).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relayhub_app::access::AccessControl;
    use relayhub_app::persistence::{self, PersistenceSync, RetryPolicy};
    use relayhub_app::registry::DeviceRegistry;
    use relayhub_domain::profile::{Permission, Profile};

    use super::*;

    async fn store(dir: &tempfile::TempDir) -> JsonFileStore {
        Config {
            data_dir: dir.path().join("data"),
        }
        .build()
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn should_read_missing_tables_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        assert!(store.load_devices().await.unwrap().is_empty());
        assert!(store.load_profiles().await.unwrap().is_empty());
        assert!(store.load_statuses(DeviceKind::Light).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_wrap_rows_in_named_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        store
            .save_statuses(
                DeviceKind::Relay,
                vec![StatusRecord {
                    name: "porch-relay".to_string(),
                    status: true,
                }],
            )
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join("data/relays.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"relays": [{"name": "porch-relay", "status": true}]})
        );
    }

    #[tokio::test]
    async fn should_read_hand_written_device_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        std::fs::write(
            store.path(Category::Devices),
            r#"{"devices": [{"name": "hall-light", "type": "light"}]}"#,
        )
        .unwrap();

        let devices = store.load_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].kind, "light");
        assert_eq!(devices[0].description, "");
    }

    #[tokio::test]
    async fn should_fail_on_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        std::fs::write(store.path(Category::Profiles), "{ not json").unwrap();

        assert!(matches!(
            store.load_profiles().await,
            Err(HubError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn should_replace_file_without_leaving_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let record = |name: &str| DeviceRecord {
            name: name.to_string(),
            description: String::new(),
            kind: "relay".to_string(),
        };

        store
            .save_devices(vec![record("a"), record("b")])
            .await
            .unwrap();
        store.save_devices(vec![record("c")]).await.unwrap();

        let names: Vec<String> = store
            .load_devices()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["c"]);
        let files = std::fs::read_dir(store.data_dir()).unwrap().count();
        assert_eq!(files, 1);
    }

    fn leftover_temp_files(store: &JsonFileStore) -> Vec<PathBuf> {
        std::fs::read_dir(store.data_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.to_string_lossy().ends_with(".tmp"))
            .collect()
    }

    #[tokio::test]
    async fn should_fail_write_when_data_dir_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        std::fs::remove_dir(store.data_dir()).unwrap();

        let result = store.save_devices(vec![]).await;
        assert!(matches!(result, Err(HubError::Storage(_))));

        std::fs::create_dir(store.data_dir()).unwrap();
        assert!(leftover_temp_files(&store).is_empty());
    }

    #[tokio::test]
    async fn should_remove_temp_file_when_replace_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        // A non-empty directory where the table file should be blocks the rename.
        let blocker = store.path(Category::Devices);
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        for _ in 0..3 {
            let result = store.save_devices(vec![]).await;
            assert!(matches!(result, Err(HubError::Storage(_))));
        }

        assert!(leftover_temp_files(&store).is_empty());
    }

    #[tokio::test]
    async fn should_preserve_profiles_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let access = Arc::new(AccessControl::new());
        access
            .add_profile(
                Profile::builder()
                    .name("alice")
                    .api_key("alice-key")
                    .group("garden")
                    .group("attic")
                    .device("porch-relay", Permission::new(true, false))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        access
            .add_profile(
                Profile::builder()
                    .name("root")
                    .api_key("root-key")
                    .admin(true)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let sync = PersistenceSync::start(
            store(&dir).await,
            Arc::new(DeviceRegistry::new()),
            Arc::clone(&access),
            RetryPolicy::default(),
        );
        sync.handle().schedule(Category::Profiles);
        sync.shutdown().await.unwrap();

        let reloaded = AccessControl::new();
        persistence::load(&store(&dir).await)
            .await
            .unwrap()
            .install(&DeviceRegistry::new(), &reloaded)
            .unwrap();

        assert_eq!(reloaded.profiles(), access.profiles());
        assert_eq!(
            reloaded.validate("alice-key", "porch-relay"),
            Permission::new(true, false)
        );
    }

    #[tokio::test]
    async fn should_restore_status_but_not_state_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(DeviceRegistry::new());
        registry
            .add_device("porch-relay", "Porch", DeviceKind::Relay)
            .unwrap();
        registry
            .add_device("hall-light", "Hallway", DeviceKind::Light)
            .unwrap();
        registry.set_status("porch-relay", true).unwrap();
        registry
            .update("porch-relay", true, chrono::Utc::now())
            .unwrap();

        let sync = PersistenceSync::start(
            store(&dir).await,
            Arc::clone(&registry),
            Arc::new(AccessControl::new()),
            RetryPolicy::default(),
        );
        for category in Category::ALL {
            sync.handle().schedule(category);
        }
        sync.shutdown().await.unwrap();

        let fresh = DeviceRegistry::new();
        persistence::load(&store(&dir).await)
            .await
            .unwrap()
            .install(&fresh, &AccessControl::new())
            .unwrap();

        let relay = fresh.device("porch-relay").unwrap();
        assert!(relay.status());
        assert!(!relay.state());
        assert!(!relay.online());
        assert!(!fresh.device("hall-light").unwrap().status());
    }
}
