//! In-memory [`StateStore`] and a seeded harness used by the app-layer tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use relayhub_domain::device::DeviceKind;
use relayhub_domain::error::HubError;
use relayhub_domain::profile::{Permission, Profile};
use relayhub_domain::record::{Category, DeviceRecord, ProfileRecord, StatusRecord};

use crate::access::AccessControl;
use crate::persistence::{PersistenceSync, RetryPolicy};
use crate::ports::StateStore;
use crate::registry::DeviceRegistry;

pub const ROOT_KEY: &str = "root-key";
pub const ALICE_KEY: &str = "alice-key";

/// Registry and profiles wired to a [`MemoryStore`] through running lanes.
///
/// Seeded with `porch-relay` (relay, id 1), `hall-light` (light, id 2),
/// an admin `root` and `alice`, who may only read `porch-relay`.
pub struct Harness {
    pub store: MemoryStore,
    pub registry: Arc<DeviceRegistry>,
    pub access: Arc<AccessControl>,
    pub sync: PersistenceSync,
}

impl Harness {
    /// Must be called from within a tokio runtime.
    pub fn start() -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        registry
            .add_device("porch-relay", "Porch", DeviceKind::Relay)
            .unwrap();
        registry
            .add_device("hall-light", "Hallway", DeviceKind::Light)
            .unwrap();

        let access = Arc::new(AccessControl::new());
        access
            .add_profile(
                Profile::builder()
                    .name("root")
                    .api_key(ROOT_KEY)
                    .admin(true)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        access
            .add_profile(
                Profile::builder()
                    .name("alice")
                    .api_key(ALICE_KEY)
                    .group("garden")
                    .device("porch-relay", Permission::new(true, false))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let store = MemoryStore::default();
        let sync = PersistenceSync::start(
            store.clone(),
            Arc::clone(&registry),
            Arc::clone(&access),
            RetryPolicy::default(),
        );
        Self {
            store,
            registry,
            access,
            sync,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("simulated storage failure")]
struct Simulated;

#[derive(Default)]
struct Tables {
    devices: Vec<DeviceRecord>,
    profiles: Vec<ProfileRecord>,
    statuses: HashMap<DeviceKind, Vec<StatusRecord>>,
    writes: HashMap<Category, usize>,
    attempts: usize,
    fail_reads: bool,
    fail_writes: bool,
}

/// Shared in-memory tables. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put_devices(&self, rows: Vec<DeviceRecord>) {
        self.lock().devices = rows;
    }

    pub fn put_statuses(&self, kind: DeviceKind, rows: Vec<StatusRecord>) {
        self.lock().statuses.insert(kind, rows);
    }

    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.lock().devices.clone()
    }

    pub fn profiles(&self) -> Vec<ProfileRecord> {
        self.lock().profiles.clone()
    }

    pub fn statuses(&self, kind: DeviceKind) -> Vec<StatusRecord> {
        self.lock().statuses.get(&kind).cloned().unwrap_or_default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Successful writes of one table.
    pub fn write_count(&self, category: Category) -> usize {
        self.lock().writes.get(&category).copied().unwrap_or(0)
    }

    /// Every write call, successful or not.
    pub fn write_attempts(&self) -> usize {
        self.lock().attempts
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, HubError> {
        let tables = self.lock();
        if tables.fail_reads {
            return Err(HubError::storage(Simulated));
        }
        Ok(f(&tables))
    }

    fn write(&self, category: Category, f: impl FnOnce(&mut Tables)) -> Result<(), HubError> {
        let mut tables = self.lock();
        tables.attempts += 1;
        if tables.fail_writes {
            return Err(HubError::storage(Simulated));
        }
        f(&mut tables);
        *tables.writes.entry(category).or_default() += 1;
        Ok(())
    }
}

impl StateStore for MemoryStore {
    async fn load_devices(&self) -> Result<Vec<DeviceRecord>, HubError> {
        self.read(|t| t.devices.clone())
    }

    async fn load_profiles(&self) -> Result<Vec<ProfileRecord>, HubError> {
        self.read(|t| t.profiles.clone())
    }

    async fn load_statuses(&self, kind: DeviceKind) -> Result<Vec<StatusRecord>, HubError> {
        self.read(|t| t.statuses.get(&kind).cloned().unwrap_or_default())
    }

    async fn save_devices(&self, records: Vec<DeviceRecord>) -> Result<(), HubError> {
        self.write(Category::Devices, |t| t.devices = records)
    }

    async fn save_profiles(&self, records: Vec<ProfileRecord>) -> Result<(), HubError> {
        self.write(Category::Profiles, |t| t.profiles = records)
    }

    async fn save_statuses(&self, kind: DeviceKind, records: Vec<StatusRecord>) -> Result<(), HubError> {
        self.write(Category::Statuses(kind), |t| {
            t.statuses.insert(kind, records);
        })
    }
}
