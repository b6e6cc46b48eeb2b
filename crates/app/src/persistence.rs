//! Write-through to the store and the boot-time load.
//!
//! ## Boot
//! [`load`] reads every table and rebuilds devices and profiles;
//! [`LoadedState::install`] hands them to the registry and access control.
//! Any failure here is fatal: the daemon must not serve a half-loaded state.
//!
//! ## Write-through
//! Each [`Category`] has its own *lane*: a background task that rewrites the
//! whole table from a fresh snapshot of the in-memory state. Mutations call
//! [`PersistenceHandle::schedule`], which bumps the lane's request counter
//! and returns immediately.
//!
//! - Writes of one category never overlap; different lanes run concurrently.
//! - Requests that pile up while a write is in flight collapse into a single
//!   follow-up write, which snapshots the latest state. The last value
//!   always lands.
//! - A failed write is retried per [`RetryPolicy`], then logged. In-memory
//!   state is never rolled back.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use relayhub_domain::device::{Device, DeviceKind};
use relayhub_domain::error::HubError;
use relayhub_domain::profile::Profile;
use relayhub_domain::record::{Category, DeviceRecord, ProfileRecord, StatusRecord};

use crate::access::AccessControl;
use crate::ports::StateStore;
use crate::registry::DeviceRegistry;

/// Errors raised by the write-through lanes.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The last write of a table failed after every retry.
    #[error("failed to write the {0} table")]
    WriteFailed(Category),

    /// The lanes were shut down while a flush was waiting.
    #[error("persistence lanes are stopped")]
    Stopped,
}

impl From<PersistenceError> for HubError {
    fn from(err: PersistenceError) -> Self {
        Self::storage(err)
    }
}

/// State read from storage at boot, not yet installed.
#[derive(Debug, Default)]
pub struct LoadedState {
    pub devices: Vec<Device>,
    pub profiles: Vec<Profile>,
}

/// Read every table from `store` and rebuild devices and profiles.
///
/// Device kinds are parsed strictly: an unknown `type` is a configuration
/// error. Each device's commanded status is seeded from its kind's status
/// table; status rows naming no device of that kind are skipped with a
/// warning. Observed state and the online flag start out false.
///
/// # Errors
///
/// Returns the first read, decode or validation failure.
#[tracing::instrument(skip(store))]
pub async fn load<S: StateStore>(store: &S) -> Result<LoadedState, HubError> {
    let mut statuses: HashMap<DeviceKind, HashMap<String, bool>> = HashMap::new();
    for kind in DeviceKind::ALL {
        let rows = store.load_statuses(kind).await?;
        statuses.insert(
            kind,
            rows.into_iter().map(|row| (row.name, row.status)).collect(),
        );
    }

    let mut devices = Vec::new();
    for record in store.load_devices().await? {
        let kind: DeviceKind = record.kind.parse()?;
        let status = statuses
            .get_mut(&kind)
            .and_then(|table| table.remove(&record.name))
            .unwrap_or(false);
        tracing::info!(
            device = %record.name,
            description = %record.description,
            kind = %kind,
            status,
            "loaded device"
        );
        devices.push(
            Device::builder()
                .name(record.name)
                .description(record.description)
                .kind(kind)
                .status(status)
                .build()?,
        );
    }

    for (kind, leftovers) in &statuses {
        for name in leftovers.keys() {
            tracing::warn!(device = %name, kind = %kind, "status row without a matching device, skipped");
        }
    }

    let mut profiles = Vec::new();
    for record in store.load_profiles().await? {
        let profile = Profile::try_from(record)?;
        tracing::info!(
            profile = %profile.name,
            admin = profile.admin,
            devices = profile.devices().count(),
            groups = profile.groups().count(),
            "loaded profile"
        );
        profiles.push(profile);
    }

    Ok(LoadedState { devices, profiles })
}

impl LoadedState {
    /// Register every loaded device and profile.
    ///
    /// Devices receive fresh ids in table order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] on duplicate device or profile names.
    pub fn install(self, registry: &DeviceRegistry, access: &AccessControl) -> Result<(), HubError> {
        for device in self.devices {
            registry.insert(device)?;
        }
        for profile in self.profiles {
            access.add_profile(profile)?;
        }
        Ok(())
    }
}

/// How often and how patiently a failed table write is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per write, including the first. At least one.
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    generation: u64,
    failed: bool,
}

struct Lane {
    category: Category,
    requested: AtomicU64,
    notify: Notify,
    completed: watch::Sender<Progress>,
}

impl Lane {
    fn new(category: Category) -> Self {
        Self {
            category,
            requested: AtomicU64::new(0),
            notify: Notify::new(),
            completed: watch::Sender::new(Progress::default()),
        }
    }
}

/// Cheap, cloneable handle used by mutations to schedule table writes.
#[derive(Clone)]
pub struct PersistenceHandle {
    lanes: Arc<HashMap<Category, Arc<Lane>>>,
    stopped: Arc<AtomicBool>,
    stop: watch::Receiver<bool>,
}

/// Owner of the lane tasks. Dropping it without [`shutdown`](Self::shutdown)
/// stops the lanes without a final flush.
pub struct PersistenceSync {
    handle: PersistenceHandle,
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PersistenceSync {
    /// Spawn one lane task per category on the current tokio runtime.
    pub fn start<S>(
        store: S,
        registry: Arc<DeviceRegistry>,
        access: Arc<AccessControl>,
        retry: RetryPolicy,
    ) -> Self
    where
        S: StateStore + Send + Sync + 'static,
    {
        let store = Arc::new(store);
        let (stop, stop_rx) = watch::channel(false);
        let mut lanes = HashMap::new();
        let mut tasks = Vec::new();

        for category in Category::ALL {
            let lane = Arc::new(Lane::new(category));
            lanes.insert(category, Arc::clone(&lane));
            let worker = LaneWorker {
                lane,
                store: Arc::clone(&store),
                registry: Arc::clone(&registry),
                access: Arc::clone(&access),
                retry,
                stop: stop.subscribe(),
            };
            tasks.push(tokio::spawn(worker.run()));
        }

        Self {
            handle: PersistenceHandle {
                lanes: Arc::new(lanes),
                stopped: Arc::new(AtomicBool::new(false)),
                stop: stop_rx,
            },
            stop,
            tasks,
        }
    }

    /// A handle for scheduling writes.
    #[must_use]
    pub fn handle(&self) -> PersistenceHandle {
        self.handle.clone()
    }

    /// Flush pending writes, then stop every lane.
    ///
    /// # Errors
    ///
    /// Returns the flush outcome; the lanes are stopped either way.
    pub async fn shutdown(mut self) -> Result<(), HubError> {
        let flushed = self.handle.flush().await;
        self.signal_stop();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "persistence lane panicked");
            }
        }
        flushed
    }

    fn signal_stop(&self) {
        self.handle.stopped.store(true, Ordering::Release);
        self.stop.send_replace(true);
    }
}

impl Drop for PersistenceSync {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

impl PersistenceHandle {
    /// Ask for the table of `category` to be rewritten. Never blocks.
    pub fn schedule(&self, category: Category) {
        if self.stopped.load(Ordering::Acquire) {
            tracing::warn!(table = %category, "write requested after shutdown, dropped");
            return;
        }
        if let Some(lane) = self.lanes.get(&category) {
            lane.requested.fetch_add(1, Ordering::AcqRel);
            lane.notify.notify_one();
            tracing::debug!(table = %category, "table write scheduled");
        }
    }

    /// Wait until every write scheduled so far has been attempted.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::WriteFailed`] for the first table whose
    /// latest write failed, or [`PersistenceError::Stopped`] if the lanes
    /// went away while waiting.
    pub async fn flush(&self) -> Result<(), HubError> {
        let mut first_failure = None;
        for category in Category::ALL {
            let Some(lane) = self.lanes.get(&category) else {
                continue;
            };
            let target = lane.requested.load(Ordering::Acquire);
            let mut progress = lane.completed.subscribe();
            let mut stop = self.stop.clone();
            let done = tokio::select! {
                biased;
                reached = progress.wait_for(|p| p.generation >= target) => {
                    *reached.map_err(|_| PersistenceError::Stopped)?
                }
                _ = stop.wait_for(|stopped| *stopped) => {
                    let current = *lane.completed.borrow();
                    if current.generation < target {
                        return Err(PersistenceError::Stopped.into());
                    }
                    current
                }
            };
            if done.failed && first_failure.is_none() {
                first_failure = Some(PersistenceError::WriteFailed(category));
            }
        }
        match first_failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

enum Table {
    Devices(Vec<DeviceRecord>),
    Profiles(Vec<ProfileRecord>),
    Statuses(DeviceKind, Vec<StatusRecord>),
}

struct LaneWorker<S> {
    lane: Arc<Lane>,
    store: Arc<S>,
    registry: Arc<DeviceRegistry>,
    access: Arc<AccessControl>,
    retry: RetryPolicy,
    stop: watch::Receiver<bool>,
}

impl<S: StateStore + Send + Sync + 'static> LaneWorker<S> {
    async fn run(mut self) {
        let category = self.lane.category;
        loop {
            let target = self.lane.requested.load(Ordering::Acquire);
            if target == self.lane.completed.borrow().generation {
                tokio::select! {
                    () = self.lane.notify.notified() => continue,
                    changed = self.stop.changed() => {
                        if changed.is_err() || *self.stop.borrow() {
                            break;
                        }
                        continue;
                    }
                }
            }

            let ok = self.write_with_retry().await;
            self.lane.completed.send_replace(Progress {
                generation: target,
                failed: !ok,
            });
        }
        tracing::debug!(table = %category, "persistence lane stopped");
    }

    async fn write_with_retry(&self) -> bool {
        let category = self.lane.category;
        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            // Snapshot per attempt so a retry never writes stale data.
            let table = self.snapshot();
            match self.write(table).await {
                Ok(()) => {
                    tracing::debug!(table = %category, attempt, "table written");
                    return true;
                }
                Err(err) if attempt < attempts => {
                    tracing::warn!(table = %category, attempt, error = %err, "table write failed, retrying");
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(err) => {
                    tracing::error!(table = %category, attempts, error = %err, "table write failed, giving up");
                }
            }
        }
        false
    }

    fn snapshot(&self) -> Table {
        match self.lane.category {
            Category::Devices => Table::Devices(
                self.registry
                    .devices()
                    .iter()
                    .map(DeviceRecord::from)
                    .collect(),
            ),
            Category::Profiles => Table::Profiles(
                self.access
                    .profiles()
                    .iter()
                    .map(ProfileRecord::from)
                    .collect(),
            ),
            Category::Statuses(kind) => Table::Statuses(
                kind,
                self.registry
                    .devices_by_type(kind)
                    .iter()
                    .map(StatusRecord::from)
                    .collect(),
            ),
        }
    }

    async fn write(&self, table: Table) -> Result<(), HubError> {
        match table {
            Table::Devices(rows) => self.store.save_devices(rows).await,
            Table::Profiles(rows) => self.store.save_profiles(rows).await,
            Table::Statuses(kind, rows) => self.store.save_statuses(kind, rows).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use relayhub_domain::profile::Permission;

    use super::*;
    use crate::testing::MemoryStore;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::default();
        store.put_devices(vec![
            DeviceRecord {
                name: "porch-relay".to_string(),
                description: "Porch".to_string(),
                kind: "relay".to_string(),
            },
            DeviceRecord {
                name: "hall-light".to_string(),
                description: "Hallway".to_string(),
                kind: "light".to_string(),
            },
        ]);
        store.put_statuses(
            DeviceKind::Relay,
            vec![
                StatusRecord {
                    name: "porch-relay".to_string(),
                    status: true,
                },
                StatusRecord {
                    name: "ghost".to_string(),
                    status: true,
                },
            ],
        );
        store
    }

    #[tokio::test]
    async fn should_seed_status_and_reset_observed_state_on_load() {
        let loaded = load(&seeded_store()).await.unwrap();
        assert_eq!(loaded.devices.len(), 2);

        let porch = &loaded.devices[0];
        assert_eq!(porch.name, "porch-relay");
        assert!(porch.status());
        assert!(!porch.state());
        assert!(!porch.online());

        let hall = &loaded.devices[1];
        assert_eq!(hall.kind, DeviceKind::Light);
        assert!(!hall.status());
    }

    #[tokio::test]
    async fn should_not_seed_status_across_kinds() {
        let store = seeded_store();
        store.put_statuses(
            DeviceKind::Relay,
            vec![StatusRecord {
                name: "hall-light".to_string(),
                status: true,
            }],
        );
        let loaded = load(&store).await.unwrap();
        assert!(!loaded.devices[1].status());
    }

    #[tokio::test]
    async fn should_fail_load_on_unknown_device_type() {
        let store = MemoryStore::default();
        store.put_devices(vec![DeviceRecord {
            name: "boiler".to_string(),
            description: String::new(),
            kind: "thermostat".to_string(),
        }]);
        assert!(matches!(load(&store).await, Err(HubError::Validation(_))));
    }

    #[tokio::test]
    async fn should_fail_load_when_store_is_unreadable() {
        let store = MemoryStore::default();
        store.fail_reads(true);
        assert!(matches!(load(&store).await, Err(HubError::Storage(_))));
    }

    #[tokio::test]
    async fn should_fail_install_on_duplicate_device_names() {
        let store = seeded_store();
        let mut devices = store.devices();
        devices.push(devices[0].clone());
        store.put_devices(devices);

        let loaded = load(&store).await.unwrap();
        let result = loaded.install(&DeviceRegistry::new(), &AccessControl::new());
        assert!(matches!(result, Err(HubError::Validation(_))));
    }

    #[tokio::test]
    async fn should_write_status_table_when_scheduled() {
        let store = MemoryStore::default();
        let registry = Arc::new(DeviceRegistry::new());
        let access = Arc::new(AccessControl::new());
        registry
            .add_device("porch-relay", "Porch", DeviceKind::Relay)
            .unwrap();
        let sync = PersistenceSync::start(
            store.clone(),
            Arc::clone(&registry),
            access,
            RetryPolicy::default(),
        );
        let handle = sync.handle();

        registry.set_status("porch-relay", true).unwrap();
        handle.schedule(Category::Statuses(DeviceKind::Relay));
        handle.flush().await.unwrap();

        assert_eq!(
            store.statuses(DeviceKind::Relay),
            vec![StatusRecord {
                name: "porch-relay".to_string(),
                status: true,
            }]
        );
        assert!(store.statuses(DeviceKind::Light).is_empty());
        sync.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn should_survive_restart_with_commanded_status_only() {
        let store = MemoryStore::default();
        let registry = Arc::new(DeviceRegistry::new());
        let access = Arc::new(AccessControl::new());
        registry
            .add_device("porch-relay", "Porch", DeviceKind::Relay)
            .unwrap();
        let sync = PersistenceSync::start(
            store.clone(),
            Arc::clone(&registry),
            access,
            RetryPolicy::default(),
        );
        let handle = sync.handle();

        registry.set_status("porch-relay", true).unwrap();
        registry
            .update("porch-relay", true, chrono::Utc::now())
            .unwrap();
        handle.schedule(Category::Devices);
        handle.schedule(Category::Statuses(DeviceKind::Relay));
        sync.shutdown().await.unwrap();

        let fresh_registry = DeviceRegistry::new();
        load(&store)
            .await
            .unwrap()
            .install(&fresh_registry, &AccessControl::new())
            .unwrap();
        let relay = fresh_registry.device("porch-relay").unwrap();
        assert!(relay.status());
        assert!(!relay.state());
        assert!(!relay.online());
    }

    #[tokio::test]
    async fn should_roundtrip_profiles_through_store() {
        let store = MemoryStore::default();
        let registry = Arc::new(DeviceRegistry::new());
        let access = Arc::new(AccessControl::new());
        access
            .add_profile(
                Profile::builder()
                    .name("alice")
                    .api_key("alice-key")
                    .group("garden")
                    .group("attic")
                    .device("porch-relay", Permission::new(true, false))
                    .device("hall-light", Permission::FULL)
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
            store.clone(),
            registry,
            Arc::clone(&access),
            RetryPolicy::default(),
        );
        sync.handle().schedule(Category::Profiles);
        sync.shutdown().await.unwrap();

        let reloaded = AccessControl::new();
        load(&store)
            .await
            .unwrap()
            .install(&DeviceRegistry::new(), &reloaded)
            .unwrap();

        for original in access.profiles() {
            let copy = reloaded.profile(&original.name).unwrap();
            assert_eq!(copy.api_key, original.api_key);
            assert_eq!(copy.admin, original.admin);
            assert_eq!(
                copy.groups().collect::<Vec<_>>(),
                original.groups().collect::<Vec<_>>()
            );
            assert_eq!(
                copy.devices().collect::<Vec<_>>(),
                original.devices().collect::<Vec<_>>()
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_land_final_value_after_concurrent_switches() {
        let store = MemoryStore::default();
        let registry = Arc::new(DeviceRegistry::new());
        registry
            .add_device("porch-relay", "Porch", DeviceKind::Relay)
            .unwrap();
        let sync = PersistenceSync::start(
            store.clone(),
            Arc::clone(&registry),
            Arc::new(AccessControl::new()),
            RetryPolicy::default(),
        );

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let registry = Arc::clone(&registry);
            let handle = sync.handle();
            tasks.push(tokio::spawn(async move {
                registry.switch("porch-relay").unwrap();
                handle.schedule(Category::Statuses(DeviceKind::Relay));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        sync.shutdown().await.unwrap();

        let in_memory = registry.device("porch-relay").unwrap().status();
        assert!(!in_memory);
        assert_eq!(store.statuses(DeviceKind::Relay)[0].status, in_memory);
    }

    #[tokio::test]
    async fn should_coalesce_bursts_into_few_writes() {
        let store = MemoryStore::default();
        let registry = Arc::new(DeviceRegistry::new());
        registry
            .add_device("porch-relay", "Porch", DeviceKind::Relay)
            .unwrap();
        let sync = PersistenceSync::start(
            store.clone(),
            Arc::clone(&registry),
            Arc::new(AccessControl::new()),
            RetryPolicy::default(),
        );
        let handle = sync.handle();

        for _ in 0..50 {
            registry.switch("porch-relay").unwrap();
            handle.schedule(Category::Statuses(DeviceKind::Relay));
        }
        handle.flush().await.unwrap();

        assert_eq!(store.write_count(Category::Statuses(DeviceKind::Relay)), 1);
        assert!(!store.statuses(DeviceKind::Relay)[0].status);
        sync.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_retry_then_report_failed_write() {
        let store = MemoryStore::default();
        store.fail_writes(true);
        let registry = Arc::new(DeviceRegistry::new());
        registry
            .add_device("porch-relay", "Porch", DeviceKind::Relay)
            .unwrap();
        let sync = PersistenceSync::start(
            store.clone(),
            Arc::clone(&registry),
            Arc::new(AccessControl::new()),
            RetryPolicy {
                attempts: 3,
                backoff: Duration::from_millis(10),
            },
        );
        let handle = sync.handle();

        registry.set_status("porch-relay", true).unwrap();
        handle.schedule(Category::Statuses(DeviceKind::Relay));
        let result = handle.flush().await;

        assert!(matches!(result, Err(HubError::Storage(_))));
        assert_eq!(store.write_attempts(), 3);
        // In-memory state is the source of truth and is never rolled back.
        assert!(registry.device("porch-relay").unwrap().status());

        store.fail_writes(false);
        handle.schedule(Category::Statuses(DeviceKind::Relay));
        handle.flush().await.unwrap();
        assert!(store.statuses(DeviceKind::Relay)[0].status);
        sync.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn should_succeed_flush_when_nothing_was_scheduled() {
        let sync = PersistenceSync::start(
            MemoryStore::default(),
            Arc::new(DeviceRegistry::new()),
            Arc::new(AccessControl::new()),
            RetryPolicy::default(),
        );
        sync.handle().flush().await.unwrap();
        sync.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn should_drop_writes_scheduled_after_shutdown() {
        let store = MemoryStore::default();
        let sync = PersistenceSync::start(
            store.clone(),
            Arc::new(DeviceRegistry::new()),
            Arc::new(AccessControl::new()),
            RetryPolicy::default(),
        );
        let handle = sync.handle();
        sync.shutdown().await.unwrap();

        handle.schedule(Category::Devices);
        assert_eq!(store.write_count(Category::Devices), 0);
        handle.flush().await.unwrap();
    }

    #[tokio::test]
    async fn should_not_hang_flush_when_sync_is_dropped() {
        let store = MemoryStore::default();
        let sync = PersistenceSync::start(
            store.clone(),
            Arc::new(DeviceRegistry::new()),
            Arc::new(AccessControl::new()),
            RetryPolicy::default(),
        );
        let handle = sync.handle();
        drop(sync);

        handle.schedule(Category::Devices);
        let outcome = tokio::time::timeout(Duration::from_secs(2), handle.flush()).await;
        assert!(matches!(outcome, Ok(Ok(()))));
        assert_eq!(store.write_count(Category::Devices), 0);
    }

    #[tokio::test]
    async fn should_report_stopped_when_pending_write_outlives_lanes() {
        let sync = PersistenceSync::start(
            MemoryStore::default(),
            Arc::new(DeviceRegistry::new()),
            Arc::new(AccessControl::new()),
            RetryPolicy::default(),
        );
        let handle = sync.handle();
        sync.shutdown().await.unwrap();

        // A request that raced past the stop flag.
        handle.lanes[&Category::Devices]
            .requested
            .fetch_add(1, Ordering::AcqRel);

        let outcome = tokio::time::timeout(Duration::from_secs(2), handle.flush())
            .await
            .unwrap();
        let Err(HubError::Storage(err)) = outcome else {
            panic!("expected a storage error, got {outcome:?}");
        };
        assert!(matches!(
            err.downcast_ref::<PersistenceError>(),
            Some(PersistenceError::Stopped)
        ));
    }
}
