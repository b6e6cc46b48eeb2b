//! Device registry — the authoritative set of live devices.
//!
//! Devices are indexed by id (ordered) and by name. Ids come from a
//! counter that only ever moves forward, so an id is never handed out twice,
//! whatever happens to the collection size.
//!
//! All access goes through one [`RwLock`]; callers only ever see cloned
//! snapshots, never references into the map.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use relayhub_domain::device::{Device, DeviceKind, Timestamp};
use relayhub_domain::error::{HubError, NotFoundError, ValidationError};
use relayhub_domain::id::DeviceId;

struct Inner {
    next_id: DeviceId,
    devices: BTreeMap<DeviceId, Device>,
    names: HashMap<String, DeviceId>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            next_id: DeviceId::new(1),
            devices: BTreeMap::new(),
            names: HashMap::new(),
        }
    }
}

/// Thread-safe registry of [`Device`]s.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: RwLock<Inner>,
}

fn not_found(id: impl ToString) -> HubError {
    NotFoundError {
        entity: "Device",
        id: id.to_string(),
    }
    .into()
}

impl DeviceRegistry {
    /// Create an empty registry. The first id handed out is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new device of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when `name` is empty or already taken.
    pub fn add_device(
        &self,
        name: &str,
        description: &str,
        kind: DeviceKind,
    ) -> Result<Device, HubError> {
        let device = Device::builder()
            .name(name)
            .description(description)
            .kind(kind)
            .build()?;
        self.insert(device)
    }

    /// Register a pre-built device, overriding its id with a fresh one.
    ///
    /// Used when restoring from storage, where the commanded status is
    /// seeded before the device goes live.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the name is empty or already taken.
    pub fn insert(&self, mut device: Device) -> Result<Device, HubError> {
        device.validate()?;
        let mut inner = self.write();
        if inner.names.contains_key(&device.name) {
            return Err(ValidationError::DuplicateName {
                entity: "device",
                name: device.name,
            }
            .into());
        }
        let id = inner.next_id;
        inner.next_id = id.next();
        device.id = id;
        inner.names.insert(device.name.clone(), id);
        inner.devices.insert(id, device.clone());
        Ok(device)
    }

    /// Look up a device by its unique name.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no device has that name.
    pub fn device(&self, name: &str) -> Result<Device, HubError> {
        let inner = self.read();
        inner
            .names
            .get(name)
            .and_then(|id| inner.devices.get(id))
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    /// Look up a device by id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the id was never issued or the
    /// device has been removed.
    pub fn device_by_id(&self, id: DeviceId) -> Result<Device, HubError> {
        self.read()
            .devices
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Look up a device by description.
    ///
    /// Descriptions are not unique; when several devices match, the one with
    /// the lowest id wins.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when nothing matches.
    pub fn device_by_description(&self, description: &str) -> Result<Device, HubError> {
        self.read()
            .devices
            .values()
            .find(|d| d.description == description)
            .cloned()
            .ok_or_else(|| not_found(description))
    }

    /// Resolve a caller-supplied identifier: a device name first, then a
    /// numeric id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when neither interpretation matches.
    pub fn resolve(&self, identifier: &str) -> Result<Device, HubError> {
        if let Ok(device) = self.device(identifier) {
            return Ok(device);
        }
        identifier
            .parse::<DeviceId>()
            .ok()
            .and_then(|id| self.device_by_id(id).ok())
            .ok_or_else(|| not_found(identifier))
    }

    /// Every device of `kind`, in id order.
    #[must_use]
    pub fn devices_by_type(&self, kind: DeviceKind) -> Vec<Device> {
        self.read()
            .devices
            .values()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect()
    }

    /// Snapshot of every device, in id order.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.read().devices.values().cloned().collect()
    }

    /// Remove a device. Its id is retired for good.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no live device has that id.
    pub fn remove_by_id(&self, id: DeviceId) -> Result<Device, HubError> {
        let mut inner = self.write();
        let device = inner.devices.remove(&id).ok_or_else(|| not_found(id))?;
        inner.names.remove(&device.name);
        Ok(device)
    }

    /// Set the commanded status of a device and return the new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no device has that name.
    pub fn set_status(&self, name: &str, value: bool) -> Result<Device, HubError> {
        self.mutate(name, |device| device.set_status(value))
    }

    /// Invert the commanded status of a device and return the new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no device has that name.
    pub fn switch(&self, name: &str) -> Result<Device, HubError> {
        self.mutate(name, |device| {
            device.switch();
        })
    }

    /// Record a hardware report for a device and return the new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no device has that name.
    pub fn update(&self, name: &str, observed: bool, at: Timestamp) -> Result<Device, HubError> {
        self.mutate(name, |device| device.update(observed, at))
    }

    /// Number of live devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn mutate(&self, name: &str, f: impl FnOnce(&mut Device)) -> Result<Device, HubError> {
        let mut inner = self.write();
        let id = *inner.names.get(name).ok_or_else(|| not_found(name))?;
        let device = inner.devices.get_mut(&id).ok_or_else(|| not_found(name))?;
        f(device);
        Ok(device.clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
