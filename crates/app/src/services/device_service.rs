//! Use-cases over the device registry, gated by access control.

use std::sync::Arc;

use relayhub_domain::device::{Device, DeviceKind};
use relayhub_domain::error::{AuthorizationError, HubError, NotFoundError, ValidationError};
use relayhub_domain::id::DeviceId;
use relayhub_domain::record::Category;

use crate::access::AccessControl;
use crate::persistence::PersistenceHandle;
use crate::registry::DeviceRegistry;

/// Application service for device lookups and commands.
pub struct DeviceService {
    registry: Arc<DeviceRegistry>,
    access: Arc<AccessControl>,
    persistence: PersistenceHandle,
}

impl DeviceService {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        access: Arc<AccessControl>,
        persistence: PersistenceHandle,
    ) -> Self {
        Self {
            registry,
            access,
            persistence,
        }
    }

    /// Every device the caller may read, in id order.
    #[must_use]
    pub fn list(&self, api_key: &str) -> Vec<Device> {
        self.visible(api_key, self.registry.devices())
    }

    /// Every device of `kind` the caller may read, in id order.
    #[must_use]
    pub fn list_kind(&self, api_key: &str, kind: DeviceKind) -> Vec<Device> {
        self.visible(api_key, self.registry.devices_by_type(kind))
    }

    /// Register a new device. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] for non-admins, or
    /// [`HubError::Validation`] for an unknown type, empty or taken name.
    #[tracing::instrument(skip(self, api_key))]
    pub fn add(
        &self,
        api_key: &str,
        name: &str,
        description: &str,
        kind: &str,
    ) -> Result<Device, HubError> {
        if !self.access.is_admin(api_key) {
            return Err(AuthorizationError::AdminRequired.into());
        }
        let kind: DeviceKind = kind.parse()?;
        let device = self.registry.add_device(name, description, kind)?;
        tracing::info!(id = %device.id, device = %device.name, "device added");
        self.persistence.schedule(Category::Devices);
        self.persistence.schedule(Category::Statuses(kind));
        Ok(device)
    }

    /// Remove the device with numeric id `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] for a non-numeric id,
    /// [`HubError::NotFound`] or [`HubError::Unauthorized`] without write access.
    #[tracing::instrument(skip(self, api_key))]
    pub fn remove(&self, api_key: &str, id: &str) -> Result<Device, HubError> {
        let id: DeviceId = id
            .parse()
            .map_err(|_| ValidationError::InvalidIdentifier(id.to_string()))?;
        let device = self.registry.device_by_id(id)?;
        self.require_write(api_key, &device)?;
        let removed = self.registry.remove_by_id(id)?;
        tracing::info!(id = %removed.id, device = %removed.name, "device removed");
        self.persistence.schedule(Category::Devices);
        self.persistence.schedule(Category::Statuses(removed.kind));
        Ok(removed)
    }

    /// First device (lowest id) whose description is `description`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] or [`HubError::Unauthorized`].
    pub fn by_description(&self, api_key: &str, description: &str) -> Result<Device, HubError> {
        let device = self.registry.device_by_description(description)?;
        self.require_read(api_key, &device)?;
        Ok(device)
    }

    /// Resolve `identifier` as a device of `kind` the caller may read.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] or [`HubError::Unauthorized`].
    pub fn readable(&self, api_key: &str, kind: DeviceKind, identifier: &str) -> Result<Device, HubError> {
        let device = self.resolve(kind, identifier)?;
        self.require_read(api_key, &device)?;
        Ok(device)
    }

    /// Resolve `identifier` as a device of `kind` the caller may command.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] or [`HubError::Unauthorized`].
    pub fn writable(&self, api_key: &str, kind: DeviceKind, identifier: &str) -> Result<Device, HubError> {
        let device = self.resolve(kind, identifier)?;
        self.require_write(api_key, &device)?;
        Ok(device)
    }

    /// Set the commanded status.
    ///
    /// # Errors
    ///
    /// Same as [`writable`](Self::writable).
    #[tracing::instrument(skip(self, api_key))]
    pub fn set(
        &self,
        api_key: &str,
        kind: DeviceKind,
        identifier: &str,
        value: bool,
    ) -> Result<Device, HubError> {
        let device = self.writable(api_key, kind, identifier)?;
        let device = self.registry.set_status(&device.name, value)?;
        self.persistence.schedule(Category::Statuses(kind));
        Ok(device)
    }

    /// Invert the commanded status.
    ///
    /// # Errors
    ///
    /// Same as [`writable`](Self::writable).
    #[tracing::instrument(skip(self, api_key))]
    pub fn switch(&self, api_key: &str, kind: DeviceKind, identifier: &str) -> Result<Device, HubError> {
        let device = self.writable(api_key, kind, identifier)?;
        let device = self.registry.switch(&device.name)?;
        self.persistence.schedule(Category::Statuses(kind));
        Ok(device)
    }

    /// Record a hardware report. Observed state is not persisted.
    ///
    /// # Errors
    ///
    /// Same as [`writable`](Self::writable).
    #[tracing::instrument(skip(self, api_key))]
    pub fn update(
        &self,
        api_key: &str,
        kind: DeviceKind,
        identifier: &str,
        observed: bool,
    ) -> Result<Device, HubError> {
        let device = self.writable(api_key, kind, identifier)?;
        self.registry
            .update(&device.name, observed, chrono::Utc::now())
    }

    // A device of another kind is invisible through this kind's endpoints.
    fn resolve(&self, kind: DeviceKind, identifier: &str) -> Result<Device, HubError> {
        self.registry
            .resolve(identifier)
            .ok()
            .filter(|device| device.kind == kind)
            .ok_or_else(|| {
                NotFoundError {
                    entity: kind.as_str(),
                    id: identifier.to_string(),
                }
                .into()
            })
    }

    fn visible(&self, api_key: &str, devices: Vec<Device>) -> Vec<Device> {
        devices
            .into_iter()
            .filter(|device| self.access.validate(api_key, &device.name).read)
            .collect()
    }

    fn require_read(&self, api_key: &str, device: &Device) -> Result<(), HubError> {
        if self.access.validate(api_key, &device.name).read {
            Ok(())
        } else {
            Err(AuthorizationError::Read(device.name.clone()).into())
        }
    }

    fn require_write(&self, api_key: &str, device: &Device) -> Result<(), HubError> {
        if self.access.validate(api_key, &device.name).write {
            Ok(())
        } else {
            Err(AuthorizationError::Write(device.name.clone()).into())
        }
    }
}
