//! Operation boundary — what the transport calls.
//!
//! Every operation takes the caller's API key plus raw string parameters and
//! returns an [`OperationResult`]. Domain errors never escape: they are
//! folded into `result: false` and a human-readable `error`.

use std::sync::Arc;

use serde::Serialize;

use relayhub_domain::device::{Device, DeviceKind};
use relayhub_domain::error::{HubError, ValidationError};
use relayhub_domain::id::DeviceId;
use relayhub_domain::profile::Permission;
use relayhub_domain::record::ProfileRecord;

use crate::access::AccessControl;
use crate::persistence::PersistenceHandle;
use crate::registry::DeviceRegistry;
use crate::services::device_service::DeviceService;
use crate::services::profile_service::ProfileService;

/// Uniform result record: `{ operation, result, error, ...payload }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult<T> {
    pub operation: &'static str,
    pub result: bool,
    pub error: String,
    #[serde(flatten)]
    pub payload: Option<T>,
}

impl<T> OperationResult<T> {
    fn success(operation: &'static str, payload: Option<T>) -> Self {
        tracing::debug!(operation, "operation succeeded");
        Self {
            operation,
            result: true,
            error: String::new(),
            payload,
        }
    }

    fn failure(operation: &'static str, err: &HubError) -> Self {
        tracing::warn!(operation, error = %err, "operation failed");
        Self {
            operation,
            result: false,
            error: err.to_string(),
            payload: None,
        }
    }

    fn from_result(operation: &'static str, result: Result<T, HubError>) -> Self {
        match result {
            Ok(payload) => Self::success(operation, Some(payload)),
            Err(err) => Self::failure(operation, &err),
        }
    }

    #[must_use]
    fn with_payload(mut self, payload: T) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl OperationResult<()> {
    fn done(operation: &'static str, result: Result<(), HubError>) -> Self {
        match result {
            Ok(()) => Self::success(operation, None),
            Err(err) => Self::failure(operation, &err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupList {
    pub groups: Vec<String>,
}

/// Identity and liveness of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub online: bool,
}

impl From<&Device> for DeviceSummary {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id,
            name: device.name.clone(),
            description: device.description.clone(),
            kind: device.kind,
            online: device.online(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceList {
    pub devices: Vec<DeviceSummary>,
}

/// Commanded and observed value of one relay or light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwitchStatus {
    pub status: bool,
    pub state: bool,
}

impl From<&Device> for SwitchStatus {
    fn from(device: &Device) -> Self {
        Self {
            status: device.status(),
            state: device.state(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchSummary {
    pub name: String,
    pub description: String,
    pub online: bool,
    pub status: bool,
    pub state: bool,
}

impl From<&Device> for SwitchSummary {
    fn from(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            description: device.description.clone(),
            online: device.online(),
            status: device.status(),
            state: device.state(),
        }
    }
}

/// Listing of one kind, keyed `relays` or `lights`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchList {
    Relays(Vec<SwitchSummary>),
    Lights(Vec<SwitchSummary>),
}

impl SwitchList {
    fn new(kind: DeviceKind, devices: &[Device]) -> Self {
        let rows = devices.iter().map(SwitchSummary::from).collect();
        match kind {
            DeviceKind::Relay => Self::Relays(rows),
            DeviceKind::Light => Self::Lights(rows),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileList {
    pub profiles: Vec<ProfileRecord>,
}

/// Parse a boolean the way URL parameters spell them.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidBool`] for anything outside
/// `1 t T true TRUE True` / `0 f F false FALSE False`.
pub fn parse_bool(field: &'static str, value: &str) -> Result<bool, ValidationError> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ValidationError::InvalidBool {
            field,
            value: value.to_string(),
        }),
    }
}

/// Facade over the device and profile services.
pub struct Operations {
    devices: DeviceService,
    profiles: ProfileService,
}

impl Operations {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        access: Arc<AccessControl>,
        persistence: PersistenceHandle,
    ) -> Self {
        Self {
            devices: DeviceService::new(registry, Arc::clone(&access), persistence.clone()),
            profiles: ProfileService::new(access, persistence),
        }
    }

    pub fn groups(&self, api_key: &str) -> OperationResult<GroupList> {
        OperationResult::from_result(
            "groups",
            self.profiles.groups(api_key).map(|groups| GroupList { groups }),
        )
    }

    pub fn device_list(&self, api_key: &str) -> OperationResult<DeviceList> {
        let devices = self.devices.list(api_key);
        OperationResult::success(
            "device_list",
            Some(DeviceList {
                devices: devices.iter().map(DeviceSummary::from).collect(),
            }),
        )
    }

    pub fn device_add(
        &self,
        api_key: &str,
        name: &str,
        description: &str,
        kind: &str,
    ) -> OperationResult<DeviceSummary> {
        OperationResult::from_result(
            "device_add",
            self.devices
                .add(api_key, name, description, kind)
                .map(|d| DeviceSummary::from(&d)),
        )
    }

    pub fn device_remove(&self, api_key: &str, id: &str) -> OperationResult<DeviceSummary> {
        OperationResult::from_result(
            "device_remove",
            self.devices
                .remove(api_key, id)
                .map(|d| DeviceSummary::from(&d)),
        )
    }

    pub fn device_by_description(
        &self,
        api_key: &str,
        description: &str,
    ) -> OperationResult<DeviceSummary> {
        OperationResult::from_result(
            "device_by_description",
            self.devices
                .by_description(api_key, description)
                .map(|d| DeviceSummary::from(&d)),
        )
    }

    pub fn profile_list(&self, api_key: &str) -> OperationResult<ProfileList> {
        OperationResult::from_result(
            "profile_list",
            self.profiles.list(api_key).map(|profiles| ProfileList {
                profiles: profiles.iter().map(ProfileRecord::from).collect(),
            }),
        )
    }

    pub fn profile_add(&self, api_key: &str, name: &str, key: &str, admin: &str) -> OperationResult<()> {
        const OP: &str = "profile_add";
        let admin = match parse_bool("admin", admin) {
            Ok(admin) => admin,
            Err(err) => return OperationResult::failure(OP, &err.into()),
        };
        OperationResult::done(OP, self.profiles.add(api_key, name, key, admin))
    }

    pub fn profile_remove(&self, api_key: &str, name: &str) -> OperationResult<()> {
        OperationResult::done("profile_remove", self.profiles.remove(api_key, name))
    }

    pub fn profile_add_device(
        &self,
        api_key: &str,
        name: &str,
        device: &str,
        read: &str,
        write: &str,
    ) -> OperationResult<()> {
        const OP: &str = "profile_add_device";
        let permission = parse_bool("read", read).and_then(|read| {
            parse_bool("write", write).map(|write| Permission::new(read, write))
        });
        match permission {
            Ok(permission) => OperationResult::done(
                OP,
                self.profiles.add_device(api_key, name, device, permission),
            ),
            Err(err) => OperationResult::failure(OP, &err.into()),
        }
    }

    pub fn profile_remove_device(&self, api_key: &str, name: &str, device: &str) -> OperationResult<()> {
        OperationResult::done(
            "profile_remove_device",
            self.profiles.remove_device(api_key, name, device),
        )
    }

    pub fn profile_add_group(&self, api_key: &str, name: &str, group: &str) -> OperationResult<()> {
        OperationResult::done(
            "profile_add_group",
            self.profiles.add_group(api_key, name, group),
        )
    }

    pub fn profile_remove_group(&self, api_key: &str, name: &str, group: &str) -> OperationResult<()> {
        OperationResult::done(
            "profile_remove_group",
            self.profiles.remove_group(api_key, name, group),
        )
    }

    pub fn status(&self, api_key: &str, kind: DeviceKind, id: &str) -> OperationResult<SwitchStatus> {
        OperationResult::from_result(
            "status",
            self.devices
                .readable(api_key, kind, id)
                .map(|d| SwitchStatus::from(&d)),
        )
    }

    pub fn set(
        &self,
        api_key: &str,
        kind: DeviceKind,
        id: &str,
        status: &str,
    ) -> OperationResult<SwitchStatus> {
        const OP: &str = "set";
        let value = match self.command_value(OP, api_key, kind, id, "status", status) {
            Ok(value) => value,
            Err(rejected) => return rejected,
        };
        OperationResult::from_result(
            OP,
            self.devices
                .set(api_key, kind, id, value)
                .map(|d| SwitchStatus::from(&d)),
        )
    }

    pub fn switch(&self, api_key: &str, kind: DeviceKind, id: &str) -> OperationResult<SwitchStatus> {
        OperationResult::from_result(
            "switch",
            self.devices
                .switch(api_key, kind, id)
                .map(|d| SwitchStatus::from(&d)),
        )
    }

    pub fn update(
        &self,
        api_key: &str,
        kind: DeviceKind,
        id: &str,
        state: &str,
    ) -> OperationResult<SwitchStatus> {
        const OP: &str = "update";
        let observed = match self.command_value(OP, api_key, kind, id, "state", state) {
            Ok(value) => value,
            Err(rejected) => return rejected,
        };
        OperationResult::from_result(
            OP,
            self.devices
                .update(api_key, kind, id, observed)
                .map(|d| SwitchStatus::from(&d)),
        )
    }

    pub fn switch_list(&self, api_key: &str, kind: DeviceKind) -> OperationResult<SwitchList> {
        let devices = self.devices.list_kind(api_key, kind);
        OperationResult::success("switch_list", Some(SwitchList::new(kind, &devices)))
    }

    // Resolve and authorize first, then parse: a malformed value still
    // reports the device's current status and state.
    fn command_value(
        &self,
        operation: &'static str,
        api_key: &str,
        kind: DeviceKind,
        id: &str,
        field: &'static str,
        raw: &str,
    ) -> Result<bool, OperationResult<SwitchStatus>> {
        let device = self
            .devices
            .writable(api_key, kind, id)
            .map_err(|err| OperationResult::failure(operation, &err))?;
        parse_bool(field, raw).map_err(|err| {
            OperationResult::failure(operation, &err.into()).with_payload(SwitchStatus::from(&device))
        })
    }
}
