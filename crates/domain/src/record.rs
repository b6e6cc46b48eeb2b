//! Persisted records: the subset of state that must survive a restart.
//!
//! Three tables exist: devices, profiles, and one status table per
//! [`DeviceKind`]. Observed state (`state`, `online`, `last_seen`) reflects
//! live hardware and is never persisted.

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceKind};
use crate::error::HubError;
use crate::profile::{Permission, Profile};

/// One row of the device table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&Device> for DeviceRecord {
    fn from(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            description: device.description.clone(),
            kind: device.kind.as_str().to_string(),
        }
    }
}

/// One permission entry nested in a [`ProfileRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDeviceRecord {
    pub name: String,
    pub read: bool,
    pub write: bool,
}

/// One row of the profile table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub devices: Vec<ProfileDeviceRecord>,
}

impl From<&Profile> for ProfileRecord {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            key: profile.api_key.clone(),
            admin: profile.admin,
            groups: profile.groups().map(str::to_string).collect(),
            devices: profile
                .devices()
                .map(|(name, perm)| ProfileDeviceRecord {
                    name: name.to_string(),
                    read: perm.read,
                    write: perm.write,
                })
                .collect(),
        }
    }
}

impl TryFrom<ProfileRecord> for Profile {
    type Error = HubError;

    fn try_from(record: ProfileRecord) -> Result<Self, Self::Error> {
        let mut builder = Profile::builder()
            .name(record.name)
            .api_key(record.key)
            .admin(record.admin);
        for group in record.groups {
            builder = builder.group(group);
        }
        for dev in record.devices {
            builder = builder.device(dev.name, Permission::new(dev.read, dev.write));
        }
        builder.build()
    }
}

/// One row of a per-kind status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub name: String,
    pub status: bool,
}

impl From<&Device> for StatusRecord {
    fn from(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            status: device.status(),
        }
    }
}

/// A durable table. Every write replaces the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Devices,
    Profiles,
    Statuses(DeviceKind),
}

impl Category {
    /// Every table, in load order.
    pub const ALL: [Self; 4] = [
        Self::Devices,
        Self::Profiles,
        Self::Statuses(DeviceKind::Relay),
        Self::Statuses(DeviceKind::Light),
    ];

    /// Table name (`devices`, `profiles`, `relays`, `lights`).
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Devices => "devices",
            Self::Profiles => "profiles",
            Self::Statuses(DeviceKind::Relay) => "relays",
            Self::Statuses(DeviceKind::Light) => "lights",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}
