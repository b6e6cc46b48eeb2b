//! Profile — an API-key actor with groups and per-device permissions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{HubError, ValidationError};

/// Read/write rights on a single device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub read: bool,
    pub write: bool,
}

impl Permission {
    /// No access at all. What an absent entry means.
    pub const DENY: Self = Self {
        read: false,
        write: false,
    };

    /// Full access. What an admin always gets.
    pub const FULL: Self = Self {
        read: true,
        write: true,
    };

    #[must_use]
    pub const fn new(read: bool, write: bool) -> Self {
        Self { read, write }
    }
}

/// An authenticated actor.
///
/// `name` is the display key used by administrative operations, `api_key`
/// is the secret the actor presents on every request. They are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub api_key: String,
    pub admin: bool,
    groups: BTreeSet<String>,
    devices: BTreeMap<String, Permission>,
}

impl Profile {
    /// Create a builder for constructing a [`Profile`].
    #[must_use]
    pub fn builder() -> ProfileBuilder {
        ProfileBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when `name` or `api_key` is empty.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.api_key.is_empty() {
            return Err(ValidationError::EmptyApiKey.into());
        }
        Ok(())
    }

    /// Grant (or replace) the permission on `device`.
    pub fn add_device(&mut self, device: impl Into<String>, permission: Permission) {
        self.devices.insert(device.into(), permission);
    }

    /// Drop the entry for `device`. Returns whether one existed.
    pub fn remove_device(&mut self, device: &str) -> bool {
        self.devices.remove(device).is_some()
    }

    /// Explicit entry for `device`, if any.
    #[must_use]
    pub fn device(&self, device: &str) -> Option<Permission> {
        self.devices.get(device).copied()
    }

    /// All explicit entries, ordered by device name.
    pub fn devices(&self) -> impl Iterator<Item = (&str, Permission)> {
        self.devices.iter().map(|(name, perm)| (name.as_str(), *perm))
    }

    /// Join `group`. Returns `false` if already a member.
    pub fn add_group(&mut self, group: impl Into<String>) -> bool {
        self.groups.insert(group.into())
    }

    /// Leave `group`. Returns whether the profile was a member.
    pub fn remove_group(&mut self, group: &str) -> bool {
        self.groups.remove(group)
    }

    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Group memberships, in lexical order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    /// Effective permission on `device`: admin override, then the explicit
    /// entry, then default-deny.
    #[must_use]
    pub fn permission(&self, device: &str) -> Permission {
        if self.admin {
            return Permission::FULL;
        }
        self.device(device).unwrap_or(Permission::DENY)
    }
}

/// Step-by-step builder for [`Profile`].
#[derive(Debug, Default)]
pub struct ProfileBuilder {
    name: Option<String>,
    api_key: Option<String>,
    admin: bool,
    groups: BTreeSet<String>,
    devices: BTreeMap<String, Permission>,
}

impl ProfileBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    #[must_use]
    pub fn device(mut self, device: impl Into<String>, permission: Permission) -> Self {
        self.devices.insert(device.into(), permission);
        self
    }

    /// Consume the builder, validate, and return a [`Profile`].
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if `name` or `api_key` is missing or empty.
    pub fn build(self) -> Result<Profile, HubError> {
        let profile = Profile {
            name: self.name.unwrap_or_default(),
            api_key: self.api_key.unwrap_or_default(),
            admin: self.admin,
            groups: self.groups,
            devices: self.devices,
        };
        profile.validate()?;
        Ok(profile)
    }
}
