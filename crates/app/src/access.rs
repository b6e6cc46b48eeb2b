//! Access control — profiles keyed by API key, plus the permission policy.
//!
//! Profiles are stored by API key (what callers present) with a secondary
//! `name → api_key` index for the administrative operations, which address
//! profiles by name. Both maps live under one lock and are updated together.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use relayhub_domain::error::{HubError, NotFoundError, ValidationError};
use relayhub_domain::profile::{Permission, Profile};

#[derive(Default)]
struct Profiles {
    by_key: HashMap<String, Profile>,
    key_by_name: HashMap<String, String>,
}

/// Thread-safe container of [`Profile`]s and the permission policy.
#[derive(Default)]
pub struct AccessControl {
    inner: RwLock<Profiles>,
}

fn profile_not_found(name: &str) -> HubError {
    NotFoundError {
        entity: "Profile",
        id: name.to_string(),
    }
    .into()
}

impl AccessControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a profile, replacing any profile with the same API key.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if the profile is invalid or if its
    /// name is already used by a profile with a different key.
    pub fn add_profile(&self, profile: Profile) -> Result<(), HubError> {
        profile.validate()?;
        let mut inner = self.write();

        if let Some(owner) = inner.key_by_name.get(&profile.name) {
            if *owner != profile.api_key {
                return Err(ValidationError::DuplicateName {
                    entity: "profile",
                    name: profile.name,
                }
                .into());
            }
        }

        if let Some(previous) = inner.by_key.get(&profile.api_key) {
            let previous_name = previous.name.clone();
            inner.key_by_name.remove(&previous_name);
        }
        inner
            .key_by_name
            .insert(profile.name.clone(), profile.api_key.clone());
        inner.by_key.insert(profile.api_key.clone(), profile);
        Ok(())
    }

    /// Remove the profile called `name` and return it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no profile has that name.
    pub fn delete_profile(&self, name: &str) -> Result<Profile, HubError> {
        let mut inner = self.write();
        let key = inner
            .key_by_name
            .remove(name)
            .ok_or_else(|| profile_not_found(name))?;
        inner
            .by_key
            .remove(&key)
            .ok_or_else(|| profile_not_found(name))
    }

    /// Effective permission of the holder of `api_key` on `device`.
    ///
    /// 1. unknown key → no access;
    /// 2. admin → full access, whether or not the device exists;
    /// 3. otherwise the profile's entry for the device, or no access.
    #[must_use]
    pub fn validate(&self, api_key: &str, device: &str) -> Permission {
        self.read()
            .by_key
            .get(api_key)
            .map_or(Permission::DENY, |profile| profile.permission(device))
    }

    /// Whether `api_key` belongs to an admin profile.
    #[must_use]
    pub fn is_admin(&self, api_key: &str) -> bool {
        self.read()
            .by_key
            .get(api_key)
            .is_some_and(|profile| profile.admin)
    }

    /// Group memberships of the holder of `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] for an unknown key.
    pub fn groups(&self, api_key: &str) -> Result<Vec<String>, HubError> {
        self.read()
            .by_key
            .get(api_key)
            .map(|profile| profile.groups().map(str::to_string).collect())
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Profile",
                    id: "<api key>".to_string(),
                }
                .into()
            })
    }

    /// Profile called `name`, if any.
    #[must_use]
    pub fn profile(&self, name: &str) -> Option<Profile> {
        let inner = self.read();
        inner
            .key_by_name
            .get(name)
            .and_then(|key| inner.by_key.get(key))
            .cloned()
    }

    /// Snapshot of every profile, ordered by name.
    #[must_use]
    pub fn profiles(&self) -> Vec<Profile> {
        let mut profiles: Vec<Profile> = self.read().by_key.values().cloned().collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        profiles
    }

    /// Grant (or replace) `permission` on `device` for the profile `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no profile has that name.
    pub fn grant(&self, name: &str, device: &str, permission: Permission) -> Result<(), HubError> {
        self.with_profile_mut(name, |profile| profile.add_device(device, permission))
    }

    /// Drop the entry for `device` from the profile `name`. Returns whether
    /// an entry existed.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no profile has that name.
    pub fn revoke(&self, name: &str, device: &str) -> Result<bool, HubError> {
        self.with_profile_mut(name, |profile| profile.remove_device(device))
    }

    /// Add the profile `name` to `group`. Returns `false` if already a member.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no profile has that name.
    pub fn join_group(&self, name: &str, group: &str) -> Result<bool, HubError> {
        self.with_profile_mut(name, |profile| profile.add_group(group))
    }

    /// Remove the profile `name` from `group`. Returns whether it was a member.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no profile has that name.
    pub fn leave_group(&self, name: &str, group: &str) -> Result<bool, HubError> {
        self.with_profile_mut(name, |profile| profile.remove_group(group))
    }

    /// Number of profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().by_key.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Name and key are never exposed mutably, so the indexes stay in sync.
    fn with_profile_mut<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Profile) -> R,
    ) -> Result<R, HubError> {
        let mut inner = self.write();
        let key = inner
            .key_by_name
            .get(name)
            .cloned()
            .ok_or_else(|| profile_not_found(name))?;
        let profile = inner
            .by_key
            .get_mut(&key)
            .ok_or_else(|| profile_not_found(name))?;
        Ok(f(profile))
    }

    fn read(&self) -> RwLockReadGuard<'_, Profiles> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Profiles> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
