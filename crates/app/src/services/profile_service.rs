//! Administrative use-cases over profiles.
//!
//! Everything but [`ProfileService::groups`] requires an admin key. Every
//! successful mutation schedules a rewrite of the profile table.

use std::sync::Arc;

use relayhub_domain::error::{AuthorizationError, HubError};
use relayhub_domain::profile::{Permission, Profile};
use relayhub_domain::record::Category;

use crate::access::AccessControl;
use crate::persistence::PersistenceHandle;

/// Application service for profile management.
pub struct ProfileService {
    access: Arc<AccessControl>,
    persistence: PersistenceHandle,
}

impl ProfileService {
    pub fn new(access: Arc<AccessControl>, persistence: PersistenceHandle) -> Self {
        Self {
            access,
            persistence,
        }
    }

    /// Group memberships of the caller.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] for an unknown key.
    pub fn groups(&self, api_key: &str) -> Result<Vec<String>, HubError> {
        self.access.groups(api_key)
    }

    /// Every profile, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] for non-admins.
    pub fn list(&self, api_key: &str) -> Result<Vec<Profile>, HubError> {
        self.require_admin(api_key)?;
        Ok(self.access.profiles())
    }

    /// Create a profile, or replace the one holding `key`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] for non-admins, or
    /// [`HubError::Validation`] for an empty name or key or a name owned by
    /// another key.
    #[tracing::instrument(skip(self, api_key, key))]
    pub fn add(&self, api_key: &str, name: &str, key: &str, admin: bool) -> Result<(), HubError> {
        self.require_admin(api_key)?;
        let profile = Profile::builder()
            .name(name)
            .api_key(key)
            .admin(admin)
            .build()?;
        self.access.add_profile(profile)?;
        tracing::info!(profile = %name, admin, "profile saved");
        self.persistence.schedule(Category::Profiles);
        Ok(())
    }

    /// Delete the profile called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] or [`HubError::NotFound`].
    #[tracing::instrument(skip(self, api_key))]
    pub fn remove(&self, api_key: &str, name: &str) -> Result<(), HubError> {
        self.require_admin(api_key)?;
        self.access.delete_profile(name)?;
        tracing::info!(profile = %name, "profile deleted");
        self.persistence.schedule(Category::Profiles);
        Ok(())
    }

    /// Grant `permission` on `device` to the profile `name`.
    ///
    /// The device does not have to exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] or [`HubError::NotFound`].
    #[tracing::instrument(skip(self, api_key))]
    pub fn add_device(
        &self,
        api_key: &str,
        name: &str,
        device: &str,
        permission: Permission,
    ) -> Result<(), HubError> {
        self.require_admin(api_key)?;
        self.access.grant(name, device, permission)?;
        self.persistence.schedule(Category::Profiles);
        Ok(())
    }

    /// Drop the entry for `device` from the profile `name`. Dropping a
    /// missing entry succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] or [`HubError::NotFound`].
    #[tracing::instrument(skip(self, api_key))]
    pub fn remove_device(&self, api_key: &str, name: &str, device: &str) -> Result<(), HubError> {
        self.require_admin(api_key)?;
        if self.access.revoke(name, device)? {
            self.persistence.schedule(Category::Profiles);
        }
        Ok(())
    }

    /// Add the profile `name` to `group`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] or [`HubError::NotFound`].
    #[tracing::instrument(skip(self, api_key))]
    pub fn add_group(&self, api_key: &str, name: &str, group: &str) -> Result<(), HubError> {
        self.require_admin(api_key)?;
        if self.access.join_group(name, group)? {
            self.persistence.schedule(Category::Profiles);
        }
        Ok(())
    }

    /// Remove the profile `name` from `group`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] or [`HubError::NotFound`].
    #[tracing::instrument(skip(self, api_key))]
    pub fn remove_group(&self, api_key: &str, name: &str, group: &str) -> Result<(), HubError> {
        self.require_admin(api_key)?;
        if self.access.leave_group(name, group)? {
            self.persistence.schedule(Category::Profiles);
        }
        Ok(())
    }

    fn require_admin(&self, api_key: &str) -> Result<(), HubError> {
        if self.access.is_admin(api_key) {
            Ok(())
        } else {
            Err(AuthorizationError::AdminRequired.into())
        }
    }
}
