//! Storage port — whole-table persistence of the durable records.
//!
//! The store is deliberately coarse: every `save_*` call replaces the entire
//! table. There is no incremental patching and no journal.

use std::future::Future;

use relayhub_domain::device::DeviceKind;
use relayhub_domain::error::HubError;
use relayhub_domain::record::{DeviceRecord, ProfileRecord, StatusRecord};

/// Durable storage for devices, profiles and per-kind status tables.
pub trait StateStore {
    /// Read the device table. A table that was never written reads as empty.
    fn load_devices(&self) -> impl Future<Output = Result<Vec<DeviceRecord>, HubError>> + Send;

    /// Read the profile table.
    fn load_profiles(&self) -> impl Future<Output = Result<Vec<ProfileRecord>, HubError>> + Send;

    /// Read the status table for `kind`.
    fn load_statuses(
        &self,
        kind: DeviceKind,
    ) -> impl Future<Output = Result<Vec<StatusRecord>, HubError>> + Send;

    /// Replace the device table.
    fn save_devices(
        &self,
        records: Vec<DeviceRecord>,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Replace the profile table.
    fn save_profiles(
        &self,
        records: Vec<ProfileRecord>,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Replace the status table for `kind`.
    fn save_statuses(
        &self,
        kind: DeviceKind,
        records: Vec<StatusRecord>,
    ) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: StateStore + Send + Sync> StateStore for std::sync::Arc<T> {
    fn load_devices(&self) -> impl Future<Output = Result<Vec<DeviceRecord>, HubError>> + Send {
        (**self).load_devices()
    }

    fn load_profiles(&self) -> impl Future<Output = Result<Vec<ProfileRecord>, HubError>> + Send {
        (**self).load_profiles()
    }

    fn load_statuses(
        &self,
        kind: DeviceKind,
    ) -> impl Future<Output = Result<Vec<StatusRecord>, HubError>> + Send {
        (**self).load_statuses(kind)
    }

    fn save_devices(
        &self,
        records: Vec<DeviceRecord>,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).save_devices(records)
    }

    fn save_profiles(
        &self,
        records: Vec<ProfileRecord>,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).save_profiles(records)
    }

    fn save_statuses(
        &self,
        kind: DeviceKind,
        records: Vec<StatusRecord>,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).save_statuses(kind, records)
    }
}
