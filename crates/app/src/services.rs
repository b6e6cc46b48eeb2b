//! Application services — use-case implementations.
//!
//! Services share the registry and access control through `Arc`s and hold a
//! [`PersistenceHandle`](crate::persistence::PersistenceHandle) to schedule
//! write-through after each successful mutation.

pub mod device_service;
pub mod profile_service;
