//! # relayhub-app
//!
//! Application layer — in-memory state, use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Own the authoritative in-memory state:
//!   - [`registry::DeviceRegistry`] — devices by id and name, monotonic ids
//!   - [`access::AccessControl`] — profiles by API key, permission checks
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `StateStore` — whole-table reads and writes of the persisted records
//! - Keep durable storage in sync ([`persistence`]): load on boot,
//!   per-table write-through lanes at runtime
//! - Expose **use-cases** ([`services`]) and the **operation boundary**
//!   ([`operations`]) that turns their errors into result records
//!
//! ## Dependency rule
//! Depends on `relayhub-domain` only (plus `tokio` for tasks and sync).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod access;
pub mod operations;
pub mod persistence;
pub mod ports;
pub mod registry;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
