//! # relayhub-domain
//!
//! Pure domain model for the relayhub device controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions
//! - Define **Devices** (relays and lights with commanded and observed state)
//! - Define **Profiles** (API-key actors with groups and per-device permissions)
//! - Define the **persisted records** that survive a restart
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod device;
pub mod profile;
pub mod record;
