//! # relayhub-adapter-storage-json
//!
//! Flat-file persistence adapter: one pretty-printed JSON file per table.
//!
//! ## Responsibilities
//! - Implement the `StateStore` port defined in `relayhub-app::ports`
//! - Map each table to `<data_dir>/<table>.json`, rows wrapped in a named
//!   array (`{"relays": [...]}`)
//! - Replace files atomically (temp sibling, then rename)
//!
//! ## Dependency rule
//! Depends on `relayhub-app` (for the port trait) and `relayhub-domain` (for
//! record types). The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::{Config, JsonFileStore};
