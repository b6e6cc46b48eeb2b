//! # relayhub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the controller's URL scheme: every call is a `GET` under
//!   `/user/{key}/...`, where `{key}` is the caller's API key
//! - Map path segments onto `relayhub-app` operations (driving adapter)
//! - Return each operation's result record as JSON, always with `200 OK`;
//!   success or failure is carried in the body's `result` field
//!
//! ## Dependency rule
//! Depends on `relayhub-app` (for operations) and `relayhub-domain` (for
//! device kinds). Never leaks axum types into the domain.

pub mod api;
pub mod router;
pub mod state;
