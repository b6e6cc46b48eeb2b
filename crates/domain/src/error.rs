//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`HubError`]
//! via `#[from]`. Adapters box their IO errors into [`HubError::Storage`].

/// Top-level error for every relayhub operation.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("{0}")]
    Unauthorized(#[from] AuthorizationError),

    #[error("storage error: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant or a caller-supplied parameter was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("api key must not be empty")]
    EmptyApiKey,

    #[error("unknown device type {0:?}")]
    UnknownDeviceKind(String),

    #[error("{entity} {name:?} already exists")]
    DuplicateName { entity: &'static str, name: String },

    #[error("fail to convert {field}: {value:?} is not a boolean")]
    InvalidBool { field: &'static str, value: String },

    #[error("invalid device identifier {0:?}")]
    InvalidIdentifier(String),
}

/// A lookup found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// The caller is not allowed to perform the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    #[error("authorization failed: no read access to {0:?}")]
    Read(String),

    #[error("authorization failed: no write access to {0:?}")]
    Write(String),

    #[error("authorization failed: admin rights required")]
    AdminRequired,
}

impl HubError {
    /// Box an adapter error into [`HubError::Storage`].
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }
}
