//! Relay and light handlers. The device kind comes from the route, as an
//! [`Extension`].

use axum::extract::{Path, State};
use axum::{Extension, Json};

use relayhub_app::operations::{OperationResult, SwitchList, SwitchStatus};
use relayhub_domain::device::DeviceKind;

use crate::state::AppState;

/// `GET /user/{user}/{kind}`
pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<DeviceKind>,
    Path(user): Path<String>,
) -> Json<OperationResult<SwitchList>> {
    Json(state.operations.switch_list(&user, kind))
}

/// `GET /user/{user}/{kind}/{id}`
pub async fn status(
    State(state): State<AppState>,
    Extension(kind): Extension<DeviceKind>,
    Path((user, id)): Path<(String, String)>,
) -> Json<OperationResult<SwitchStatus>> {
    Json(state.operations.status(&user, kind, &id))
}

/// `GET /user/{user}/{kind}/{id}/switch`
pub async fn switch(
    State(state): State<AppState>,
    Extension(kind): Extension<DeviceKind>,
    Path((user, id)): Path<(String, String)>,
) -> Json<OperationResult<SwitchStatus>> {
    Json(state.operations.switch(&user, kind, &id))
}

/// `GET /user/{user}/{kind}/{id}/set/{status}`
pub async fn set(
    State(state): State<AppState>,
    Extension(kind): Extension<DeviceKind>,
    Path((user, id, status)): Path<(String, String, String)>,
) -> Json<OperationResult<SwitchStatus>> {
    Json(state.operations.set(&user, kind, &id, &status))
}

/// `GET /user/{user}/{kind}/{id}/update/state/{state}`
pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<DeviceKind>,
    Path((user, id, observed)): Path<(String, String, String)>,
) -> Json<OperationResult<SwitchStatus>> {
    Json(state.operations.update(&user, kind, &id, &observed))
}
