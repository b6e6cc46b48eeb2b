//! Device handlers.

use axum::Json;
use axum::extract::{Path, State};

use relayhub_app::operations::{DeviceList, DeviceSummary, OperationResult};

use crate::state::AppState;

/// `GET /user/{user}/device`
pub async fn list(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Json<OperationResult<DeviceList>> {
    Json(state.operations.device_list(&user))
}

/// `GET /user/{user}/device/add/name/{name}/desc/{desc}/type/{type}`
pub async fn add(
    State(state): State<AppState>,
    Path((user, name, description, kind)): Path<(String, String, String, String)>,
) -> Json<OperationResult<DeviceSummary>> {
    Json(
        state
            .operations
            .device_add(&user, &name, &description, &kind),
    )
}

/// `GET /user/{user}/device/del/id/{id}`
pub async fn remove(
    State(state): State<AppState>,
    Path((user, id)): Path<(String, String)>,
) -> Json<OperationResult<DeviceSummary>> {
    Json(state.operations.device_remove(&user, &id))
}

/// `GET /user/{user}/device/desc/{desc}`
pub async fn by_description(
    State(state): State<AppState>,
    Path((user, description)): Path<(String, String)>,
) -> Json<OperationResult<DeviceSummary>> {
    Json(state.operations.device_by_description(&user, &description))
}
