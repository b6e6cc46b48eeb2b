//! Profile and group handlers. All but `groups` are admin-only; the
//! operations enforce that.

use axum::Json;
use axum::extract::{Path, State};

use relayhub_app::operations::{GroupList, OperationResult, ProfileList};

use crate::state::AppState;

/// `GET /user/{user}/groups`
pub async fn groups(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Json<OperationResult<GroupList>> {
    Json(state.operations.groups(&user))
}

/// `GET /user/{user}/profile`
pub async fn list(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Json<OperationResult<ProfileList>> {
    Json(state.operations.profile_list(&user))
}

/// `GET /user/{user}/profile/add/name/{name}/key/{key}/admin/{admin}`
pub async fn add(
    State(state): State<AppState>,
    Path((user, name, key, admin)): Path<(String, String, String, String)>,
) -> Json<OperationResult<()>> {
    Json(state.operations.profile_add(&user, &name, &key, &admin))
}

/// `GET /user/{user}/profile/del/name/{name}`
pub async fn remove(
    State(state): State<AppState>,
    Path((user, name)): Path<(String, String)>,
) -> Json<OperationResult<()>> {
    Json(state.operations.profile_remove(&user, &name))
}

/// `GET /user/{user}/profile/name/{name}/add/device/{device}/read/{read}/write/{write}`
pub async fn add_device(
    State(state): State<AppState>,
    Path((user, name, device, read, write)): Path<(String, String, String, String, String)>,
) -> Json<OperationResult<()>> {
    Json(
        state
            .operations
            .profile_add_device(&user, &name, &device, &read, &write),
    )
}

/// `GET /user/{user}/profile/name/{name}/del/device/{device}`
pub async fn remove_device(
    State(state): State<AppState>,
    Path((user, name, device)): Path<(String, String, String)>,
) -> Json<OperationResult<()>> {
    Json(state.operations.profile_remove_device(&user, &name, &device))
}

/// `GET /user/{user}/profile/name/{name}/add/group/{group}`
pub async fn add_group(
    State(state): State<AppState>,
    Path((user, name, group)): Path<(String, String, String)>,
) -> Json<OperationResult<()>> {
    Json(state.operations.profile_add_group(&user, &name, &group))
}

/// `GET /user/{user}/profile/name/{name}/del/group/{group}`
pub async fn remove_group(
    State(state): State<AppState>,
    Path((user, name, group)): Path<(String, String, String)>,
) -> Json<OperationResult<()>> {
    Json(state.operations.profile_remove_group(&user, &name, &group))
}
