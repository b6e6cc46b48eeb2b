//! JSON handlers for the `/user/{user}/...` URL scheme.
//!
//! Handlers are thin: extract path segments, call one operation, wrap the
//! result record in [`Json`](axum::Json).

pub mod devices;
pub mod profiles;
pub mod switches;

use axum::routing::get;
use axum::{Extension, Router};

use relayhub_domain::device::DeviceKind;

use crate::state::AppState;

/// Build the `/user/{user}` routes.
pub fn routes() -> Router<AppState> {
    let mut router = Router::new()
        // Groups
        .route("/user/{user}/groups", get(profiles::groups))
        // Devices
        .route("/user/{user}/device", get(devices::list))
        .route(
            "/user/{user}/device/add/name/{name}/desc/{desc}/type/{type}",
            get(devices::add),
        )
        .route("/user/{user}/device/del/id/{id}", get(devices::remove))
        .route("/user/{user}/device/desc/{desc}", get(devices::by_description))
        // Profiles
        .route("/user/{user}/profile", get(profiles::list))
        .route(
            "/user/{user}/profile/add/name/{name}/key/{key}/admin/{admin}",
            get(profiles::add),
        )
        .route("/user/{user}/profile/del/name/{name}", get(profiles::remove))
        .route(
            "/user/{user}/profile/name/{name}/add/device/{device}/read/{read}/write/{write}",
            get(profiles::add_device),
        )
        .route(
            "/user/{user}/profile/name/{name}/del/device/{device}",
            get(profiles::remove_device),
        )
        .route(
            "/user/{user}/profile/name/{name}/add/group/{group}",
            get(profiles::add_group),
        )
        .route(
            "/user/{user}/profile/name/{name}/del/group/{group}",
            get(profiles::remove_group),
        );

    // Relays and lights share handlers; the kind rides along as an extension.
    for kind in DeviceKind::ALL {
        let base = format!("/user/{{user}}/{kind}");
        router = router
            .route(&base, get(switches::list).layer(Extension(kind)))
            .route(
                &format!("{base}/{{id}}"),
                get(switches::status).layer(Extension(kind)),
            )
            .route(
                &format!("{base}/{{id}}/switch"),
                get(switches::switch).layer(Extension(kind)),
            )
            .route(
                &format!("{base}/{{id}}/set/{{status}}"),
                get(switches::set).layer(Extension(kind)),
            )
            .route(
                &format!("{base}/{{id}}/update/state/{{state}}"),
                get(switches::update).layer(Extension(kind)),
            );
    }
    router
}
