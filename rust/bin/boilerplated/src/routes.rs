//! Route registration: module routes plus system endpoints.

use axum::Router;
use axum::response::IntoResponse;
use axum::routing::get;
use tracing::info;

/// Build the complete router from the module routers.
///
/// Modules mount their own path prefix and are merged rather than nested
/// here, so middleware layered inside a module sees full request paths.
pub fn build_router(module_routes: Vec<(&str, Router)>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    for (name, router) in module_routes {
        info!("Mounted {} module routes", name);
        app = app.merge(router);
    }

    app
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "boilerplated",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
