mod auth;
mod logs;
mod middleware;
mod policies;
mod rbac;

use std::sync::Arc;

use axum::Router;

use crate::service::AuthService;

/// Shared application state.
pub type AppState = Arc<AuthService>;

/// Build the complete auth API router, nested under `/auth`.
///
/// Both middlewares sit outside the nest so they see unstripped paths:
/// authentication resolves the identity (or passes through for public
/// paths), then the permission guard decides.
pub fn build_router(svc: Arc<AuthService>) -> Router {
    let api = Router::new()
        .merge(auth::routes())
        .merge(policies::routes())
        .merge(logs::routes());

    Router::new()
        .nest("/auth", api)
        .layer(axum::middleware::from_fn_with_state(
            svc.clone(),
            rbac::rbac_guard,
        ))
        .layer(axum::middleware::from_fn_with_state(
            svc.clone(),
            middleware::auth_middleware,
        ))
        .with_state(svc)
}
