use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use boilerplate_core::{ListParams, ServiceError};

use crate::api::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/logs", get(list_logs))
}

/// GET /auth/logs — the login audit trail, newest first.
async fn list_logs(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result = svc.list_login_logs(&params).map_err(ServiceError::from)?;
    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
    })))
}
