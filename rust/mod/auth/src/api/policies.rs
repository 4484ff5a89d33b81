use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use boilerplate_core::ServiceError;

use crate::api::AppState;
use crate::model::{CreatePolicyRule, EnforceInput, PolicyRule};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/policies", get(list_rules).post(create_rule))
        .route("/policies/{id}", axum::routing::delete(remove_rule))
        .route("/policies/check", post(check_rule))
}

#[derive(serde::Deserialize)]
struct PolicyListQuery {
    ptype: Option<String>,
    v0: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    50
}

/// GET /auth/policies — list rules, filterable by ptype and subject.
async fn list_rules(
    State(svc): State<AppState>,
    Query(query): Query<PolicyListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result = svc
        .list_policy_rules(
            query.ptype.as_deref(),
            query.v0.as_deref(),
            query.limit,
            query.offset,
        )
        .map_err(ServiceError::from)?;
    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
    })))
}

/// POST /auth/policies — create a rule.
async fn create_rule(
    State(svc): State<AppState>,
    Json(input): Json<CreatePolicyRule>,
) -> Result<(axum::http::StatusCode, Json<PolicyRule>), ServiceError> {
    let rule = svc.create_policy_rule(input).map_err(ServiceError::from)?;
    Ok((axum::http::StatusCode::CREATED, Json(rule)))
}

/// DELETE /auth/policies/{id} — delete a rule.
async fn remove_rule(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<axum::http::StatusCode, ServiceError> {
    svc.delete_policy_rule(&id).map_err(ServiceError::from)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// POST /auth/policies/check — dry-run a subject/path/method triple.
async fn check_rule(
    State(svc): State<AppState>,
    Json(input): Json<EnforceInput>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let allowed = svc.enforce(&input.sub, &input.path, &input.method.to_uppercase());
    Ok(Json(serde_json::json!({"allowed": allowed})))
}
