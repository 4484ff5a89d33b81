use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use boilerplate_core::ServiceError;

use crate::api::AppState;
use crate::api::middleware::is_public_path;
use crate::model::{CurrentUser, DATA_SCOPE_ALL};
use crate::service::AuthConfig;
use crate::service::matcher::Matcher;

/// Permission guard. Runs after authentication, with the identity (if
/// any) already resolved into a CurrentUser extension.
pub async fn rbac_guard(
    State(svc): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let user = req.extensions().get::<CurrentUser>().cloned();

    let matcher = svc.matcher();
    if let Err(e) = authorize(user.as_ref(), &method, &path, &matcher, &svc.config) {
        return e.into_response();
    }
    next.run(req).await
}

/// Decide whether a request may proceed.
///
/// Checked in order:
/// 1. public paths need no identity
/// 2. everything else needs one
/// 3. superusers pass
/// 4. an identity with no roles is denied
/// 5. mutating methods require a staff account
/// 6. a role with the all-data scope passes
/// 7. excluded (method, path) pairs pass, else some role must hold a
///    matching rule
pub(crate) fn authorize(
    user: Option<&CurrentUser>,
    method: &str,
    path: &str,
    matcher: &Matcher,
    config: &AuthConfig,
) -> Result<(), ServiceError> {
    if is_public_path(config, path) {
        return Ok(());
    }

    let Some(user) = user else {
        return Err(ServiceError::Token("authentication required".into()));
    };

    if user.is_superuser {
        return Ok(());
    }

    if user.roles.is_empty() {
        return Err(ServiceError::Authorization("no roles assigned".into()));
    }

    let mutating = method != "GET" && method != "OPTIONS";
    if mutating && !user.is_staff {
        return Err(ServiceError::Authorization(
            "staff account required for this operation".into(),
        ));
    }

    if user.roles.iter().any(|r| r.data_scope == DATA_SCOPE_ALL) {
        return Ok(());
    }

    if config
        .guard_exclude
        .iter()
        .any(|(m, p)| m == method && p == path)
    {
        return Ok(());
    }

    if user
        .roles
        .iter()
        .any(|r| matcher.enforce(&r.id, path, method))
    {
        return Ok(());
    }

    Err(ServiceError::Authorization("permission denied".into()))
}
