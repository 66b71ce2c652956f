//! Bearer token authentication
//!
//! Every route except `/health` runs behind [`auth_middleware`], which
//! resolves `Authorization: Bearer <token>` to a [`User`] and stores it in
//! the request extensions for handlers to extract with `Extension<User>`.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use hmt_common::auth::parse_bearer;
use hmt_common::models::User;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Authentication middleware
///
/// Returns 401 when the header is missing, malformed, or names no user.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
        .map(str::to_owned)
        .ok_or_else(|| {
            debug!("Rejected {}: missing bearer token", request.uri().path());
            ApiError::Unauthorized
        })?;

    let user = crate::db::users::find_by_token(&state.db, &token)
        .await?
        .ok_or_else(|| {
            warn!("Rejected {}: unknown API token", request.uri().path());
            ApiError::Unauthorized
        })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Reject callers without the admin flag
pub fn require_admin(user: &User) -> ApiResult<()> {
    if user.is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "User '{}' may not author templates",
            user.username
        )))
    }
}
