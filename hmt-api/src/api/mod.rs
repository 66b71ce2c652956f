//! HTTP API handlers for hmt-api

pub mod auth;
pub mod health;
pub mod tasks;
pub mod template_updates;
pub mod templates;

pub use auth::auth_middleware;
pub use health::health_routes;
pub use tasks::task_routes;
pub use template_updates::template_update_routes;
pub use templates::template_routes;

use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Parse an optional `trackableId` query value
pub(crate) fn parse_trackable_id(value: Option<&str>) -> ApiResult<Option<Uuid>> {
    match value {
        None | Some("") => Ok(None),
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid trackableId: {}", raw))),
    }
}
