use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{db, AppState};

/// Service health check
pub async fn health_check(State(state): State<AppState>) -> Response {
    if let Err(e) = db::health_check(state.db.pool()).await {
        tracing::error!(error = %e, "PostgreSQL health check failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unhealthy",
                "service": state.config.service_name,
                "version": state.config.service_version,
                "checks": {
                    "postgresql": "down"
                }
            })),
        )
            .into_response();
    }

    Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgresql": "up"
        }
    }))
    .into_response()
}
