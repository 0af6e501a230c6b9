use crate::api::handlers::AppState;
use crate::api::models::{HealthResponse, PingResponse};
use axum::{extract::State, Json};
use chrono::Utc;

/// Handler for GET /ping - Liveness probe
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: "pong".to_string(),
    })
}

/// Handler for GET /health - Readiness probe, checks the database answers
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = match state
        .db
        .execute(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
        .await
    {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(error = %e, "Health check: database unreachable");
            false
        }
    };

    Json(HealthResponse {
        status: if db_ok { "healthy" } else { "unhealthy" }.to_string(),
        version: crate::VERSION.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
