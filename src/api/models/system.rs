use serde::{Deserialize, Serialize};

/// Response for GET /ping
#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
}

/// Response for GET /health
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" when the database answers, "unhealthy" otherwise
    pub status: String,
    pub version: String,
    pub timestamp: String,
}
