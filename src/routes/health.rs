use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub environment: String,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "up",
        Err(e) => {
            tracing::warn!("Health check database ping failed: {e}");
            "down"
        }
    };

    Json(HealthResponse {
        status: if database == "up" { "healthy" } else { "degraded" },
        database,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
    })
}
