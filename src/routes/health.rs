use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::models::Platform;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub platforms: [&'static str; 2],
    pub timestamp: String,
}

/// Liveness plus a storage reachability probe. Upstream platforms are not
/// probed here; a dead upstream degrades its own endpoints, not the service.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = database_status(&state.db).await;
    let healthy = database == "reachable";

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        platforms: [Platform::Dgis.as_str(), Platform::Flamp.as_str()],
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

async fn database_status(pool: &SqlitePool) -> &'static str {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => "reachable",
        Err(e) => {
            tracing::warn!("Health probe could not reach the database: {}", e);
            "unreachable"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn reports_reachable_database() {
        let pool = test_pool().await;
        assert_eq!(database_status(&pool).await, "reachable");
    }

    #[tokio::test]
    async fn reports_unreachable_database_once_closed() {
        let pool = test_pool().await;
        pool.close().await;
        assert_eq!(database_status(&pool).await, "unreachable");
    }
}
