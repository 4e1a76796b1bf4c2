//! Proxy endpoints for reviews and stats, plus 2GIS-only review actions.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::Platform;
use crate::db::repository::BranchRepository;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::reviews::{ReviewQueryParams, ReviewService};
use crate::services::stats::StatsService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:platform/reviews", get(fetch_reviews))
        .route("/:platform/stats", get(fetch_stats))
}

/// Actions only the 2GIS microservice supports.
pub fn dgis_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats/collect", post(trigger_stats_collection))
        .route("/reviews/:review_id/favorite", post(toggle_favorite))
        .route("/reviews/:review_id/complaint", post(send_complaint))
        .route("/reviews/:review_id/reply", post(post_reply))
}

fn parse_platform(raw: &str) -> AppResult<Platform> {
    Platform::from_str(raw).map_err(|_| AppError::Validation(format!("Unknown platform: {}", raw)))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub filial_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsCollectRequest {
    pub filial_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComplaintRequest {
    pub complaint_text: String,
    pub main_user_id: String,
    #[serde(default)]
    pub is_no_client_complaint: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub text: String,
    pub main_user_id: String,
    #[serde(default)]
    pub is_official: bool,
}

async fn fetch_reviews(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(platform): Path<String>,
    Query(params): Query<ReviewQueryParams>,
) -> AppResult<impl IntoResponse> {
    let platform = parse_platform(&platform)?;
    let page = ReviewService::fetch(state.platform_service(platform), &params).await?;
    Ok(Json(page))
}

async fn fetch_stats(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(platform): Path<String>,
    Query(query): Query<StatsQuery>,
) -> AppResult<impl IntoResponse> {
    let platform = parse_platform(&platform)?;
    let result =
        StatsService::fetch(state.platform_service(platform), query.filial_id.as_deref()).await?;
    Ok(Json(result))
}

/// Ask the 2GIS microservice to start collecting stats for a branch. The
/// branch must already be known locally so we can supply its account id.
async fn trigger_stats_collection(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Json(body): Json<StatsCollectRequest>,
) -> AppResult<impl IntoResponse> {
    let filial_id = match body.filial_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(AppError::MissingParameters(vec!["filial_id".to_string()])),
    };

    let profile_id = BranchRepository::find_owner_profile_id(&state.db, Platform::Dgis, filial_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Branch not found".to_string()))?;

    state
        .dgis
        .trigger_stats_collection(&profile_id, filial_id)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({"message": "Stats collection started"})))
}

async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(review_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let is_favorite = state
        .dgis
        .toggle_favorite(&review_id)
        .await
        .map_err(AppError::from)?;
    Ok(Json(json!({"is_favorite": is_favorite})))
}

async fn send_complaint(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(review_id): Path<String>,
    Json(body): Json<ComplaintRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .dgis
        .send_complaint(
            &review_id,
            &body.main_user_id,
            &body.complaint_text,
            body.is_no_client_complaint,
        )
        .await
        .map_err(AppError::from)?;
    Ok(Json(json!({"status": "ok"})))
}

async fn post_reply(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(review_id): Path<String>,
    Json(body): Json<ReplyRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .dgis
        .post_reply(
            &review_id,
            &body.main_user_id,
            &body.text,
            body.is_official,
        )
        .await
        .map_err(AppError::from)?;
    Ok(Json(json!({"status": "ok"})))
}
