//! Profile and branch management, scoped per platform.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::models::Platform;
use crate::db::repository::{BranchRepository, ProfileRepository, UpdateProfile};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::linker::ProfileLinker;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/:platform/profiles",
            get(list_profiles).post(create_profile),
        )
        .route("/:platform/profiles/:profile_id", patch(update_profile))
        .route("/:platform/profiles/:profile_id/link", post(link_profile))
        .route(
            "/:platform/profiles/:profile_id/branches",
            get(list_branches),
        )
        .route(
            "/:platform/branches/:branch_id/selected",
            patch(set_branch_selected),
        )
}

fn parse_platform(raw: &str) -> AppResult<Platform> {
    Platform::from_str(raw).map_err(|_| AppError::Validation(format!("Unknown platform: {}", raw)))
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub username: String,
    /// Plaintext platform credential. Encrypted before it touches storage.
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetSelectedRequest {
    pub selected: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_profiles(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path(platform): Path<String>,
) -> AppResult<impl IntoResponse> {
    let platform = parse_platform(&platform)?;
    let profiles = ProfileRepository::list_by_owner(&state.db, &requester, platform).await?;
    Ok(Json(profiles))
}

async fn create_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path(platform): Path<String>,
    Json(body): Json<CreateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    let platform = parse_platform(&platform)?;

    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::Validation(
            "username and password must not be empty".to_string(),
        ));
    }

    let encrypted = state.cipher.encrypt(&body.password)?;
    let profile = ProfileRepository::create(
        &state.db,
        &requester,
        platform,
        body.username.trim(),
        &encrypted,
        body.name.as_deref(),
    )
    .await?;

    tracing::info!(profile_id = %profile.id, %platform, "Profile created");
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path((platform, profile_id)): Path<(String, String)>,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    let platform = parse_platform(&platform)?;
    let profile = ProfileLinker::load_owned_profile(&state.db, &profile_id, &requester).await?;
    if profile.platform != platform {
        return Err(AppError::NotFound("Profile not found".to_string()));
    }

    if body.username.as_deref().is_some_and(|u| u.trim().is_empty()) {
        return Err(AppError::Validation("username must not be empty".to_string()));
    }
    if body.password.as_deref().is_some_and(str::is_empty) {
        return Err(AppError::Validation("password must not be empty".to_string()));
    }

    let encrypted = body
        .password
        .as_deref()
        .map(|p| state.cipher.encrypt(p))
        .transpose()?;

    let updated = ProfileRepository::update(
        &state.db,
        &profile.id,
        UpdateProfile {
            username: body.username.map(|u| u.trim().to_string()),
            encrypted_credential: encrypted,
            display_name: body.name,
        },
    )
    .await?;

    tracing::info!(profile_id = %updated.id, %platform, "Profile updated, link reset");
    Ok(Json(updated))
}

async fn link_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path((platform, profile_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let platform = parse_platform(&platform)?;
    let service = state.platform_service(platform);
    let result = ProfileLinker::link(&state.db, service, &profile_id, &requester).await?;
    Ok(Json(result))
}

async fn list_branches(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path((platform, profile_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let platform = parse_platform(&platform)?;
    let profile = ProfileLinker::load_owned_profile(&state.db, &profile_id, &requester).await?;
    if profile.platform != platform {
        return Err(AppError::NotFound("Profile not found".to_string()));
    }

    let branches = BranchRepository::list_by_profile(&state.db, &profile.id).await?;
    Ok(Json(branches))
}

async fn set_branch_selected(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path((platform, branch_id)): Path<(String, String)>,
    Json(body): Json<SetSelectedRequest>,
) -> AppResult<impl IntoResponse> {
    let platform = parse_platform(&platform)?;
    let branch = BranchRepository::find_by_id(&state.db, &branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Branch not found".to_string()))?;

    // Ownership goes through the owning profile.
    let profile =
        ProfileLinker::load_owned_profile(&state.db, &branch.profile_id, &requester).await?;
    if profile.platform != platform {
        return Err(AppError::NotFound("Branch not found".to_string()));
    }

    let branch = BranchRepository::set_selected(&state.db, &branch.id, body.selected).await?;
    Ok(Json(branch))
}
