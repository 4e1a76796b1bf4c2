//! Account linking: sync a stored profile with its external platform and
//! reconcile the returned branch listing into local storage.
//!
//! The reconcile (branch replacement plus the `linked` flag) happens in one
//! transaction, so a concurrent reader never observes a half-replaced
//! branch set and a failed link leaves the previous state intact. The
//! transaction also acts as the cancellation guard: if the caller aborts
//! the request, the handler future is dropped before commit and nothing is
//! written.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::db::models::Profile;
use crate::db::repository::{BranchRepository, ProfileRepository};
use crate::error::{AppError, AppResult};
use crate::services::gateway::GatewayError;
use crate::services::mask::mask_sensitive_data;
use crate::services::platform::{dedup_last_wins, ReviewPlatform, SyncRequest};

#[derive(Debug, Serialize)]
pub struct LinkResult {
    pub ok: bool,
    pub branch_count: usize,
}

/// Sync status codes the upstreams use for link failures.
fn map_sync_error(err: GatewayError) -> AppError {
    match err {
        GatewayError::Status { code: 401, .. } => AppError::UpstreamAuthRejected,
        GatewayError::Status { code: 501, .. } => AppError::AccountFetchFailed,
        GatewayError::Status { code: 502, .. } => AppError::AccountSyncFailed,
        other => other.into(),
    }
}

pub struct ProfileLinker;

impl ProfileLinker {
    /// Load an owned profile, refusing foreign and missing ids.
    pub async fn load_owned_profile(
        pool: &SqlitePool,
        profile_id: &str,
        requester_id: &str,
    ) -> AppResult<Profile> {
        let profile = ProfileRepository::find_by_id(pool, profile_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        if profile.owner_user_id != requester_id {
            return Err(AppError::Forbidden);
        }

        Ok(profile)
    }

    pub async fn link(
        pool: &SqlitePool,
        platform: &dyn ReviewPlatform,
        profile_id: &str,
        requester_id: &str,
    ) -> AppResult<LinkResult> {
        let profile = Self::load_owned_profile(pool, profile_id, requester_id).await?;

        if profile.platform != platform.platform() {
            return Err(AppError::Validation(format!(
                "Profile {} belongs to platform {}",
                profile.id, profile.platform
            )));
        }

        let request = SyncRequest {
            external_user_id: profile.id.clone(),
            username: profile.username.clone(),
            credential: profile.encrypted_credential.clone(),
        };

        tracing::info!(
            profile_id = %profile.id,
            platform = %profile.platform,
            payload = %mask_sensitive_data(&json!({
                "username": request.username,
                "hashed_password": request.credential,
            })),
            "Linking profile"
        );

        let branches = platform
            .sync_account(&request)
            .await
            .map_err(map_sync_error)?;
        let branches = dedup_last_wins(branches);

        // Reconcile: branch replacement and the linked flag commit together.
        let mut tx = pool.begin().await.map_err(AppError::Database)?;
        let branch_count = BranchRepository::replace_for_profile(&mut tx, &profile.id, &branches).await?;
        sqlx::query("UPDATE profiles SET linked = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(&profile.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            profile_id = %profile.id,
            platform = %profile.platform,
            branch_count,
            "Profile linked"
        );

        Ok(LinkResult {
            ok: true,
            branch_count,
        })
    }
}
