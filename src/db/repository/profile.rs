use chrono::Utc;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{Platform, Profile};
use crate::error::{AppError, AppResult};

const PROFILE_COLUMNS: &str = r#"
    id, owner_user_id, platform, username, display_name,
    encrypted_credential, linked, created_at, updated_at
"#;

fn row_to_profile(r: sqlx::sqlite::SqliteRow) -> Profile {
    Profile {
        id: r.get("id"),
        owner_user_id: r.get("owner_user_id"),
        platform: r.get("platform"),
        username: r.get("username"),
        display_name: r.get("display_name"),
        encrypted_credential: r.get("encrypted_credential"),
        linked: r.get("linked"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

/// Partial update applied to a profile. Only supplied fields change.
#[derive(Debug, Default, Clone)]
pub struct UpdateProfile {
    pub username: Option<String>,
    /// Already-encrypted replacement credential.
    pub encrypted_credential: Option<String>,
    pub display_name: Option<String>,
}

pub struct ProfileRepository;

impl ProfileRepository {
    pub async fn create(
        pool: &SqlitePool,
        owner_user_id: &str,
        platform: Platform,
        username: &str,
        encrypted_credential: &str,
        display_name: Option<&str>,
    ) -> AppResult<Profile> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO profiles (
                id, owner_user_id, platform, username, display_name,
                encrypted_credential, linked, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(owner_user_id)
        .bind(platform)
        .bind(username)
        .bind(display_name)
        .bind(encrypted_credential)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row_to_profile(row))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Profile>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {PROFILE_COLUMNS}
            FROM profiles
            WHERE id = ?
            "#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(row_to_profile))
    }

    pub async fn list_by_owner(
        pool: &SqlitePool,
        owner_user_id: &str,
        platform: Platform,
    ) -> AppResult<Vec<Profile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PROFILE_COLUMNS}
            FROM profiles
            WHERE owner_user_id = ? AND platform = ?
            ORDER BY created_at ASC
            "#
        ))
        .bind(owner_user_id)
        .bind(platform)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    /// Apply a partial update. Any successful update invalidates the link:
    /// `linked` is reset until the profile is re-confirmed against the
    /// external platform.
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        update: UpdateProfile,
    ) -> AppResult<Profile> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            UPDATE profiles
            SET
                username = COALESCE(?, username),
                encrypted_credential = COALESCE(?, encrypted_credential),
                display_name = COALESCE(?, display_name),
                linked = 0,
                updated_at = ?
            WHERE id = ?
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(update.username)
        .bind(update.encrypted_credential)
        .bind(update.display_name)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.map(row_to_profile)
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
    }
}
