use chrono::Utc;
use sqlx::Row;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::db::models::{Branch, NewBranch};
use crate::error::{AppError, AppResult};

fn row_to_branch(r: sqlx::sqlite::SqliteRow) -> Branch {
    Branch {
        id: r.get("id"),
        profile_id: r.get("profile_id"),
        external_branch_id: r.get("external_branch_id"),
        name: r.get("name"),
        selected: r.get("selected"),
        created_at: r.get("created_at"),
    }
}

pub struct BranchRepository;

impl BranchRepository {
    pub async fn list_by_profile(pool: &SqlitePool, profile_id: &str) -> AppResult<Vec<Branch>> {
        let rows = sqlx::query(
            r#"
            SELECT id, profile_id, external_branch_id, name, selected, created_at
            FROM branches
            WHERE profile_id = ?
            ORDER BY name ASC
            "#,
        )
        .bind(profile_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.into_iter().map(row_to_branch).collect())
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Branch>> {
        let row = sqlx::query(
            r#"
            SELECT id, profile_id, external_branch_id, name, selected, created_at
            FROM branches
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(row_to_branch))
    }

    pub async fn set_selected(pool: &SqlitePool, id: &str, selected: bool) -> AppResult<Branch> {
        let row = sqlx::query(
            r#"
            UPDATE branches
            SET selected = ?
            WHERE id = ?
            RETURNING id, profile_id, external_branch_id, name, selected, created_at
            "#,
        )
        .bind(selected)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.map(row_to_branch)
            .ok_or_else(|| AppError::NotFound("Branch not found".to_string()))
    }

    /// Resolve the owning profile of an external branch id within one
    /// platform. Branch ids are only unique per platform.
    pub async fn find_owner_profile_id(
        pool: &SqlitePool,
        platform: crate::db::models::Platform,
        external_branch_id: &str,
    ) -> AppResult<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT p.id AS profile_id
            FROM branches b
            JOIN profiles p ON p.id = b.profile_id
            WHERE b.external_branch_id = ? AND p.platform = ?
            LIMIT 1
            "#,
        )
        .bind(external_branch_id)
        .bind(platform)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| r.get("profile_id")))
    }

    /// Replace the full branch set of a profile inside the caller's
    /// transaction. Old rows (including their `selected` flags) are gone
    /// once the transaction commits.
    pub async fn replace_for_profile(
        tx: &mut Transaction<'_, Sqlite>,
        profile_id: &str,
        branches: &[NewBranch],
    ) -> AppResult<usize> {
        sqlx::query("DELETE FROM branches WHERE profile_id = ?")
            .bind(profile_id)
            .execute(&mut **tx)
            .await
            .map_err(AppError::Database)?;

        let now = Utc::now().naive_utc();
        for branch in branches {
            sqlx::query(
                r#"
                INSERT INTO branches (id, profile_id, external_branch_id, name, selected, created_at)
                VALUES (?, ?, ?, ?, 0, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(profile_id)
            .bind(&branch.external_branch_id)
            .bind(&branch.name)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(AppError::Database)?;
        }

        Ok(branches.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Platform;
    use crate::db::repository::ProfileRepository;
    use crate::db::test_pool;

    async fn seed_profile(pool: &SqlitePool) -> String {
        ProfileRepository::create(pool, "user-1", Platform::Dgis, "u", "c", None)
            .await
            .unwrap()
            .id
    }

    fn new_branch(id: &str, name: &str) -> NewBranch {
        NewBranch {
            external_branch_id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn replace_discards_previous_rows_and_selection() {
        let pool = test_pool().await;
        let profile_id = seed_profile(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        BranchRepository::replace_for_profile(
            &mut tx,
            &profile_id,
            &[new_branch("b-1", "Old"), new_branch("b-2", "Stale")],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let old = BranchRepository::list_by_profile(&pool, &profile_id)
            .await
            .unwrap();
        BranchRepository::set_selected(&pool, &old[0].id, true)
            .await
            .unwrap();

        let mut tx = pool.begin().await.unwrap();
        BranchRepository::replace_for_profile(
            &mut tx,
            &profile_id,
            &[new_branch("b-2", "Stale"), new_branch("b-3", "Fresh")],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let branches = BranchRepository::list_by_profile(&pool, &profile_id)
            .await
            .unwrap();
        assert_eq!(branches.len(), 2);
        assert!(branches.iter().all(|b| !b.selected));
        let ids: Vec<&str> = branches
            .iter()
            .map(|b| b.external_branch_id.as_str())
            .collect();
        assert!(ids.contains(&"b-2") && ids.contains(&"b-3"));
    }

    #[tokio::test]
    async fn rolled_back_replace_leaves_rows_untouched() {
        let pool = test_pool().await;
        let profile_id = seed_profile(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        BranchRepository::replace_for_profile(&mut tx, &profile_id, &[new_branch("b-1", "Keep")])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        BranchRepository::replace_for_profile(&mut tx, &profile_id, &[new_branch("b-9", "Lost")])
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let branches = BranchRepository::list_by_profile(&pool, &profile_id)
            .await
            .unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].external_branch_id, "b-1");
    }

    #[tokio::test]
    async fn set_selected_unknown_branch_is_not_found() {
        let pool = test_pool().await;
        let err = BranchRepository::set_selected(&pool, "missing", true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
