//! Capability interface for the external review-aggregator platforms.
//!
//! Each platform speaks a different wire dialect for the same three
//! operations: account sync, review fetch and stats fetch. The adapters in
//! `dgis.rs` and `flamp.rs` hide the dialect; the linker, review and stats
//! services work only against this trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::db::models::{NewBranch, Platform};
use crate::services::gateway::GatewayError;

/// Outbound account sync payload. `credential` is the stored ciphertext;
/// plaintext never travels through the linker.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub external_user_id: String,
    pub username: String,
    pub credential: String,
}

/// Validated review fetch parameters. `owner_id` is guaranteed present for
/// platforms that require it before this struct is built.
#[derive(Debug, Clone, Default)]
pub struct ReviewRequest {
    pub filial_id: String,
    pub owner_id: Option<String>,
    pub limit: u32,
    pub offset_date: Option<String>,
    pub rating: Option<String>,
    pub without_answer: Option<String>,
    pub is_favorite: Option<String>,
}

#[async_trait]
pub trait ReviewPlatform: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether review fetches need the external account id in addition to
    /// the branch id.
    fn requires_owner_id(&self) -> bool;

    /// Upsert the account on the platform and return its branch listing.
    async fn sync_account(&self, request: &SyncRequest) -> Result<Vec<NewBranch>, GatewayError>;

    /// Fetch raw (un-normalized) review records for one branch.
    async fn fetch_reviews(&self, request: &ReviewRequest) -> Result<Vec<Value>, GatewayError>;

    /// Fetch the raw stats payload for one branch.
    async fn fetch_stats(&self, filial_id: &str) -> Result<Value, GatewayError>;
}

/// Collapse duplicate external branch ids: the last occurrence wins, but the
/// entry keeps the position where the id was first seen.
pub fn dedup_last_wins(branches: Vec<NewBranch>) -> Vec<NewBranch> {
    let mut out: Vec<NewBranch> = Vec::with_capacity(branches.len());
    for branch in branches {
        match out
            .iter_mut()
            .find(|b| b.external_branch_id == branch.external_branch_id)
        {
            Some(existing) => *existing = branch,
            None => out.push(branch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(id: &str, name: &str) -> NewBranch {
        NewBranch {
            external_branch_id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn dedup_keeps_last_value_at_first_position() {
        let deduped = dedup_last_wins(vec![
            branch("1", "first"),
            branch("2", "other"),
            branch("1", "second"),
        ]);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0], branch("1", "second"));
        assert_eq!(deduped[1], branch("2", "other"));
    }

    #[test]
    fn dedup_is_identity_without_duplicates() {
        let input = vec![branch("1", "a"), branch("2", "b")];
        assert_eq!(dedup_last_wins(input.clone()), input);
    }
}
