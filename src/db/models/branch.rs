use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A physical location (filial) on the external platform, owned by a profile.
///
/// The full branch set of a profile is replaced on every successful link, so
/// rows here always reflect the upstream state as of the last reconcile.
/// `selected` is a user-controlled flag and is never written by reconcile,
/// but it does not survive a relink because the row itself is replaced.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub profile_id: String,
    pub external_branch_id: String,
    pub name: String,
    pub selected: bool,

    pub created_at: NaiveDateTime,
}

/// Input row for the atomic branch replacement: the flat shape the platform
/// adapters parse out of a successful account sync response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBranch {
    pub external_branch_id: String,
    pub name: String,
}

