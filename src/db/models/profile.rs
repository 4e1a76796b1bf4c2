use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// External review-aggregator platform a profile is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Platform {
    Dgis,
    Flamp,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Dgis => "dgis",
            Platform::Flamp => "flamp",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dgis" | "2gis" => Ok(Platform::Dgis),
            "flamp" => Ok(Platform::Flamp),
            _ => Err(()),
        }
    }
}

/// Local record linking a user to one external review platform account.
///
/// `linked` is true only while the most recent sync with the upstream
/// succeeded; any credential or username edit resets it until the profile
/// is re-linked.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub owner_user_id: String,
    pub platform: Platform,
    pub username: String,
    pub display_name: Option<String>,
    /// Ciphertext produced by the credential cipher. Plaintext is never stored.
    #[serde(skip_serializing)]
    pub encrypted_credential: String,
    pub linked: bool,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
