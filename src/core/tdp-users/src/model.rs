//! Domain types: users, roles, STTs and regions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UsersError;

/// Role a user holds (or requests) within TDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Office of Family Assistance administrator.
    #[serde(rename = "OFA Admin")]
    OfaAdmin,
    /// Office of Family Assistance analyst.
    #[serde(rename = "OFA Analyst")]
    OfaAnalyst,
    /// STT staff member preparing data submissions.
    #[serde(rename = "Data Prepper")]
    DataPrepper,
}

impl Role {
    /// Every assignable role, in display order.
    pub const ALL: [Role; 3] = [Role::OfaAdmin, Role::OfaAnalyst, Role::DataPrepper];

    /// The role's stored and serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::OfaAdmin => "OFA Admin",
            Role::OfaAnalyst => "OFA Analyst",
            Role::DataPrepper => "Data Prepper",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UsersError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UsersError::InvalidRole(s.to_string()))
    }
}

/// Kind of STT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttType {
    /// A U.S. state (or the District of Columbia).
    State,
    /// A U.S. territory.
    Territory,
    /// A tribal grantee, attached to a parent state.
    Tribe,
}

impl SttType {
    /// The type's stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SttType::State => "state",
            SttType::Territory => "territory",
            SttType::Tribe => "tribe",
        }
    }
}

impl FromStr for SttType {
    type Err = UsersError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "state" => Ok(SttType::State),
            "territory" => Ok(SttType::Territory),
            "tribe" => Ok(SttType::Tribe),
            other => Err(UsersError::Storage(format!("unknown STT type: {other}"))),
        }
    }
}

/// A grouping of STTs, identified by its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Region number.
    pub id: i64,
}

/// A state, territory or tribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stt {
    /// Database id.
    pub id: i64,
    /// Kind of STT.
    pub stt_type: SttType,
    /// Postal code; absent for tribes.
    pub code: Option<String>,
    /// Display name.
    pub name: String,
    /// Parent state for tribes.
    pub state_id: Option<i64>,
    /// Region the STT belongs to.
    pub region_id: i64,
}

/// Wire representation of an STT.
///
/// A tribe reports its parent state's code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SttSummary {
    /// Database id.
    pub id: i64,
    /// Kind of STT.
    #[serde(rename = "type")]
    pub stt_type: SttType,
    /// Postal code (the parent state's for tribes).
    pub code: Option<String>,
    /// Display name.
    pub name: String,
}

/// Wire representation of a region and its STTs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSummary {
    /// Region number.
    pub id: i64,
    /// STTs in the region, ordered by name.
    pub stts: Vec<SttSummary>,
}

/// A TDP user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Primary key.
    pub id: Uuid,
    /// Login name; the email address for OIDC users.
    pub username: String,
    /// Contact email.
    pub email: String,
    /// Argon2id hash, `None` when the user cannot log in with a password.
    pub password_hash: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Granted role.
    pub role: Option<Role>,
    /// Role requested through the profile form.
    pub requested_role: Option<Role>,
    /// Affiliated STT.
    pub stt_id: Option<i64>,
    /// Creation timestamp (Unix seconds).
    pub created_at: u64,
    /// Last update timestamp (Unix seconds).
    pub updated_at: u64,
}

impl User {
    /// Whether the user can authenticate with a password.
    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    /// Explicit id; generated when absent.
    pub id: Option<Uuid>,
    /// Login name.
    pub username: String,
    /// Contact email.
    pub email: String,
    /// Plaintext password; `None` leaves the password unusable.
    pub password: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Granted role.
    pub role: Option<Role>,
    /// Affiliated STT.
    pub stt_id: Option<i64>,
}

impl NewUser {
    /// A user with only a username, as created on first OIDC login.
    pub fn with_username(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            email: username.clone(),
            username,
            ..Default::default()
        }
    }
}
