//! Self-service profile rules.
//!
//! A user may fill in their names freely, but `requested_role` and `stt`
//! are write-once: a role request is refused once a role is granted or a
//! request is pending, and the STT cannot change after it is set. The
//! granted `role` is never writable here.

use serde::Deserialize;

use crate::{FieldErrors, Role, User, UsersError};

/// Body of a profile update.
///
/// Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    /// New given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// New family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Role to request, by display name.
    #[serde(default)]
    pub requested_role: Option<String>,
    /// STT to affiliate with.
    #[serde(default)]
    pub stt: Option<i64>,
}

/// A profile update that passed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedProfile {
    /// New given name.
    pub first_name: Option<String>,
    /// New family name.
    pub last_name: Option<String>,
    /// Role to request.
    pub requested_role: Option<Role>,
    /// STT to affiliate with.
    pub stt_id: Option<i64>,
}

impl ProfileUpdate {
    /// Checks the update against the user's current state.
    ///
    /// `stt_exists` reports whether the referenced STT (if any) exists.
    pub fn validate(&self, user: &User, stt_exists: bool) -> Result<ValidatedProfile, UsersError> {
        let mut errors = FieldErrors::new();

        let requested_role = match self.requested_role.as_deref() {
            None => None,
            Some(raw) => match raw.parse::<Role>() {
                Err(e) => {
                    errors.add("requested_role", e.to_string());
                    None
                },
                Ok(_) if user.role.is_some() => {
                    errors.add(
                        "requested_role",
                        "Cannot set requested role after a role is set.",
                    );
                    None
                },
                Ok(_) if user.requested_role.is_some() => {
                    errors.add(
                        "requested_role",
                        "Cannot modify requested role after it is set.",
                    );
                    None
                },
                Ok(role) => Some(role),
            },
        };

        let stt_id = match self.stt {
            None => None,
            Some(id) if !stt_exists => {
                errors.add("stt", format!("Invalid pk \"{id}\" - object does not exist."));
                None
            },
            Some(_) if user.stt_id.is_some() => {
                errors.add("stt", "Cannot modify STT after it is set.");
                None
            },
            Some(id) => Some(id),
        };

        errors.into_result()?;

        Ok(ValidatedProfile {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            requested_role,
            stt_id,
        })
    }
}
