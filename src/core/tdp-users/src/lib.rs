//! # TDP Users
//!
//! Users, roles and the state/territory/tribe (STT) directory.
//!
//! ## Features
//!
//! - User records with a one-time role request and STT affiliation
//! - STTs grouped into regions, tribes attached to their parent state
//! - Profile rules: `requested_role` and `stt` can only be set once
//! - Population commands for the bundled STT data and per-role test users

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
pub mod error;
pub mod model;
pub mod populate;
pub mod profile;

pub use directory::UserDirectory;
pub use error::{FieldErrors, UsersError};
pub use model::{NewUser, Region, RegionSummary, Role, Stt, SttSummary, SttType, User};
pub use profile::ProfileUpdate;
