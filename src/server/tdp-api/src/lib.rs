//! # TDP API
//!
//! REST layer for the TANF Data Portal.
//!
//! ## Endpoints
//!
//! - `/v1/login/oidc`, `/v1/login` - login.gov redirect and callback
//! - `/v1/logout/oidc`, `/v1/logout` - provider and local logout
//! - `/v1/users/*` - user records and self-service profile
//! - `/v1/stts/all` - regions with their STTs
//! - `/v1/health` - liveness and database check

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::{ApiConfig, AppState};
