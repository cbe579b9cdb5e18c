//! # TDP Storage
//!
//! Storage abstraction layer for TDP backends.
//!
//! Provides the backend trait, bind parameters and error type shared by
//! storage implementations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod param;

pub use backend::StorageBackend;
pub use error::StorageError;
pub use param::SqlParam;
