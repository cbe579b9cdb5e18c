//! # TDP Crypto
//!
//! Cryptographic helpers shared by the TDP backend:
//! - Secure random generation (OIDC state and nonce, session ids, JWT ids)
//! - Password hashing (Argon2id)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod password;
pub mod random;

pub use error::CryptoError;
