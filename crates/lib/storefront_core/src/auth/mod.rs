//! Authentication and authorization logic.
//!
//! Launch-data verification, admin token signing, session persistence, and
//! admin role resolution, shared by `storefront_api` and the server binary.

pub mod admin_token;
pub mod backend;
pub mod crypto;
pub mod init_data;
pub mod roles;
pub mod sessions;

use thiserror::Error;

pub use admin_token::TokenError;
pub use init_data::InitDataError;

/// Store and issuance errors.
///
/// Expected bad input (bad signature, expired token, unknown session) is never
/// reported through this type; those paths return `None` or a classified
/// `InitDataError` / `TokenError`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token error: {0}")]
    TokenError(#[from] TokenError),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
