//! # storefront_core
//!
//! Trust establishment for the Storefront mini-app: launch-data signature
//! verification, admin session tokens, session storage, and admin role
//! resolution. Shared by `storefront_api` and the server binary.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
