//! Authentication domain models.
//!
//! `PlatformIdentity` mirrors the `user` object of the platform's launch data
//! (snake_case field names, numeric `id`). API-facing shapes live in
//! `storefront_api::models`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat-platform user whose identity was asserted by a verified signed payload.
///
/// Decoding is strict: `id` is required and must be an integer. Unknown
/// fields sent by the platform (`photo_url`, `allows_write_to_pm`, ...) are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformIdentity {
    /// Platform user id.
    #[serde(rename = "id")]
    pub numeric_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
}

impl PlatformIdentity {
    /// Identity carrying only the platform id.
    pub fn from_id(numeric_id: i64) -> Self {
        Self {
            numeric_id,
            username: None,
            first_name: None,
            last_name: None,
            language_code: None,
            is_premium: None,
        }
    }
}

/// Result of a successful launch-data verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedInitData {
    pub user: PlatformIdentity,
    /// When the platform signed the payload.
    pub auth_date: DateTime<Utc>,
    pub query_id: Option<String>,
    pub start_param: Option<String>,
}

/// Claims carried inside a self-signed admin token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminTokenPayload {
    /// Platform id of the subject.
    #[serde(rename = "sub")]
    pub subject: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Expiry, unix epoch milliseconds.
    #[serde(rename = "exp")]
    pub expires_at_ms: i64,
}

/// Store-backed admin session (`admin_sessions` row).
///
/// `token` is the plaintext opaque token: returned once by `create` and echoed
/// back from `find_by_token`. The store itself only keeps its SHA-256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub subject_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A `contacts` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub updated_at: DateTime<Utc>,
}
