//! Request and response bodies (camelCase on the wire).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::models::auth::{Contact, PlatformIdentity, VerifiedInitData};

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Set on 401 so the client restarts authentication instead of showing
    /// an error page.
    pub reauthenticate: bool,
}

/// `POST /api/auth/telegram` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramLoginRequest {
    /// Raw launch-data string exactly as the client received it.
    pub init_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
}

impl From<&PlatformIdentity> for UserView {
    fn from(identity: &PlatformIdentity) -> Self {
        Self {
            id: identity.numeric_id,
            username: identity.username.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            language_code: identity.language_code.clone(),
            is_premium: identity.is_premium,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserView,
    pub is_admin: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
}

/// `GET /api/auth/me` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// `signed_cookie`, `stored_session` or `trusted_header`.
    pub source: String,
    pub is_admin: bool,
}

/// `POST /api/webapp/verify` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub user: UserView,
    pub auth_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_param: Option<String>,
}

impl From<&VerifiedInitData> for VerifyResponse {
    fn from(data: &VerifiedInitData) -> Self {
        Self {
            user: UserView::from(&data.user),
            auth_date: data.auth_date,
            query_id: data.query_id.clone(),
            start_param: data.start_param.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactView {
    pub telegram_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<Contact> for ContactView {
    fn from(c: Contact) -> Self {
        Self {
            telegram_id: c.telegram_id,
            username: c.username,
            first_name: c.first_name,
            last_name: c.last_name,
            is_admin: c.is_admin,
            updated_at: c.updated_at,
        }
    }
}

/// `GET /api/admin/contacts/admins` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminListResponse {
    /// Contacts whose persisted flag is set.
    pub admins: Vec<ContactView>,
    /// Ids granted admin by configuration.
    pub allow_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdminResponse {
    pub telegram_id: i64,
    pub is_admin: bool,
    /// Store-backed sessions revoked by a demotion.
    pub revoked_sessions: u64,
    /// The id is on the configured allow-list, which overrides the flag.
    pub on_allow_list: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub db_connected: bool,
    pub session_backend: String,
}
