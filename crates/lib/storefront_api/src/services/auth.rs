//! Login, logout and admin role management.

use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use chrono::Duration;
use storefront_core::auth::backend::IssuedSession;
use tracing::{info, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Identity;
use crate::models::{AdminListResponse, ContactView, LoginResponse, SetAdminResponse, UserView};

/// Longest user agent kept on a session row.
const MAX_USER_AGENT_LEN: usize = 512;

/// Verify launch data and issue an admin session credential.
///
/// Every verified user gets a cookie; admin-only routes check the role on
/// each request, so a later promotion takes effect without a new login.
pub async fn login(
    state: &AppState,
    raw_init_data: &str,
    ip_address: Option<String>,
    user_agent: Option<String>,
) -> AppResult<(LoginResponse, IssuedSession)> {
    let verified = state.launch.verify(raw_init_data)?;
    let user = verified.user;

    // Allow-listed admins can still log in while the store is down.
    if let Err(e) = state.roles.store().record_contact(&user).await {
        warn!(subject_id = user.numeric_id, error = %e, "failed to record contact");
    }

    let is_admin = state.roles.is_admin(user.numeric_id).await?;
    let ttl = Duration::try_seconds(state.config.session_ttl_secs)
        .ok_or_else(|| AppError::Internal("session ttl out of range".into()))?;
    let issued = state
        .sessions
        .issue(&user, ttl, ip_address, user_agent)
        .await?;

    info!(
        subject_id = user.numeric_id,
        is_admin,
        backend = %state.sessions.kind(),
        "login"
    );

    let response = LoginResponse {
        user: UserView::from(&user),
        is_admin,
        expires_at: issued.expires_at,
    };
    Ok((response, issued))
}

/// Revoke the presented credential. Always succeeds so the cookie is cleared.
pub async fn logout(state: &AppState, cookie_value: Option<&str>) {
    let Some(value) = cookie_value.filter(|v| !v.is_empty()) else {
        return;
    };
    match state.sessions.revoke(value).await {
        Ok(()) => info!(backend = %state.sessions.kind(), "logout"),
        Err(e) => warn!(error = %e, "failed to revoke session on logout"),
    }
}

/// Persisted admins plus the configured allow-list.
pub async fn list_admins(state: &AppState) -> AppResult<AdminListResponse> {
    let admins = state.roles.store().list_admins().await?;
    Ok(AdminListResponse {
        admins: admins.into_iter().map(ContactView::from).collect(),
        allow_list: state.roles.allow_list().sorted_ids(),
    })
}

/// Promote or demote a contact. Demotion revokes store-backed sessions at once.
pub async fn set_admin(
    state: &AppState,
    actor: &Identity,
    telegram_id: i64,
    is_admin: bool,
) -> AppResult<SetAdminResponse> {
    if telegram_id <= 0 {
        return Err(AppError::Validation("telegram id must be positive".into()));
    }

    state.roles.store().set_admin_flag(telegram_id, is_admin).await?;
    let revoked_sessions = if is_admin {
        0
    } else {
        state.sessions.revoke_subject(telegram_id).await?
    };
    let on_allow_list = state.roles.allow_list().contains(&telegram_id.to_string());

    info!(
        actor_id = actor.telegram_id,
        subject_id = telegram_id,
        is_admin,
        revoked_sessions,
        "admin flag updated"
    );
    if !is_admin && on_allow_list {
        warn!(subject_id = telegram_id, "demoted id is on the allow-list and stays admin");
    }

    Ok(SetAdminResponse {
        telegram_id,
        is_admin,
        revoked_sessions,
        on_allow_list,
    })
}

/// Client address: first `x-forwarded-for` hop, else `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn user_agent_is_truncated() {
        let mut headers = HeaderMap::new();
        let long = "a".repeat(2 * MAX_USER_AGENT_LEN);
        headers.insert(USER_AGENT, HeaderValue::from_str(&long).unwrap());
        assert_eq!(user_agent(&headers).unwrap().len(), MAX_USER_AGENT_LEN);
    }
}
