//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::Authenticated;
use crate::models::{LoginResponse, LogoutResponse, MeResponse, TelegramLoginRequest};
use crate::services::auth;
use crate::services::cookies::{ADMIN_COOKIE, admin_cookie, clear_admin_cookie};

/// `POST /api/auth/telegram`: exchange signed launch data for a session cookie.
pub async fn telegram_login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<TelegramLoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let (resp, issued) = auth::login(
        &state,
        &body.init_data,
        auth::client_ip(&headers),
        auth::user_agent(&headers),
    )
    .await?;

    let jar = jar.add(admin_cookie(
        &issued.cookie_value,
        state.config.session_ttl_secs,
        state.config.cookie_secure,
    ));
    Ok((jar, Json(resp)))
}

/// `POST /api/auth/logout`: revoke the session (store mode) and clear the cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    let current = jar.get(ADMIN_COOKIE).map(|c| c.value().to_string());
    auth::logout(&state, current.as_deref()).await;

    let jar = jar.add(clear_admin_cookie(state.config.cookie_secure));
    (jar, Json(LogoutResponse { success: true }))
}

/// `GET /api/auth/me`: who the caller is and whether they are an admin.
pub async fn me_handler(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> AppResult<Json<MeResponse>> {
    let is_admin = state.roles.is_admin(identity.telegram_id).await?;
    Ok(Json(MeResponse {
        id: identity.telegram_id,
        username: identity.username().map(str::to_string),
        source: identity.source.label().to_string(),
        is_admin,
    }))
}
