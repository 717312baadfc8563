//! Admin session cookie.
//!
//! The value is either a self-signed admin token or an opaque store token,
//! depending on the configured session backend.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the admin session credential.
pub const ADMIN_COOKIE: &str = "tg_admin";

/// Build the httpOnly admin cookie.
pub fn admin_cookie(value: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((ADMIN_COOKIE.to_string(), value.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(max_age_secs.max(0)))
        .build()
}

/// Build an expired admin cookie to clear auth state.
pub fn clear_admin_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((ADMIN_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}
