//! Request authentication: who is calling, and are they an admin.
//!
//! Identity is resolved per request, in a fixed order:
//!
//! 1. the `tg_admin` cookie, if the configured session backend accepts it;
//! 2. the `x-telegram-user-id` header, only when trusted-header mode is on;
//! 3. otherwise unauthenticated.
//!
//! Nothing is cached between requests. Handlers use the [`Authenticated`],
//! [`Admin`] and [`VerifiedLaunch`] extractors or the [`require_auth`] /
//! [`require_admin`] middleware and never see tokens or signatures.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, request::Parts};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use storefront_core::auth::AuthError;
use storefront_core::auth::backend::{SessionBackend, SessionSubject};
use storefront_core::auth::init_data::InitDataVerifier;
use storefront_core::auth::roles::RoleResolver;
use storefront_core::models::auth::{AdminTokenPayload, SessionRecord, VerifiedInitData};
use thiserror::Error;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::ADMIN_COOKIE;

/// Header carrying a platform id asserted by a trusted upstream.
pub const TRUSTED_USER_HEADER: &str = "x-telegram-user-id";

/// Header carrying raw launch data.
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

/// `Authorization` scheme carrying raw launch data.
const INIT_DATA_SCHEME: &str = "tma ";

/// Where a request's identity came from. The variant is the trust level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// Self-signed admin token, verified against the current clock.
    SignedCookie(AdminTokenPayload),
    /// Opaque token found in the session store.
    StoredSession(SessionRecord),
    /// Id taken at face value from a trusted upstream header.
    TrustedHeader(i64),
    None,
}

impl IdentitySource {
    pub fn subject_id(&self) -> Option<i64> {
        match self {
            Self::SignedCookie(payload) => Some(payload.subject),
            Self::StoredSession(record) => Some(record.subject_id),
            Self::TrustedHeader(id) => Some(*id),
            Self::None => None,
        }
    }

    /// Stable name for logs and API responses.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SignedCookie(_) => "signed_cookie",
            Self::StoredSession(_) => "stored_session",
            Self::TrustedHeader(_) => "trusted_header",
            Self::None => "none",
        }
    }
}

impl From<SessionSubject> for IdentitySource {
    fn from(subject: SessionSubject) -> Self {
        match subject {
            SessionSubject::Signed(payload) => Self::SignedCookie(payload),
            SessionSubject::Stored(record) => Self::StoredSession(record),
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub telegram_id: i64,
    pub source: IdentitySource,
}

impl Identity {
    /// Username, when the credential carries one.
    pub fn username(&self) -> Option<&str> {
        match &self.source {
            IdentitySource::SignedCookie(payload) => payload.username.as_deref(),
            _ => None,
        }
    }
}

/// Why a guard refused a request.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("not authenticated")]
    Unauthorized,

    #[error("admin role required")]
    Forbidden,

    #[error("store error: {0}")]
    Store(#[from] AuthError),
}

/// Resolves and checks the identity of one request.
pub struct RequestAuthenticator<'a> {
    sessions: &'a SessionBackend,
    roles: &'a RoleResolver,
    trust_user_header: bool,
}

impl<'a> RequestAuthenticator<'a> {
    pub fn new(sessions: &'a SessionBackend, roles: &'a RoleResolver, trust_user_header: bool) -> Self {
        Self {
            sessions,
            roles,
            trust_user_header,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(&state.sessions, &state.roles, state.config.trust_user_header)
    }

    /// Resolve the identity source. Only a session store failure is an error;
    /// a bad or missing credential is `IdentitySource::None`.
    pub async fn identify(&self, headers: &HeaderMap) -> Result<IdentitySource, AuthError> {
        let jar = CookieJar::from_headers(headers);
        if let Some(cookie) = jar.get(ADMIN_COOKIE) {
            if let Some(subject) = self.sessions.resolve(cookie.value()).await? {
                return Ok(subject.into());
            }
            debug!(backend = %self.sessions.kind(), "admin cookie did not resolve");
        }

        if self.trust_user_header {
            if let Some(raw) = headers.get(TRUSTED_USER_HEADER) {
                match raw.to_str().ok().and_then(|v| v.trim().parse::<i64>().ok()) {
                    Some(id) => return Ok(IdentitySource::TrustedHeader(id)),
                    None => debug!("ignoring non-numeric {TRUSTED_USER_HEADER}"),
                }
            }
        }

        Ok(IdentitySource::None)
    }

    pub async fn require_authenticated(&self, headers: &HeaderMap) -> Result<Identity, AccessError> {
        let source = self.identify(headers).await?;
        let telegram_id = source.subject_id().ok_or(AccessError::Unauthorized)?;
        Ok(Identity {
            telegram_id,
            source,
        })
    }

    pub async fn require_admin(&self, headers: &HeaderMap) -> Result<Identity, AccessError> {
        let identity = self.require_authenticated(headers).await?;
        if !self.roles.is_admin(identity.telegram_id).await? {
            debug!(subject_id = identity.telegram_id, "admin role denied");
            return Err(AccessError::Forbidden);
        }
        Ok(identity)
    }
}

/// Key used to store the caller's `Identity` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

/// Axum middleware: rejects unauthenticated requests with 401 and injects
/// `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = RequestAuthenticator::from_state(&state)
        .require_authenticated(request.headers())
        .await?;
    request.extensions_mut().insert(AuthenticatedUser(identity));
    Ok(next.run(request).await)
}

/// Axum middleware: like [`require_auth`], then 403 unless the caller is an admin.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = RequestAuthenticator::from_state(&state)
        .require_admin(request.headers())
        .await?;
    request.extensions_mut().insert(AuthenticatedUser(identity));
    Ok(next.run(request).await)
}

/// Extractor for any authenticated caller.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(AuthenticatedUser(identity)) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Self(identity.clone()));
        }
        let identity = RequestAuthenticator::from_state(state)
            .require_authenticated(&parts.headers)
            .await?;
        Ok(Self(identity))
    }
}

/// Extractor for an authenticated admin caller.
#[derive(Debug, Clone)]
pub struct Admin(pub Identity);

impl FromRequestParts<AppState> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = RequestAuthenticator::from_state(state)
            .require_admin(&parts.headers)
            .await?;
        Ok(Self(identity))
    }
}

/// Extractor that verifies the platform-signed launch data sent with the
/// request, from `x-telegram-init-data` or `Authorization: tma <data>`.
#[derive(Debug, Clone)]
pub struct VerifiedLaunch(pub VerifiedInitData);

impl FromRequestParts<AppState> for VerifiedLaunch {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = launch_data_from_headers(&parts.headers).ok_or_else(AppError::reauthenticate)?;
        Ok(Self(verify_launch(&state.launch, raw)?))
    }
}

fn verify_launch(verifier: &InitDataVerifier, raw: &str) -> Result<VerifiedInitData, AppError> {
    let data = verifier.verify(raw)?;
    debug!(subject_id = data.user.numeric_id, "launch data verified");
    Ok(data)
}

/// Raw launch data from the request headers, if any.
pub fn launch_data_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(raw) = headers.get(INIT_DATA_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(raw);
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(INIT_DATA_SCHEME))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use axum::http::header::COOKIE;
    use chrono::Duration;
    use storefront_core::auth::roles::{AdminAllowList, MemoryRoleStore, RoleStore};
    use storefront_core::auth::sessions::MemorySessionStore;
    use storefront_core::models::auth::{Contact, PlatformIdentity};

    use super::*;

    fn stateless() -> SessionBackend {
        SessionBackend::Stateless {
            secret: "s3cret".into(),
        }
    }

    fn resolver(allow: &str) -> RoleResolver {
        RoleResolver::new(AdminAllowList::parse(allow), Arc::new(MemoryRoleStore::new()))
    }

    async fn cookie_headers(backend: &SessionBackend, id: i64) -> HeaderMap {
        let issued = backend
            .issue(&PlatformIdentity::from_id(id), Duration::hours(1), None, None)
            .await
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{ADMIN_COOKIE}={}", issued.cookie_value)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn no_credentials_is_unauthorized() {
        let backend = stateless();
        let roles = resolver("");
        let auth = RequestAuthenticator::new(&backend, &roles, true);
        let headers = HeaderMap::new();
        assert_eq!(auth.identify(&headers).await.unwrap(), IdentitySource::None);
        assert!(matches!(
            auth.require_authenticated(&headers).await,
            Err(AccessError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn signed_cookie_identifies_the_subject() {
        let backend = stateless();
        let roles = resolver("");
        let auth = RequestAuthenticator::new(&backend, &roles, false);
        let headers = cookie_headers(&backend, 42).await;

        let identity = auth.require_authenticated(&headers).await.unwrap();
        assert_eq!(identity.telegram_id, 42);
        assert_eq!(identity.source.label(), "signed_cookie");
    }

    #[tokio::test]
    async fn stored_session_cookie_identifies_the_subject() {
        let backend = SessionBackend::StoreBacked {
            store: Arc::new(MemorySessionStore::new()),
        };
        let roles = resolver("");
        let auth = RequestAuthenticator::new(&backend, &roles, false);
        let headers = cookie_headers(&backend, 7).await;

        let identity = auth.require_authenticated(&headers).await.unwrap();
        assert_eq!(identity.telegram_id, 7);
        assert!(matches!(identity.source, IdentitySource::StoredSession(_)));
    }

    #[tokio::test]
    async fn cookie_from_another_secret_falls_through() {
        let backend = stateless();
        let forger = SessionBackend::Stateless {
            secret: "other".into(),
        };
        let roles = resolver("");
        let auth = RequestAuthenticator::new(&backend, &roles, false);
        let headers = cookie_headers(&forger, 42).await;
        assert_eq!(auth.identify(&headers).await.unwrap(), IdentitySource::None);
    }

    #[tokio::test]
    async fn trusted_header_requires_opt_in() {
        let backend = stateless();
        let roles = resolver("");
        let mut headers = HeaderMap::new();
        headers.insert(TRUSTED_USER_HEADER, HeaderValue::from_static("42"));

        let closed = RequestAuthenticator::new(&backend, &roles, false);
        assert_eq!(closed.identify(&headers).await.unwrap(), IdentitySource::None);

        let open = RequestAuthenticator::new(&backend, &roles, true);
        assert_eq!(open.identify(&headers).await.unwrap(), IdentitySource::TrustedHeader(42));

        headers.insert(TRUSTED_USER_HEADER, HeaderValue::from_static("forty-two"));
        assert_eq!(open.identify(&headers).await.unwrap(), IdentitySource::None);
    }

    #[tokio::test]
    async fn valid_cookie_wins_over_header() {
        let backend = stateless();
        let roles = resolver("");
        let auth = RequestAuthenticator::new(&backend, &roles, true);
        let mut headers = cookie_headers(&backend, 42).await;
        headers.insert(TRUSTED_USER_HEADER, HeaderValue::from_static("99"));
        assert_eq!(auth.identify(&headers).await.unwrap().subject_id(), Some(42));
    }

    #[tokio::test]
    async fn admin_check_uses_allow_list_then_store() {
        let backend = stateless();
        let headers = cookie_headers(&backend, 42).await;

        let roles = resolver("42");
        let auth = RequestAuthenticator::new(&backend, &roles, false);
        assert_eq!(auth.require_admin(&headers).await.unwrap().telegram_id, 42);

        let roles = resolver("99");
        let auth = RequestAuthenticator::new(&backend, &roles, false);
        assert!(matches!(auth.require_admin(&headers).await, Err(AccessError::Forbidden)));

        let store = Arc::new(MemoryRoleStore::new());
        store.set_admin_flag(42, true).await.unwrap();
        let roles = RoleResolver::new(AdminAllowList::default(), store);
        let auth = RequestAuthenticator::new(&backend, &roles, false);
        assert!(auth.require_admin(&headers).await.is_ok());
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl RoleStore for BrokenStore {
        async fn admin_flag(&self, _: i64) -> Result<Option<bool>, AuthError> {
            Err(AuthError::StoreUnavailable("down".into()))
        }
        async fn set_admin_flag(&self, _: i64, _: bool) -> Result<(), AuthError> {
            Err(AuthError::StoreUnavailable("down".into()))
        }
        async fn record_contact(&self, _: &PlatformIdentity) -> Result<(), AuthError> {
            Err(AuthError::StoreUnavailable("down".into()))
        }
        async fn list_admins(&self) -> Result<Vec<Contact>, AuthError> {
            Err(AuthError::StoreUnavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn store_failure_never_grants_admin() {
        let backend = stateless();
        let headers = cookie_headers(&backend, 42).await;
        let roles = RoleResolver::new(AdminAllowList::default(), Arc::new(BrokenStore));
        let auth = RequestAuthenticator::new(&backend, &roles, false);
        assert!(matches!(auth.require_admin(&headers).await, Err(AccessError::Store(_))));
    }

    #[tokio::test]
    async fn extractors_guard_handlers() {
        use axum::Router;
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use axum::routing::get;
        use tower::ServiceExt;

        use crate::config::ApiConfig;

        async fn admin_only(Admin(identity): Admin) -> String {
            identity.telegram_id.to_string()
        }
        async fn anyone(Authenticated(identity): Authenticated) -> String {
            identity.telegram_id.to_string()
        }

        let state = AppState::in_memory(ApiConfig {
            admin_session_secret: "s3cret".into(),
            admin_ids: AdminAllowList::parse("42"),
            ..ApiConfig::default()
        });
        let admin_cookie = cookie_headers(&state.sessions, 42).await;
        let member_cookie = cookie_headers(&state.sessions, 7).await;
        let app = Router::new()
            .route("/admin", get(admin_only))
            .route("/anyone", get(anyone))
            .with_state(state);

        let call = |uri: &str, headers: &HeaderMap| {
            let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            *req.headers_mut() = headers.clone();
            app.clone().oneshot(req)
        };

        assert_eq!(call("/admin", &admin_cookie).await.unwrap().status(), StatusCode::OK);
        assert_eq!(call("/anyone", &member_cookie).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            call("/admin", &member_cookie).await.unwrap().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            call("/anyone", &HeaderMap::new()).await.unwrap().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn require_auth_layer_injects_identity() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use axum::routing::get;
        use axum::{Extension, Router};
        use tower::ServiceExt;

        use crate::config::ApiConfig;

        async fn whoami(Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>) -> String {
            format!("{}:{}", identity.telegram_id, identity.source.label())
        }

        let state = AppState::in_memory(ApiConfig {
            admin_session_secret: "s3cret".into(),
            ..ApiConfig::default()
        });
        let member_cookie = cookie_headers(&state.sessions, 7).await;
        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
            .with_state(state);

        let mut req = Request::builder().uri("/whoami").body(Body::empty()).unwrap();
        *req.headers_mut() = member_cookie;
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"7:signed_cookie");

        let req = Request::builder().uri("/whoami").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn launch_data_header_or_tma_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(launch_data_from_headers(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(launch_data_from_headers(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("tma auth_date=1&hash=x"));
        assert_eq!(launch_data_from_headers(&headers), Some("auth_date=1&hash=x"));

        headers.insert(INIT_DATA_HEADER, HeaderValue::from_static("user=1"));
        assert_eq!(launch_data_from_headers(&headers), Some("user=1"));
    }
}
