//! # storefront_api
//!
//! HTTP API library for Storefront: mini-app login, admin session guards and
//! admin contact management.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use sqlx::PgPool;
use storefront_core::auth::backend::{SessionBackend, SessionBackendKind};
use storefront_core::auth::init_data::InitDataVerifier;
use storefront_core::auth::roles::{MemoryRoleStore, PgRoleStore, RoleResolver, RoleStore};
use storefront_core::auth::sessions::{MemorySessionStore, PgSessionStore, SessionStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, contacts, health, webapp};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// PostgreSQL connection pool; `None` when running on in-memory stores.
    pub pool: Option<PgPool>,
    /// Admin session strategy selected by configuration.
    pub sessions: SessionBackend,
    pub roles: RoleResolver,
    /// Launch-data verifier bound to the bot token.
    pub launch: InitDataVerifier,
}

impl AppState {
    /// Assemble state from explicit stores.
    pub fn new(
        config: ApiConfig,
        pool: Option<PgPool>,
        session_store: Arc<dyn SessionStore>,
        role_store: Arc<dyn RoleStore>,
    ) -> Self {
        let sessions = match config.session_backend {
            SessionBackendKind::Stateless => SessionBackend::Stateless {
                secret: config.admin_session_secret.clone(),
            },
            SessionBackendKind::StoreBacked => SessionBackend::StoreBacked {
                store: session_store,
            },
        };
        let roles = RoleResolver::new(config.admin_ids.clone(), role_store);
        let launch = InitDataVerifier::new(config.bot_token.clone(), config.init_data_max_age_secs);
        Self {
            config,
            pool,
            sessions,
            roles,
            launch,
        }
    }

    /// State backed by PostgreSQL.
    pub fn postgres(pool: PgPool, config: ApiConfig) -> Self {
        let session_store = Arc::new(PgSessionStore::new(pool.clone()));
        let role_store = Arc::new(PgRoleStore::new(pool.clone()));
        Self::new(config, Some(pool), session_store, role_store)
    }

    /// State backed by in-memory stores (tests, local runs without a database).
    pub fn in_memory(config: ApiConfig) -> Self {
        Self::new(
            config,
            None,
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryRoleStore::new()),
        )
    }
}

/// Run embedded database migrations.
///
/// Delegates to `storefront_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    storefront_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_TELEGRAM, post(auth::telegram_login_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::POST_WEBAPP_VERIFY, post(webapp::verify_handler));

    // Authenticated routes
    let authenticated = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Admin routes
    let admin = Router::new()
        .route(
            routes::GET_ADMIN_CONTACTS_ADMINS,
            get(contacts::list_admins_handler),
        )
        .route(
            routes::PUT_ADMIN_CONTACTS_ID_ADMIN,
            put(contacts::set_admin_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
