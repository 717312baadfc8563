//! API server configuration.

use storefront_core::auth::backend::SessionBackendKind;
use storefront_core::auth::init_data::DEFAULT_MAX_AGE_SECS;
use storefront_core::auth::roles::AdminAllowList;
use tracing::warn;

/// Default admin session lifetime: 7 days.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Default interval between expired-session sweeps: 10 minutes.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10 * 60;

/// Upper bound for any configured duration: 10 years.
pub const MAX_DURATION_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Bot token shared with the chat platform; signs launch data.
    pub bot_token: String,
    /// Secret for self-signed admin tokens.
    pub admin_session_secret: String,
    /// Platform ids that are always admins.
    pub admin_ids: AdminAllowList,
    /// Where admin sessions live.
    pub session_backend: SessionBackendKind,
    /// Admin cookie / session lifetime in seconds.
    pub session_ttl_secs: i64,
    /// Replay window for launch data in seconds.
    pub init_data_max_age_secs: i64,
    /// Honor `x-telegram-user-id`. Only safe when the edge strips the header
    /// from external traffic.
    pub trust_user_header: bool,
    /// Set the `Secure` attribute on the admin cookie.
    pub cookie_secure: bool,
    /// Seconds between expired-session sweeps (store-backed sessions only).
    pub sweep_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            pg_connection_url: "postgres://localhost:5432/storefront".into(),
            bot_token: String::new(),
            admin_session_secret: String::new(),
            admin_ids: AdminAllowList::default(),
            session_backend: SessionBackendKind::Stateless,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            init_data_max_age_secs: DEFAULT_MAX_AGE_SECS,
            trust_user_header: false,
            cookie_secure: true,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                      | Default                                  |
    /// |-------------------------------|------------------------------------------|
    /// | `BIND_ADDR`                   | `127.0.0.1:3100`                         |
    /// | `DATABASE_URL`                | `postgres://localhost:5432/storefront`   |
    /// | `TELEGRAM_BOT_TOKEN`          | empty (launch data is always rejected)   |
    /// | `ADMIN_SESSION_SECRET`        | empty (stateless login is refused)       |
    /// | `ADMIN_TELEGRAM_IDS`          | empty                                    |
    /// | `ADMIN_SESSION_BACKEND`       | `stateless` (or `store`)                 |
    /// | `ADMIN_SESSION_TTL_SECS`      | `604800`                                 |
    /// | `INIT_DATA_MAX_AGE_SECS`      | `86400`                                  |
    /// | `TRUST_TELEGRAM_USER_HEADER`  | `false`                                  |
    /// | `COOKIE_SECURE`               | `true`                                   |
    /// | `SESSION_SWEEP_INTERVAL_SECS` | `600`                                    |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (environment, test map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let session_backend = match lookup("ADMIN_SESSION_BACKEND") {
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!(error = %e, "falling back to stateless admin sessions");
                SessionBackendKind::Stateless
            }),
            None => defaults.session_backend,
        };

        let config = Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            pg_connection_url: lookup("DATABASE_URL").unwrap_or(defaults.pg_connection_url),
            bot_token: lookup("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            admin_session_secret: lookup("ADMIN_SESSION_SECRET").unwrap_or_default(),
            admin_ids: lookup("ADMIN_TELEGRAM_IDS")
                .map(|raw| AdminAllowList::parse(&raw))
                .unwrap_or_default(),
            session_backend,
            session_ttl_secs: secs_or(&lookup, "ADMIN_SESSION_TTL_SECS", defaults.session_ttl_secs),
            init_data_max_age_secs: secs_or(
                &lookup,
                "INIT_DATA_MAX_AGE_SECS",
                defaults.init_data_max_age_secs,
            ),
            trust_user_header: flag_or(&lookup, "TRUST_TELEGRAM_USER_HEADER", false),
            cookie_secure: flag_or(&lookup, "COOKIE_SECURE", true),
            sweep_interval_secs: secs_or(
                &lookup,
                "SESSION_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs as i64,
            ) as u64,
        };

        if config.bot_token.is_empty() {
            warn!("TELEGRAM_BOT_TOKEN is not set; all launch data will be rejected");
        }
        if config.session_backend == SessionBackendKind::Stateless
            && config.admin_session_secret.is_empty()
        {
            warn!("ADMIN_SESSION_SECRET is not set; admin login will fail");
        }
        if config.trust_user_header {
            warn!("x-telegram-user-id is trusted; the edge must strip it from external requests");
        }
        config
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "invalid number, using default");
            default
        }),
        None => default,
    }
}

/// A duration in seconds within `1..=MAX_DURATION_SECS`.
fn secs_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: i64) -> i64 {
    let secs = parse_or(lookup, key, default);
    if (1..=MAX_DURATION_SECS).contains(&secs) {
        secs
    } else {
        warn!(key, value = secs, "duration out of range, using default");
        default
    }
}

fn flag_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).as_deref().map(str::trim) {
        Some("1" | "true" | "TRUE" | "True" | "yes" | "on") => true,
        Some("0" | "false" | "FALSE" | "False" | "no" | "off") => false,
        _ => default,
    }
}
