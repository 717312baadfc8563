//! Store-backed admin sessions.
//!
//! A session token is an opaque random string handed to the client in the
//! `tg_admin` cookie. It is unrelated to the self-signed tokens in
//! [`super::admin_token`]: a deployment uses one or the other (see
//! [`super::backend::SessionBackend`]). Only the SHA-256 of the token is
//! persisted.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::crypto::sha256_hex;
use crate::models::auth::SessionRecord;
use crate::uuid::uuidv7;

/// Length of a generated session token.
const SESSION_TOKEN_LEN: usize = 64;

/// Parameters for a new session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub subject_id: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub ttl: Duration,
}

/// Persistence for admin sessions.
///
/// Each call is a single-row (or single-statement) operation; implementations
/// need no cross-row locking. A lookup that races with `delete` or
/// `sweep_expired` simply returns `None`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a session with a freshly generated token.
    async fn create(&self, new_session: NewSession) -> Result<SessionRecord, AuthError>;

    /// Find a live session. Expired rows are filtered here, not only by the sweep.
    async fn find_by_token(&self, token: &str) -> Result<Option<SessionRecord>, AuthError>;

    /// Delete a session (logout). Unknown tokens are a no-op.
    async fn delete(&self, token: &str) -> Result<(), AuthError>;

    /// Delete every session of a subject, returning how many were removed.
    async fn delete_all_for_subject(&self, subject_id: i64) -> Result<u64, AuthError>;

    /// Delete all rows with `expires_at <= now`, returning how many were removed.
    async fn sweep_expired(&self) -> Result<u64, AuthError>;
}

/// Generate a random session token (64 alphanumeric chars).
pub fn generate_session_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn expiry_after(created_at: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AuthError> {
    created_at
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Internal("session ttl out of range".into()))
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// `admin_sessions` table store.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type SessionRow = (
    Uuid,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<String>,
    Option<String>,
);

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, new_session: NewSession) -> Result<SessionRecord, AuthError> {
        let token = generate_session_token();
        let id = uuidv7();
        let created_at = Utc::now();
        let expires_at = expiry_after(created_at, new_session.ttl)?;

        sqlx::query(
            "INSERT INTO admin_sessions \
             (id, subject_id, token_hash, created_at, expires_at, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(new_session.subject_id)
        .bind(sha256_hex(&token))
        .bind(created_at)
        .bind(expires_at)
        .bind(&new_session.ip_address)
        .bind(&new_session.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(SessionRecord {
            id,
            subject_id: new_session.subject_id,
            token,
            created_at,
            expires_at,
            ip_address: new_session.ip_address,
            user_agent: new_session.user_agent,
        })
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<SessionRecord>, AuthError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, subject_id, created_at, expires_at, ip_address, user_agent \
             FROM admin_sessions \
             WHERE token_hash = $1 AND expires_at > now()",
        )
        .bind(sha256_hex(token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, subject_id, created_at, expires_at, ip_address, user_agent)| SessionRecord {
                id,
                subject_id,
                token: token.to_string(),
                created_at,
                expires_at,
                ip_address,
                user_agent,
            },
        ))
    }

    async fn delete(&self, token: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM admin_sessions WHERE token_hash = $1")
            .bind(sha256_hex(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all_for_subject(&self, subject_id: i64) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE subject_id = $1")
            .bind(subject_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn sweep_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local store keyed by token hash. Sessions do not survive restarts.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[cfg(test)]
    fn set_expiry(&self, token: &str, expires_at: DateTime<Utc>) {
        if let Some(mut record) = self.sessions.get_mut(&sha256_hex(token)) {
            record.expires_at = expires_at;
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, new_session: NewSession) -> Result<SessionRecord, AuthError> {
        let token = generate_session_token();
        let created_at = Utc::now();
        let record = SessionRecord {
            id: uuidv7(),
            subject_id: new_session.subject_id,
            token: token.clone(),
            created_at,
            expires_at: expiry_after(created_at, new_session.ttl)?,
            ip_address: new_session.ip_address,
            user_agent: new_session.user_agent,
        };
        // The map never holds the plaintext token.
        self.sessions.insert(
            sha256_hex(&token),
            SessionRecord {
                token: String::new(),
                ..record.clone()
            },
        );
        Ok(record)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<SessionRecord>, AuthError> {
        let now = Utc::now();
        Ok(self
            .sessions
            .get(&sha256_hex(token))
            .filter(|record| record.expires_at > now)
            .map(|record| SessionRecord {
                token: token.to_string(),
                ..record.clone()
            }))
    }

    async fn delete(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.remove(&sha256_hex(token));
        Ok(())
    }

    async fn delete_all_for_subject(&self, subject_id: i64) -> Result<u64, AuthError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, record| record.subject_id != subject_id);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }

    async fn sweep_expired(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, record| record.expires_at > now);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

/// Periodically delete expired sessions until `cancel` fires.
///
/// Lookups already ignore expired rows; the sweep only reclaims space.
/// Failures are logged and retried on the next tick.
pub async fn run_sweeper(
    store: Arc<dyn SessionStore>,
    every: StdDuration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("session sweeper stopped");
                return;
            }
            _ = interval.tick() => {
                match store.sweep_expired().await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "swept expired admin sessions"),
                    Err(e) => warn!(error = %e, "admin session sweep failed"),
                }
            }
        }
    }
}
