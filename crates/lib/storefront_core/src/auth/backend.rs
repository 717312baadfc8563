//! Admin session strategies behind one interface.
//!
//! - `Stateless`: the cookie carries a self-signed [`admin_token`] token.
//!   Nothing is written at login; a token cannot be revoked before it expires.
//! - `StoreBacked`: the cookie carries an opaque token from a
//!   [`SessionStore`]; logout and demotion delete the row immediately.
//!
//! The cookie value is always exactly one of the two, never a mix.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::AuthError;
use super::admin_token;
use super::sessions::{NewSession, SessionStore};
use crate::models::auth::{AdminTokenPayload, PlatformIdentity, SessionRecord};

/// Which strategy a deployment uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionBackendKind {
    #[default]
    Stateless,
    StoreBacked,
}

impl FromStr for SessionBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stateless" | "token" => Ok(Self::Stateless),
            "store" | "database" | "db" => Ok(Self::StoreBacked),
            other => Err(format!("unknown session backend '{other}'")),
        }
    }
}

impl fmt::Display for SessionBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stateless => f.write_str("stateless"),
            Self::StoreBacked => f.write_str("store"),
        }
    }
}

/// A credential freshly issued at login.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Value to place in the admin cookie.
    pub cookie_value: String,
    pub expires_at: DateTime<Utc>,
}

/// What a valid cookie resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSubject {
    Signed(AdminTokenPayload),
    Stored(SessionRecord),
}

impl SessionSubject {
    pub fn subject_id(&self) -> i64 {
        match self {
            Self::Signed(payload) => payload.subject,
            Self::Stored(record) => record.subject_id,
        }
    }
}

/// Session strategy.
#[derive(Clone)]
pub enum SessionBackend {
    Stateless { secret: String },
    StoreBacked { store: Arc<dyn SessionStore> },
}

impl SessionBackend {
    pub fn kind(&self) -> SessionBackendKind {
        match self {
            Self::Stateless { .. } => SessionBackendKind::Stateless,
            Self::StoreBacked { .. } => SessionBackendKind::StoreBacked,
        }
    }

    /// Issue a cookie credential for a verified identity.
    pub async fn issue(
        &self,
        identity: &PlatformIdentity,
        ttl: Duration,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<IssuedSession, AuthError> {
        match self {
            Self::Stateless { secret } => {
                let payload = AdminTokenPayload::new(
                    identity.numeric_id,
                    identity.username.clone(),
                    ttl,
                    Utc::now(),
                )
                .ok_or_else(|| AuthError::Internal("session ttl out of range".into()))?;
                let token = admin_token::sign(&payload, secret)?;
                let expires_at = DateTime::from_timestamp_millis(payload.expires_at_ms)
                    .ok_or_else(|| AuthError::Internal("token expiry out of range".into()))?;
                Ok(IssuedSession {
                    cookie_value: token,
                    expires_at,
                })
            }
            Self::StoreBacked { store } => {
                let record = store
                    .create(NewSession {
                        subject_id: identity.numeric_id,
                        ip_address,
                        user_agent,
                        ttl,
                    })
                    .await?;
                Ok(IssuedSession {
                    cookie_value: record.token,
                    expires_at: record.expires_at,
                })
            }
        }
    }

    /// Resolve a cookie value against the current clock.
    ///
    /// `Ok(None)` means "not authenticated" (unknown, forged, or expired).
    /// Only a store failure is an error.
    pub async fn resolve(&self, cookie_value: &str) -> Result<Option<SessionSubject>, AuthError> {
        match self {
            Self::Stateless { secret } => {
                match admin_token::decode(cookie_value, secret, Utc::now().timestamp_millis()) {
                    Ok(payload) => Ok(Some(SessionSubject::Signed(payload))),
                    Err(e) => {
                        debug!(kind = e.kind(), "admin token rejected");
                        Ok(None)
                    }
                }
            }
            Self::StoreBacked { store } => Ok(store
                .find_by_token(cookie_value)
                .await?
                .map(SessionSubject::Stored)),
        }
    }

    /// Revoke a single cookie credential. A no-op for stateless tokens.
    pub async fn revoke(&self, cookie_value: &str) -> Result<(), AuthError> {
        match self {
            Self::Stateless { .. } => {
                debug!("stateless token cannot be revoked; cookie cleared only");
                Ok(())
            }
            Self::StoreBacked { store } => store.delete(cookie_value).await,
        }
    }

    /// Revoke every session of a subject. Returns the number revoked; always
    /// zero for stateless tokens, which stay valid until they expire.
    pub async fn revoke_subject(&self, subject_id: i64) -> Result<u64, AuthError> {
        match self {
            Self::Stateless { .. } => Ok(0),
            Self::StoreBacked { store } => store.delete_all_for_subject(subject_id).await,
        }
    }

    /// The backing store, when there is one.
    pub fn store(&self) -> Option<&Arc<dyn SessionStore>> {
        match self {
            Self::Stateless { .. } => None,
            Self::StoreBacked { store } => Some(store),
        }
    }
}
