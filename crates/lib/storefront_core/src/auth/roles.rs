//! Admin role resolution.
//!
//! Two sources, always consulted in this order:
//!
//! 1. the static allow-list from configuration (`ADMIN_TELEGRAM_IDS`), which
//!    needs no database and cannot be revoked by a database write;
//! 2. the persisted `contacts.is_admin` flag, defaulting to `false` when the
//!    identity has no row.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use tracing::debug;

use super::AuthError;
use crate::models::auth::{Contact, PlatformIdentity};

/// Static set of platform ids that are always admins.
///
/// Parsed once from the comma-separated configuration value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    ids: HashSet<String>,
}

impl AdminAllowList {
    /// Parse `"1, 2,3"`; blank entries are ignored.
    pub fn parse(raw: &str) -> Self {
        Self {
            ids: raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Exact string match.
    pub fn contains(&self, platform_id: &str) -> bool {
        self.ids.contains(platform_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in ascending string order.
    pub fn sorted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }
}

impl<S: AsRef<str>> FromIterator<S> for AdminAllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
}

/// Persistence for contacts and their admin flag.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// `Some(flag)` when the contact exists, `None` otherwise.
    async fn admin_flag(&self, telegram_id: i64) -> Result<Option<bool>, AuthError>;

    /// Set the admin flag, creating the contact row if needed.
    async fn set_admin_flag(&self, telegram_id: i64, is_admin: bool) -> Result<(), AuthError>;

    /// Insert or refresh a contact's profile fields. Never touches `is_admin`.
    async fn record_contact(&self, identity: &PlatformIdentity) -> Result<(), AuthError>;

    /// Contacts whose persisted flag is set.
    async fn list_admins(&self) -> Result<Vec<Contact>, AuthError>;
}

/// Decides whether a platform identity holds the admin role.
#[derive(Clone)]
pub struct RoleResolver {
    allow_list: Arc<AdminAllowList>,
    store: Arc<dyn RoleStore>,
}

impl RoleResolver {
    pub fn new(allow_list: AdminAllowList, store: Arc<dyn RoleStore>) -> Self {
        Self {
            allow_list: Arc::new(allow_list),
            store,
        }
    }

    /// Allow-list first (no store access), then the persisted flag.
    ///
    /// A store failure is returned as an error for ids outside the
    /// allow-list; it never grants admin.
    pub async fn is_admin(&self, platform_id: i64) -> Result<bool, AuthError> {
        if self.allow_list.contains(&platform_id.to_string()) {
            debug!(platform_id, "admin via allow-list");
            return Ok(true);
        }
        let flag = self.store.admin_flag(platform_id).await?;
        Ok(flag.unwrap_or(false))
    }

    pub fn allow_list(&self) -> &AdminAllowList {
        &self.allow_list
    }

    pub fn store(&self) -> &Arc<dyn RoleStore> {
        &self.store
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// `contacts` table store.
#[derive(Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn admin_flag(&self, telegram_id: i64) -> Result<Option<bool>, AuthError> {
        let flag =
            sqlx::query_scalar::<_, bool>("SELECT is_admin FROM contacts WHERE telegram_id = $1")
                .bind(telegram_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(flag)
    }

    async fn set_admin_flag(&self, telegram_id: i64, is_admin: bool) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO contacts (telegram_id, is_admin) VALUES ($1, $2) \
             ON CONFLICT (telegram_id) \
             DO UPDATE SET is_admin = EXCLUDED.is_admin, updated_at = now()",
        )
        .bind(telegram_id)
        .bind(is_admin)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_contact(&self, identity: &PlatformIdentity) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO contacts (telegram_id, username, first_name, last_name, language_code) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (telegram_id) DO UPDATE SET \
               username = EXCLUDED.username, \
               first_name = EXCLUDED.first_name, \
               last_name = EXCLUDED.last_name, \
               language_code = EXCLUDED.language_code, \
               updated_at = now()",
        )
        .bind(identity.numeric_id)
        .bind(&identity.username)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.language_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<Contact>, AuthError> {
        let rows = sqlx::query_as::<
            _,
            (
                i64,
                Option<String>,
                Option<String>,
                Option<String>,
                bool,
                DateTime<Utc>,
            ),
        >(
            "SELECT telegram_id, username, first_name, last_name, is_admin, updated_at \
             FROM contacts \
             WHERE is_admin \
             ORDER BY telegram_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(telegram_id, username, first_name, last_name, is_admin, updated_at)| Contact {
                    telegram_id,
                    username,
                    first_name,
                    last_name,
                    is_admin,
                    updated_at,
                },
            )
            .collect())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local contact store.
#[derive(Default)]
pub struct MemoryRoleStore {
    contacts: DashMap<i64, Contact>,
}

impl MemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn admin_flag(&self, telegram_id: i64) -> Result<Option<bool>, AuthError> {
        Ok(self.contacts.get(&telegram_id).map(|c| c.is_admin))
    }

    async fn set_admin_flag(&self, telegram_id: i64, is_admin: bool) -> Result<(), AuthError> {
        let now = Utc::now();
        self.contacts
            .entry(telegram_id)
            .and_modify(|c| {
                c.is_admin = is_admin;
                c.updated_at = now;
            })
            .or_insert_with(|| Contact {
                telegram_id,
                username: None,
                first_name: None,
                last_name: None,
                is_admin,
                updated_at: now,
            });
        Ok(())
    }

    async fn record_contact(&self, identity: &PlatformIdentity) -> Result<(), AuthError> {
        let now = Utc::now();
        self.contacts
            .entry(identity.numeric_id)
            .and_modify(|c| {
                c.username = identity.username.clone();
                c.first_name = identity.first_name.clone();
                c.last_name = identity.last_name.clone();
                c.updated_at = now;
            })
            .or_insert_with(|| Contact {
                telegram_id: identity.numeric_id,
                username: identity.username.clone(),
                first_name: identity.first_name.clone(),
                last_name: identity.last_name.clone(),
                is_admin: false,
                updated_at: now,
            });
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<Contact>, AuthError> {
        let mut admins: Vec<Contact> = self
            .contacts
            .iter()
            .filter(|c| c.is_admin)
            .map(|c| c.value().clone())
            .collect();
        admins.sort_by_key(|c| c.telegram_id);
        Ok(admins)
    }
}
