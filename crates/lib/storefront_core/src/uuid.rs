//! Time-ordered ids.
//!
//! `admin_sessions.id` is generated app-side as UUIDv7 so rows sort by
//! creation time.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
