//! Session domain model.
//!
//! A session is a dated grouping event. It is created once and never
//! mutated by core; its group membership lives in the group model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for every session record.
pub type SessionId = Uuid;

/// Canonical session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable global ID.
    pub uuid: SessionId,
    /// User-facing session label.
    pub session_name: String,
    /// Session date as an ISO-8601 string. Ordering sessions newest-first
    /// uses plain string comparison, which is valid for this format.
    pub session_date_iso: String,
}
