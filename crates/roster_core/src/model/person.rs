//! Person domain model.
//!
//! # Responsibility
//! - Define the canonical person record referenced by group memberships.
//! - Provide lifecycle helpers for soft-delete semantics.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another person.
//! - `names` is never blank for a valid record.
//! - `is_deleted` is the source of truth for tombstone state.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every person record.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type PersonId = Uuid;

/// Validation failures for person records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonValidationError {
    /// `names` is empty after trimming.
    BlankNames,
}

impl Display for PersonValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankNames => write!(f, "person names must not be blank"),
        }
    }
}

impl Error for PersonValidationError {}

/// Canonical person record.
///
/// Group generation and membership reconciliation treat people as read-only
/// references; only the people management flow mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Stable global ID used for memberships and auditing.
    pub uuid: PersonId,
    /// Display name(s). Required, non-blank.
    pub names: String,
    /// Optional contact phone, free-form.
    pub phone: Option<String>,
    /// Optional free-form notes.
    pub notes: Option<String>,
    /// Soft delete tombstone; deleted people drop out of listings and
    /// generation input but keep their saved memberships resolvable.
    pub is_deleted: bool,
}

impl Person {
    /// Creates a new person with a generated stable ID.
    pub fn new(names: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), names)
    }

    /// Creates a person with a caller-provided stable ID.
    ///
    /// Used by update paths where identity already exists externally.
    pub fn with_id(uuid: PersonId, names: impl Into<String>) -> Self {
        Self {
            uuid,
            names: names.into(),
            phone: None,
            notes: None,
            is_deleted: false,
        }
    }

    /// Checks record-level invariants before persistence.
    ///
    /// # Errors
    /// - `BlankNames` when `names` trims to empty.
    pub fn validate(&self) -> Result<(), PersonValidationError> {
        if self.names.trim().is_empty() {
            return Err(PersonValidationError::BlankNames);
        }
        Ok(())
    }

    /// Marks this person as softly deleted (tombstoned).
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }

    /// Clears the soft delete flag.
    pub fn restore(&mut self) {
        self.is_deleted = false;
    }

    /// Returns whether this person should be considered visible/active.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}
