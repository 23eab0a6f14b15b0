//! Group and membership domain model.
//!
//! # Responsibility
//! - Define the two parallel group representations: unsaved drafts holding
//!   full person records, and persisted groups holding thin membership rows.
//! - Define the commit payload shape sent to the persistence layer.
//!
//! # Invariants
//! - Within one set of groups (draft or persisted), each person appears in
//!   exactly one group.
//! - Member order inside a group is meaningful and preserved.

use crate::model::person::{Person, PersonId};
use crate::model::session::SessionId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a group (draft-local or persisted).
pub type GroupId = Uuid;

/// Stable identifier for a persisted membership row.
pub type MemberId = Uuid;

/// An unsaved group produced by generation, mutable only in memory.
///
/// Draft groups are superseded entirely once committed; the persisted set
/// fetched from the backend replaces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftGroup {
    /// Locally generated id, valid only for the lifetime of the draft.
    pub uuid: GroupId,
    /// User-facing group label, editable while drafting.
    pub group_name: String,
    /// Ordered member records.
    pub members: Vec<Person>,
}

impl DraftGroup {
    /// Creates an empty draft group with a locally generated id.
    ///
    /// Local id generation is a single capability: a v4 UUID, whose
    /// collision probability is negligible within one session's group
    /// count. Callers must not assume draft ids survive a commit.
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            group_name: group_name.into(),
            members: Vec::new(),
        }
    }
}

/// One persisted membership row linking a person into a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Stable membership row id.
    pub uuid: MemberId,
    /// Owning group.
    pub group_uuid: GroupId,
    /// Referenced person.
    pub person_uuid: PersonId,
    /// Zero-based position inside the owning group.
    pub position_index: i64,
    /// Resolved person record; `None` when the person has been
    /// soft-deleted since the membership was saved.
    pub person: Option<Person>,
}

/// A committed group as read back from the persistence layer.
///
/// Authoritative once a session has been generated and saved; edits go
/// through the backend and the full set is re-fetched afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedGroup {
    /// Stable group id.
    pub uuid: GroupId,
    /// Owning session.
    pub session_uuid: SessionId,
    /// User-facing group label.
    pub group_name: String,
    /// Memberships ordered by `position_index`.
    pub members: Vec<Membership>,
}

/// Wire shape for committing a draft: one entry per group, members as an
/// ordered person-id sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedGroup {
    /// Group label to persist.
    pub group_name: String,
    /// Ordered person ids.
    pub members: Vec<PersonId>,
}
