//! Session board use-case service: the membership reconciler.
//!
//! # Responsibility
//! - Own the per-session membership state machine:
//!   ungenerated -> draft -> persisted, with draft cancel back to
//!   ungenerated.
//! - Apply move/rename operations to whichever representation is active:
//!   drafts mutate locally, persisted groups go through the backend and a
//!   mandatory re-fetch.
//!
//! # Invariants
//! - Draft moves never duplicate or drop a person; total member count is
//!   constant across a move.
//! - A failed backend call leaves the current state untouched, so a retry
//!   of `commit_draft` serializes the identical payload.
//! - The persisted group vector is only ever replaced wholesale by a
//!   re-fetch, never spliced locally. Render layers draw purely from
//!   `state()` after each call, which is what makes a drag gesture's own
//!   transient reordering safe to discard.
//! - Backend-touching operations take `&mut self`; the exclusive borrow
//!   serializes persistence-affecting calls per board.

use crate::grouping::generate_balanced_groups;
use crate::model::group::{DraftGroup, GeneratedGroup, GroupId, PersistedGroup};
use crate::model::person::{Person, PersonId};
use crate::model::session::SessionId;
use crate::repo::group_repo::{GroupRepoError, GroupRepository};
use log::{info, warn};
use rand::Rng;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Membership presentation of one session.
///
/// Draft and persisted groups are mutually exclusive views; a session is in
/// exactly one of these at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardState {
    /// No groups exist yet, locally or persisted.
    Ungenerated,
    /// Locally generated groups, not yet saved.
    Draft { groups: Vec<DraftGroup> },
    /// Committed groups as last read from the backend.
    Persisted { groups: Vec<PersistedGroup> },
}

impl BoardState {
    fn phase_name(&self) -> &'static str {
        match self {
            Self::Ungenerated => "ungenerated",
            Self::Draft { .. } => "draft",
            Self::Persisted { .. } => "persisted",
        }
    }
}

/// Errors from board operations.
#[derive(Debug)]
pub enum BoardError {
    /// Operation is not valid in the current phase.
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },
    /// Group name is blank after trim.
    InvalidGroupName,
    /// Requested group count is below 1.
    InvalidGroupCount(usize),
    /// A move or rename referenced a group id not present in the draft.
    UnknownGroup(GroupId),
    /// A draft move referenced a source index past the end of its group.
    MemberIndexOutOfRange {
        group_uuid: GroupId,
        index: usize,
        len: usize,
    },
    /// Repository-level failure.
    Repo(GroupRepoError),
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidState { operation, phase } => {
                write!(f, "operation `{operation}` is not valid in phase `{phase}`")
            }
            Self::InvalidGroupName => write!(f, "group name must not be blank"),
            Self::InvalidGroupCount(count) => {
                write!(f, "group count must be at least 1, got {count}")
            }
            Self::UnknownGroup(id) => write!(f, "group not present on board: {id}"),
            Self::MemberIndexOutOfRange {
                group_uuid,
                index,
                len,
            } => write!(
                f,
                "member index {index} out of range for group {group_uuid} of size {len}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GroupRepoError> for BoardError {
    fn from(value: GroupRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Export read-model: one group as handed to a roster renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterGroup {
    pub group_name: String,
    /// Display names in member order; a membership whose person record is
    /// gone renders as a placeholder dash.
    pub member_names: Vec<String>,
}

/// Per-session board controller.
///
/// One instance owns the group state of one open session; it is not shared
/// between sessions and holds no global state.
pub struct BoardService<R: GroupRepository> {
    repo: R,
    session_uuid: SessionId,
    people: Vec<Person>,
    state: BoardState,
}

impl<R: GroupRepository> BoardService<R> {
    /// Opens the board for one session: loads the persisted group set and
    /// the active people snapshot used as generation input.
    ///
    /// When the session has no persisted groups and `auto_generate_count`
    /// is `Some(n >= 1)` with people available, a draft is generated
    /// immediately so a freshly created session needs no second action.
    pub fn open(
        repo: R,
        session_uuid: SessionId,
        auto_generate_count: Option<usize>,
    ) -> Result<Self, BoardError> {
        let groups = repo.session_detail(session_uuid)?;
        let people = repo.list_active_people()?;
        let state = if groups.is_empty() {
            BoardState::Ungenerated
        } else {
            BoardState::Persisted { groups }
        };
        let mut board = Self {
            repo,
            session_uuid,
            people,
            state,
        };

        if matches!(board.state, BoardState::Ungenerated) {
            if let Some(count) = auto_generate_count {
                if count >= 1 && !board.people.is_empty() {
                    board.generate(count)?;
                }
            }
        }

        Ok(board)
    }

    /// Returns the current membership presentation for rendering.
    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn session_uuid(&self) -> SessionId {
        self.session_uuid
    }

    /// Returns the people snapshot loaded at open time.
    pub fn people(&self) -> &[Person] {
        &self.people
    }

    /// Generates a draft over the people snapshot using the thread RNG.
    ///
    /// Valid only while ungenerated; transitions to draft.
    pub fn generate(&mut self, count: usize) -> Result<(), BoardError> {
        self.generate_with(count, &mut rand::thread_rng())
    }

    /// Generates a draft with a caller-supplied RNG (seedable in tests).
    pub fn generate_with<G: Rng>(&mut self, count: usize, rng: &mut G) -> Result<(), BoardError> {
        self.ensure_ungenerated("generate")?;
        if count < 1 {
            return Err(BoardError::InvalidGroupCount(count));
        }

        let groups = generate_balanced_groups(&self.people, count, rng);
        info!(
            "event=board_generate module=board status=ok session={} groups={} people={}",
            self.session_uuid,
            groups.len(),
            self.people.len()
        );
        self.state = BoardState::Draft { groups };
        Ok(())
    }

    /// Renames one draft group. Pure local mutation.
    pub fn rename_draft_group(
        &mut self,
        group_uuid: GroupId,
        group_name: impl Into<String>,
    ) -> Result<(), BoardError> {
        let normalized = normalize_group_name(group_name.into())?;
        let groups = self.draft_groups_mut("rename_draft_group")?;
        let group = groups
            .iter_mut()
            .find(|group| group.uuid == group_uuid)
            .ok_or(BoardError::UnknownGroup(group_uuid))?;
        group.group_name = normalized;
        Ok(())
    }

    /// Moves the draft member at `from_index` of `from_group` to
    /// `to_index` of `to_group` (same-group reorder included).
    ///
    /// # Contract
    /// - Equal source and destination coordinates return without touching
    ///   the draft.
    /// - `to_index` is clamped into `[0, target_len]` after removal; an
    ///   index equal to the new length appends.
    /// - Unknown ids or an out-of-range source index leave the draft
    ///   untouched and surface as errors.
    pub fn move_draft(
        &mut self,
        from_group: GroupId,
        from_index: usize,
        to_group: GroupId,
        to_index: usize,
    ) -> Result<(), BoardError> {
        let session_uuid = self.session_uuid;
        let groups = self.draft_groups_mut("move_draft")?;

        let from_pos = groups
            .iter()
            .position(|group| group.uuid == from_group)
            .ok_or_else(|| {
                warn!(
                    "event=board_move module=board status=unknown_group session={session_uuid} group={from_group}"
                );
                BoardError::UnknownGroup(from_group)
            })?;
        let to_pos = groups
            .iter()
            .position(|group| group.uuid == to_group)
            .ok_or_else(|| {
                warn!(
                    "event=board_move module=board status=unknown_group session={session_uuid} group={to_group}"
                );
                BoardError::UnknownGroup(to_group)
            })?;

        if from_group == to_group && from_index == to_index {
            return Ok(());
        }

        let from_len = groups[from_pos].members.len();
        if from_index >= from_len {
            warn!(
                "event=board_move module=board status=index_out_of_range session={session_uuid} group={from_group} index={from_index} len={from_len}"
            );
            return Err(BoardError::MemberIndexOutOfRange {
                group_uuid: from_group,
                index: from_index,
                len: from_len,
            });
        }

        let moved = groups[from_pos].members.remove(from_index);
        let insert_at = to_index.min(groups[to_pos].members.len());
        groups[to_pos].members.insert(insert_at, moved);
        Ok(())
    }

    /// Discards the draft and returns to ungenerated.
    pub fn cancel_draft(&mut self) -> Result<(), BoardError> {
        self.draft_groups_mut("cancel_draft")?;
        info!(
            "event=board_cancel module=board status=ok session={}",
            self.session_uuid
        );
        self.state = BoardState::Ungenerated;
        Ok(())
    }

    /// Serializes the current draft as the commit wire shape.
    ///
    /// Stable across retries while the draft is unchanged.
    pub fn commit_payload(&self) -> Result<Vec<GeneratedGroup>, BoardError> {
        let groups = self.draft_groups("commit_draft")?;
        Ok(groups
            .iter()
            .map(|group| GeneratedGroup {
                group_name: group.group_name.clone(),
                members: group.members.iter().map(|person| person.uuid).collect(),
            })
            .collect())
    }

    /// Commits the draft as one atomic batch, then replaces it with the
    /// re-fetched authoritative persisted set.
    ///
    /// The save response is not trusted as the new source of truth; a
    /// follow-up read is. On failure the draft stays intact and the caller
    /// may retry.
    pub fn commit_draft(&mut self) -> Result<(), BoardError> {
        let payload = self.commit_payload()?;
        self.repo.save_generated(self.session_uuid, &payload)?;

        let groups = self.repo.session_detail(self.session_uuid)?;
        info!(
            "event=board_commit module=board status=ok session={} groups={}",
            self.session_uuid,
            groups.len()
        );
        self.state = BoardState::Persisted { groups };
        Ok(())
    }

    /// Renames one persisted group through the backend, then re-fetches.
    ///
    /// Never applied optimistically; the display state after this call is
    /// whatever the backend returned.
    pub fn rename_persisted_group(
        &mut self,
        group_uuid: GroupId,
        group_name: impl Into<String>,
    ) -> Result<(), BoardError> {
        let normalized = normalize_group_name(group_name.into())?;
        self.ensure_persisted("rename_persisted_group")?;
        self.repo.rename_group(group_uuid, &normalized)?;
        self.refresh_persisted()
    }

    /// Moves one person between persisted groups through the backend, then
    /// re-fetches.
    ///
    /// The move identifies the person, not a source position; the backend
    /// infers the true source group from current membership. Never applied
    /// optimistically.
    pub fn move_persisted(
        &mut self,
        from_group: GroupId,
        to_group: GroupId,
        person_uuid: PersonId,
        to_index: i64,
    ) -> Result<(), BoardError> {
        self.ensure_persisted("move_persisted")?;
        self.repo
            .swap_member(from_group, to_group, person_uuid, to_index)?;
        self.refresh_persisted()
    }

    /// Builds the roster read-model for export rendering.
    ///
    /// Empty while ungenerated; otherwise one entry per group in display
    /// order.
    pub fn roster(&self) -> Vec<RosterGroup> {
        match &self.state {
            BoardState::Ungenerated => Vec::new(),
            BoardState::Draft { groups } => groups
                .iter()
                .map(|group| RosterGroup {
                    group_name: group.group_name.clone(),
                    member_names: group
                        .members
                        .iter()
                        .map(|person| person.names.clone())
                        .collect(),
                })
                .collect(),
            BoardState::Persisted { groups } => groups
                .iter()
                .map(|group| RosterGroup {
                    group_name: group.group_name.clone(),
                    member_names: group
                        .members
                        .iter()
                        .map(|member| {
                            member
                                .person
                                .as_ref()
                                .map_or_else(|| "-".to_string(), |person| person.names.clone())
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn refresh_persisted(&mut self) -> Result<(), BoardError> {
        let groups = self.repo.session_detail(self.session_uuid)?;
        self.state = BoardState::Persisted { groups };
        Ok(())
    }

    fn ensure_ungenerated(&self, operation: &'static str) -> Result<(), BoardError> {
        match &self.state {
            BoardState::Ungenerated => Ok(()),
            other => Err(BoardError::InvalidState {
                operation,
                phase: other.phase_name(),
            }),
        }
    }

    fn ensure_persisted(&self, operation: &'static str) -> Result<(), BoardError> {
        match &self.state {
            BoardState::Persisted { .. } => Ok(()),
            other => Err(BoardError::InvalidState {
                operation,
                phase: other.phase_name(),
            }),
        }
    }

    fn draft_groups(&self, operation: &'static str) -> Result<&[DraftGroup], BoardError> {
        match &self.state {
            BoardState::Draft { groups } => Ok(groups),
            other => Err(BoardError::InvalidState {
                operation,
                phase: other.phase_name(),
            }),
        }
    }

    fn draft_groups_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut Vec<DraftGroup>, BoardError> {
        match &mut self.state {
            BoardState::Draft { groups } => Ok(groups),
            other => Err(BoardError::InvalidState {
                operation,
                phase: other.phase_name(),
            }),
        }
    }
}

fn normalize_group_name(value: String) -> Result<String, BoardError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BoardError::InvalidGroupName);
    }
    Ok(trimmed.to_string())
}
