//! Group membership repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the persistence operations the board reconciler depends on:
//!   session detail, batch save of generated groups, rename and member move.
//! - Keep SQL details and position renumbering inside the repository
//!   boundary.
//!
//! # Invariants
//! - `save_generated` persists all groups of a session in one transaction
//!   or none at all, and rejects a session that already has groups.
//! - `swap_member` resolves the source group from the person's current
//!   membership; member positions on both affected groups are contiguous
//!   from 0 after every move.
//! - Group listing is deterministic: `sort_order ASC, uuid ASC`; member
//!   listing is `position_index ASC, uuid ASC`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::group::{GeneratedGroup, GroupId, MemberId, Membership, PersistedGroup};
use crate::model::person::{Person, PersonId};
use crate::model::session::SessionId;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type GroupRepoResult<T> = Result<T, GroupRepoError>;

/// Errors from group membership repository operations.
#[derive(Debug)]
pub enum GroupRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target session does not exist.
    SessionNotFound(SessionId),
    /// Target group does not exist.
    GroupNotFound(GroupId),
    /// The person has no membership in the target session.
    MemberNotFound(PersonId),
    /// `save_generated` was called for a session that already has groups.
    SessionAlreadyGenerated(SessionId),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for GroupRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::MemberNotFound(id) => write!(f, "no membership for person: {id}"),
            Self::SessionAlreadyGenerated(id) => {
                write!(f, "session already has generated groups: {id}")
            }
            Self::InvalidData(message) => write!(f, "invalid group data: {message}"),
        }
    }
}

impl Error for GroupRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for GroupRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GroupRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the persistence operations behind a session
/// board.
///
/// This is the logical collaborator contract the reconciler consumes; the
/// SQLite implementation below is the reference backend, and the trait
/// keeps it swappable for a remote one.
pub trait GroupRepository {
    /// Loads the full persisted group set of one session, groups ordered by
    /// sort order and members by position.
    fn session_detail(&self, session_uuid: SessionId) -> GroupRepoResult<Vec<PersistedGroup>>;
    /// Persists a freshly generated group set for one session as a single
    /// atomic batch.
    fn save_generated(
        &self,
        session_uuid: SessionId,
        groups: &[GeneratedGroup],
    ) -> GroupRepoResult<()>;
    /// Renames one persisted group.
    fn rename_group(&self, group_uuid: GroupId, group_name: &str) -> GroupRepoResult<()>;
    /// Moves one person to `to_group` at the clamped `to_index`. The true
    /// source group is the person's current membership; `from_group` is
    /// the caller's belief and only used for mismatch diagnostics.
    fn swap_member(
        &self,
        from_group: GroupId,
        to_group: GroupId,
        person_uuid: PersonId,
        to_index: i64,
    ) -> GroupRepoResult<()>;
    /// Lists active people as generation input, ordered by name.
    fn list_active_people(&self) -> GroupRepoResult<Vec<Person>>;
}

/// SQLite-backed group membership repository.
pub struct SqliteGroupRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGroupRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> GroupRepoResult<Self> {
        ensure_group_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl GroupRepository for SqliteGroupRepository<'_> {
    fn session_detail(&self, session_uuid: SessionId) -> GroupRepoResult<Vec<PersistedGroup>> {
        ensure_session_exists(self.conn, session_uuid)?;

        let mut groups: Vec<PersistedGroup> = Vec::new();
        let mut index_by_group: HashMap<GroupId, usize> = HashMap::new();

        let mut stmt = self.conn.prepare(
            "SELECT uuid, group_name
             FROM session_groups
             WHERE session_uuid = ?1
             ORDER BY sort_order ASC, uuid ASC;",
        )?;
        let mut rows = stmt.query([session_uuid.to_string()])?;
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            let group_uuid = parse_uuid(&uuid_text, "session_groups.uuid")?;
            index_by_group.insert(group_uuid, groups.len());
            groups.push(PersistedGroup {
                uuid: group_uuid,
                session_uuid,
                group_name: row.get(1)?,
                members: Vec::new(),
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT
                m.uuid,
                m.group_uuid,
                m.person_uuid,
                m.position_index,
                p.names,
                p.phone,
                p.notes
             FROM group_members m
             LEFT JOIN people p
               ON p.uuid = m.person_uuid
              AND p.is_deleted = 0
             WHERE m.session_uuid = ?1
             ORDER BY m.position_index ASC, m.uuid ASC;",
        )?;
        let mut rows = stmt.query([session_uuid.to_string()])?;
        while let Some(row) = rows.next()? {
            let member_uuid_text: String = row.get(0)?;
            let group_uuid_text: String = row.get(1)?;
            let person_uuid_text: String = row.get(2)?;
            let member_uuid = parse_uuid(&member_uuid_text, "group_members.uuid")?;
            let group_uuid = parse_uuid(&group_uuid_text, "group_members.group_uuid")?;
            let person_uuid = parse_uuid(&person_uuid_text, "group_members.person_uuid")?;

            let names: Option<String> = row.get(4)?;
            let phone: Option<String> = row.get(5)?;
            let notes: Option<String> = row.get(6)?;
            let person = names.map(|names| Person {
                uuid: person_uuid,
                names,
                phone,
                notes,
                is_deleted: false,
            });

            let group_index = *index_by_group.get(&group_uuid).ok_or_else(|| {
                GroupRepoError::InvalidData(format!(
                    "membership {member_uuid} references group {group_uuid} outside its session"
                ))
            })?;
            groups[group_index].members.push(Membership {
                uuid: member_uuid,
                group_uuid,
                person_uuid,
                position_index: row.get(3)?,
                person,
            });
        }

        Ok(groups)
    }

    fn save_generated(
        &self,
        session_uuid: SessionId,
        groups: &[GeneratedGroup],
    ) -> GroupRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_session_exists(&tx, session_uuid)?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM session_groups WHERE session_uuid = ?1;",
            [session_uuid.to_string()],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(GroupRepoError::SessionAlreadyGenerated(session_uuid));
        }

        let mut member_count = 0usize;
        for (sort_order, group) in groups.iter().enumerate() {
            let group_uuid = Uuid::new_v4();
            tx.execute(
                "INSERT INTO session_groups (uuid, session_uuid, group_name, sort_order)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    group_uuid.to_string(),
                    session_uuid.to_string(),
                    group.group_name.as_str(),
                    sort_order as i64,
                ],
            )?;

            for (position_index, person_uuid) in group.members.iter().enumerate() {
                tx.execute(
                    "INSERT INTO group_members (
                        uuid,
                        group_uuid,
                        session_uuid,
                        person_uuid,
                        position_index
                    ) VALUES (?1, ?2, ?3, ?4, ?5);",
                    params![
                        Uuid::new_v4().to_string(),
                        group_uuid.to_string(),
                        session_uuid.to_string(),
                        person_uuid.to_string(),
                        position_index as i64,
                    ],
                )?;
                member_count += 1;
            }
        }

        tx.commit()?;
        info!(
            "event=save_generated module=repo status=ok session={} groups={} members={}",
            session_uuid,
            groups.len(),
            member_count
        );
        Ok(())
    }

    fn rename_group(&self, group_uuid: GroupId, group_name: &str) -> GroupRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE session_groups
             SET group_name = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![group_uuid.to_string(), group_name],
        )?;
        if changed == 0 {
            return Err(GroupRepoError::GroupNotFound(group_uuid));
        }
        info!("event=rename_group module=repo status=ok group={group_uuid}");
        Ok(())
    }

    fn swap_member(
        &self,
        from_group: GroupId,
        to_group: GroupId,
        person_uuid: PersonId,
        to_index: i64,
    ) -> GroupRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let session_uuid = group_session(&tx, to_group)?
            .ok_or(GroupRepoError::GroupNotFound(to_group))?;

        let membership: Option<(String, String)> = tx
            .query_row(
                "SELECT uuid, group_uuid
                 FROM group_members
                 WHERE session_uuid = ?1
                   AND person_uuid = ?2;",
                params![session_uuid.to_string(), person_uuid.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (member_uuid_text, source_group_text) =
            membership.ok_or(GroupRepoError::MemberNotFound(person_uuid))?;
        let member_uuid = parse_uuid(&member_uuid_text, "group_members.uuid")?;
        let source_group = parse_uuid(&source_group_text, "group_members.group_uuid")?;

        if source_group != from_group {
            warn!(
                "event=swap_member module=repo status=mismatch person={} claimed_from={} actual_from={}",
                person_uuid, from_group, source_group
            );
        }

        // Target order is computed before the row changes group so a
        // same-group move is a plain reorder.
        let mut target_ids = ordered_member_ids(&tx, to_group)?;
        target_ids.retain(|id| *id != member_uuid);
        let insert_at = to_index.clamp(0, target_ids.len() as i64) as usize;
        target_ids.insert(insert_at, member_uuid);

        tx.execute(
            "UPDATE group_members
             SET group_uuid = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![member_uuid.to_string(), to_group.to_string()],
        )?;

        renumber_members(&tx, &target_ids)?;

        if source_group != to_group {
            let source_ids = ordered_member_ids(&tx, source_group)?;
            renumber_members(&tx, &source_ids)?;
        }

        tx.commit()?;
        info!(
            "event=swap_member module=repo status=ok session={} person={} to_group={} to_index={}",
            session_uuid, person_uuid, to_group, insert_at
        );
        Ok(())
    }

    fn list_active_people(&self) -> GroupRepoResult<Vec<Person>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, names, phone, notes
             FROM people
             WHERE is_deleted = 0
             ORDER BY names COLLATE NOCASE ASC, uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut people = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            people.push(Person {
                uuid: parse_uuid(&uuid_text, "people.uuid")?,
                names: row.get(1)?,
                phone: row.get(2)?,
                notes: row.get(3)?,
                is_deleted: false,
            });
        }
        Ok(people)
    }
}

fn group_session(conn: &Connection, group_uuid: GroupId) -> GroupRepoResult<Option<SessionId>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT session_uuid
             FROM session_groups
             WHERE uuid = ?1;",
            [group_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|text| parse_uuid(&text, "session_groups.session_uuid"))
        .transpose()
}

fn ordered_member_ids(conn: &Connection, group_uuid: GroupId) -> GroupRepoResult<Vec<MemberId>> {
    let mut stmt = conn.prepare(
        "SELECT uuid
         FROM group_members
         WHERE group_uuid = ?1
         ORDER BY position_index ASC, uuid ASC;",
    )?;
    let mut rows = stmt.query([group_uuid.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "group_members.uuid")?);
    }
    Ok(ids)
}

fn renumber_members(conn: &Connection, ordered_ids: &[MemberId]) -> GroupRepoResult<()> {
    for (index, id) in ordered_ids.iter().enumerate() {
        conn.execute(
            "UPDATE group_members
             SET position_index = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), index as i64],
        )?;
    }
    Ok(())
}

fn ensure_session_exists(conn: &Connection, session_uuid: SessionId) -> GroupRepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sessions
            WHERE uuid = ?1
        );",
        [session_uuid.to_string()],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(GroupRepoError::SessionNotFound(session_uuid));
    }
    Ok(())
}

fn parse_uuid(value: &str, column: &'static str) -> GroupRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| GroupRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_group_connection_ready(conn: &Connection) -> GroupRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(GroupRepoError::InvalidData(format!(
            "group repository requires schema version {expected_version}, got {actual_version}"
        )));
    }

    for table in ["session_groups", "group_members"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(GroupRepoError::InvalidData(format!(
                "group repository requires table `{table}`"
            )));
        }
    }

    Ok(())
}
