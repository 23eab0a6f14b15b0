//! Session repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/list/get APIs over `sessions` storage.
//! - Own the default-date behavior for sessions created without a date.
//!
//! # Invariants
//! - Session listing is newest-first by `session_date_iso`, then uuid.
//! - Sessions are never deleted or renamed by this core.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::session::{Session, SessionId};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const SESSION_SELECT_SQL: &str = "SELECT
    uuid,
    session_name,
    session_date_iso
FROM sessions";

pub type SessionRepoResult<T> = Result<T, SessionRepoError>;

/// Errors from session repository operations.
#[derive(Debug)]
pub enum SessionRepoError {
    Db(DbError),
    NotFound(SessionId),
    InvalidData(String),
}

impl Display for SessionRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "session not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted session data: {message}"),
        }
    }
}

impl Error for SessionRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SessionRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SessionRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for session operations.
pub trait SessionRepository {
    /// Creates one session; a missing date defaults to the current UTC
    /// instant in ISO-8601 form. Returns the created record.
    fn create_session(
        &self,
        session_name: &str,
        session_date_iso: Option<&str>,
    ) -> SessionRepoResult<Session>;
    /// Loads one session by id.
    fn get_session(&self, id: SessionId) -> SessionRepoResult<Option<Session>>;
    /// Lists all sessions, newest first.
    fn list_sessions(&self) -> SessionRepoResult<Vec<Session>>;
}

/// SQLite-backed session repository.
pub struct SqliteSessionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> SessionRepoResult<Self> {
        ensure_session_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn create_session(
        &self,
        session_name: &str,
        session_date_iso: Option<&str>,
    ) -> SessionRepoResult<Session> {
        let uuid = Uuid::new_v4();
        match session_date_iso {
            Some(date) => {
                self.conn.execute(
                    "INSERT INTO sessions (uuid, session_name, session_date_iso)
                     VALUES (?1, ?2, ?3);",
                    params![uuid.to_string(), session_name, date],
                )?;
            }
            None => {
                self.conn.execute(
                    "INSERT INTO sessions (uuid, session_name, session_date_iso)
                     VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'));",
                    params![uuid.to_string(), session_name],
                )?;
            }
        }

        load_required_session(self.conn, uuid)
    }

    fn get_session(&self, id: SessionId) -> SessionRepoResult<Option<Session>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SESSION_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_session_row(row)?));
        }
        Ok(None)
    }

    fn list_sessions(&self) -> SessionRepoResult<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SESSION_SELECT_SQL} ORDER BY session_date_iso DESC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(parse_session_row(row)?);
        }
        Ok(sessions)
    }
}

fn load_required_session(conn: &Connection, uuid: SessionId) -> SessionRepoResult<Session> {
    let mut stmt = conn.prepare(&format!("{SESSION_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_session_row(row);
    }
    Err(SessionRepoError::NotFound(uuid))
}

fn parse_session_row(row: &Row<'_>) -> SessionRepoResult<Session> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        SessionRepoError::InvalidData(format!(
            "invalid uuid value `{uuid_text}` in sessions.uuid"
        ))
    })?;

    Ok(Session {
        uuid,
        session_name: row.get("session_name")?,
        session_date_iso: row.get("session_date_iso")?,
    })
}

fn ensure_session_connection_ready(conn: &Connection) -> SessionRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(SessionRepoError::InvalidData(format!(
            "session repository requires schema version {expected_version}, got {actual_version}"
        )));
    }
    Ok(())
}
