//! Person repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `people` storage.
//! - Own the people-browser search behavior: accent-insensitive substring
//!   matching over names, phone and notes.
//!
//! # Invariants
//! - Write paths must call `Person::validate()` before SQL mutations.
//! - Listing excludes soft-deleted rows unless explicitly included.
//! - Listing order is deterministic: case-insensitive names, then uuid.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::person::{Person, PersonId, PersonValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PERSON_SELECT_SQL: &str = "SELECT
    uuid,
    names,
    phone,
    notes,
    is_deleted
FROM people";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for person persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(PersonValidationError),
    Db(DbError),
    NotFound(PersonId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "person not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted person data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<PersonValidationError> for RepoError {
    fn from(value: PersonValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing people.
#[derive(Debug, Clone, Default)]
pub struct PersonListQuery {
    /// Optional substring filter matched against names, phone and notes
    /// after search folding (lowercase, accents stripped).
    pub search: Option<String>,
    /// Reverses the name ordering when set.
    pub descending: bool,
    pub include_deleted: bool,
}

/// Repository interface for person CRUD operations.
pub trait PersonRepository {
    fn create_person(&self, person: &Person) -> RepoResult<PersonId>;
    fn update_person(&self, person: &Person) -> RepoResult<()>;
    fn get_person(&self, id: PersonId, include_deleted: bool) -> RepoResult<Option<Person>>;
    fn list_people(&self, query: &PersonListQuery) -> RepoResult<Vec<Person>>;
    fn soft_delete_person(&self, id: PersonId) -> RepoResult<()>;
}

/// SQLite-backed person repository.
pub struct SqlitePersonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersonRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_people_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PersonRepository for SqlitePersonRepository<'_> {
    fn create_person(&self, person: &Person) -> RepoResult<PersonId> {
        person.validate()?;

        self.conn.execute(
            "INSERT INTO people (
                uuid,
                names,
                phone,
                notes,
                is_deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                person.uuid.to_string(),
                person.names.as_str(),
                person.phone.as_deref(),
                person.notes.as_deref(),
                bool_to_int(person.is_deleted),
            ],
        )?;

        Ok(person.uuid)
    }

    fn update_person(&self, person: &Person) -> RepoResult<()> {
        person.validate()?;

        let changed = self.conn.execute(
            "UPDATE people
             SET
                names = ?1,
                phone = ?2,
                notes = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?4
               AND is_deleted = 0;",
            params![
                person.names.as_str(),
                person.phone.as_deref(),
                person.notes.as_deref(),
                person.uuid.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(person.uuid));
        }

        Ok(())
    }

    fn get_person(&self, id: PersonId, include_deleted: bool) -> RepoResult<Option<Person>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PERSON_SELECT_SQL}
             WHERE uuid = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_person_row(row)?));
        }

        Ok(None)
    }

    fn list_people(&self, query: &PersonListQuery) -> RepoResult<Vec<Person>> {
        let mut sql = format!("{PERSON_SELECT_SQL} WHERE 1 = 1");
        if !query.include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }
        sql.push_str(if query.descending {
            " ORDER BY names COLLATE NOCASE DESC, uuid ASC"
        } else {
            " ORDER BY names COLLATE NOCASE ASC, uuid ASC"
        });

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut people = Vec::new();

        while let Some(row) = rows.next()? {
            people.push(parse_person_row(row)?);
        }

        // Search folding happens above SQL on purpose: accent stripping is
        // application behavior, not a collation the storage layer provides.
        if let Some(search) = query.search.as_deref() {
            let needle = fold_search_text(search);
            if !needle.is_empty() {
                people.retain(|person| {
                    let haystack = fold_search_text(&format!(
                        "{} {} {}",
                        person.names,
                        person.phone.as_deref().unwrap_or(""),
                        person.notes.as_deref().unwrap_or(""),
                    ));
                    haystack.contains(&needle)
                });
            }
        }

        Ok(people)
    }

    fn soft_delete_person(&self, id: PersonId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE people
             SET
                is_deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND is_deleted = 0;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }
}

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex must compile"));

/// Folds text for accent-insensitive substring search: lowercase, strip
/// common Latin diacritics, collapse whitespace runs.
fn fold_search_text(value: &str) -> String {
    let lowered = value.to_lowercase();
    let folded: String = lowered.chars().map(fold_char).collect();
    WHITESPACE_RUN.replace_all(folded.trim(), " ").into_owned()
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in people.uuid"))
    })?;

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_deleted value `{other}` in people.is_deleted"
            )));
        }
    };

    let person = Person {
        uuid,
        names: row.get("names")?,
        phone: row.get("phone")?,
        notes: row.get("notes")?,
        is_deleted,
    };
    person.validate()?;
    Ok(person)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_people_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::InvalidData(format!(
            "people repository requires schema version {expected_version}, got {actual_version}"
        )));
    }

    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'people'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::InvalidData(
            "people repository requires table `people`".to_string(),
        ));
    }

    Ok(())
}
