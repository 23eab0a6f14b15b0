use roster_core::db::migrations::latest_version;
use roster_core::db::{open_db, open_db_in_memory};
use roster_core::{Person, PersonRepository, SessionRepository, SqlitePersonRepository, SqliteSessionRepository};
use rusqlite::Connection;

fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});")).unwrap();
    let mut rows = stmt.query([]).unwrap();
    let mut columns = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        let column_name: String = row.get(1).unwrap();
        columns.push(column_name);
    }
    columns
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )
        .unwrap();
    exists == 1
}

#[test]
fn migrations_create_expected_tables() {
    let conn = open_db_in_memory().unwrap();

    for table in ["people", "sessions", "session_groups", "group_members"] {
        assert!(table_exists(&conn, table), "missing table `{table}`");
    }

    let member_columns = table_columns(&conn, "group_members");
    for column in ["uuid", "group_uuid", "session_uuid", "person_uuid", "position_index"] {
        assert!(
            member_columns.contains(&column.to_string()),
            "missing column `{column}` in group_members"
        );
    }
}

#[test]
fn user_version_matches_latest_migration() {
    let conn = open_db_in_memory().unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());
}

#[test]
fn reopening_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("roster.db");

    let person = Person::new("Persisted");
    {
        let conn = open_db(&db_path).unwrap();
        SqlitePersonRepository::try_new(&conn)
            .unwrap()
            .create_person(&person)
            .unwrap();
    }

    let conn = open_db(&db_path).unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());

    let loaded = SqlitePersonRepository::try_new(&conn)
        .unwrap()
        .get_person(person.uuid, false)
        .unwrap()
        .unwrap();
    assert_eq!(loaded.names, "Persisted");
}

#[test]
fn one_group_per_person_per_session_is_schema_enforced() {
    let conn = open_db_in_memory().unwrap();

    let person = Person::new("Unique");
    SqlitePersonRepository::try_new(&conn)
        .unwrap()
        .create_person(&person)
        .unwrap();
    let session = SqliteSessionRepository::try_new(&conn)
        .unwrap()
        .create_session("Cells", None)
        .unwrap();

    conn.execute(
        "INSERT INTO session_groups (uuid, session_uuid, group_name, sort_order)
         VALUES ('g-1', ?1, 'Group 1', 0), ('g-2', ?1, 'Group 2', 1);",
        [session.uuid.to_string()],
    )
    .unwrap();

    conn.execute(
        "INSERT INTO group_members (uuid, group_uuid, session_uuid, person_uuid, position_index)
         VALUES ('m-1', 'g-1', ?1, ?2, 0);",
        [session.uuid.to_string(), person.uuid.to_string()],
    )
    .unwrap();

    // A second membership for the same person in the same session must be
    // rejected by the UNIQUE constraint, whatever the group.
    let err = conn
        .execute(
            "INSERT INTO group_members (uuid, group_uuid, session_uuid, person_uuid, position_index)
             VALUES ('m-2', 'g-2', ?1, ?2, 0);",
            [session.uuid.to_string(), person.uuid.to_string()],
        )
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("unique"));
}
