use rand::rngs::StdRng;
use rand::SeedableRng;
use roster_core::db::open_db_in_memory;
use roster_core::{
    BoardError, BoardService, BoardState, GeneratedGroup, GroupId, GroupRepoError,
    GroupRepoResult, GroupRepository, PersistedGroup, Person, PersonId, PersonRepository, Session,
    SessionId, SessionRepository, SqliteGroupRepository, SqlitePersonRepository,
    SqliteSessionRepository,
};
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

fn setup_with_people(count: usize) -> (Connection, Session) {
    let conn = open_db_in_memory().unwrap();
    {
        let repo = SqlitePersonRepository::try_new(&conn).unwrap();
        for index in 0..count {
            repo.create_person(&Person::new(format!("Person {index}")))
                .unwrap();
        }
    }
    let session = SqliteSessionRepository::try_new(&conn)
        .unwrap()
        .create_session("Weekly cells", None)
        .unwrap();
    (conn, session)
}

/// Opens a board and commits a seeded 3-group draft over 7 people.
fn committed_board<'conn>(
    conn: &'conn Connection,
    session: &Session,
) -> BoardService<SqliteGroupRepository<'conn>> {
    let mut board = BoardService::open(
        SqliteGroupRepository::try_new(conn).unwrap(),
        session.uuid,
        None,
    )
    .unwrap();
    board
        .generate_with(3, &mut StdRng::seed_from_u64(21))
        .unwrap();
    board.commit_draft().unwrap();
    board
}

fn persisted_groups<R: GroupRepository>(board: &BoardService<R>) -> Vec<PersistedGroup> {
    match board.state() {
        BoardState::Persisted { groups } => groups.clone(),
        other => panic!("expected persisted state, got {other:?}"),
    }
}

fn all_person_ids(groups: &[PersistedGroup]) -> Vec<PersonId> {
    groups
        .iter()
        .flat_map(|group| group.members.iter().map(|member| member.person_uuid))
        .collect()
}

/// Test double that fails every save while delegating reads.
struct FailingSaveRepo<'conn> {
    inner: SqliteGroupRepository<'conn>,
}

impl GroupRepository for FailingSaveRepo<'_> {
    fn session_detail(&self, session_uuid: SessionId) -> GroupRepoResult<Vec<PersistedGroup>> {
        self.inner.session_detail(session_uuid)
    }

    fn save_generated(
        &self,
        _session_uuid: SessionId,
        _groups: &[GeneratedGroup],
    ) -> GroupRepoResult<()> {
        Err(GroupRepoError::InvalidData(
            "injected save failure".to_string(),
        ))
    }

    fn rename_group(&self, group_uuid: GroupId, group_name: &str) -> GroupRepoResult<()> {
        self.inner.rename_group(group_uuid, group_name)
    }

    fn swap_member(
        &self,
        from_group: GroupId,
        to_group: GroupId,
        person_uuid: PersonId,
        to_index: i64,
    ) -> GroupRepoResult<()> {
        self.inner
            .swap_member(from_group, to_group, person_uuid, to_index)
    }

    fn list_active_people(&self) -> GroupRepoResult<Vec<Person>> {
        self.inner.list_active_people()
    }
}

#[test]
fn commit_draft_persists_and_refetches() {
    let (conn, session) = setup_with_people(7);
    let mut board = BoardService::open(
        SqliteGroupRepository::try_new(&conn).unwrap(),
        session.uuid,
        None,
    )
    .unwrap();
    board
        .generate_with(3, &mut StdRng::seed_from_u64(21))
        .unwrap();

    // Snapshot the draft's identity sets per group name before committing.
    let draft_sets: BTreeMap<String, BTreeSet<PersonId>> = match board.state() {
        BoardState::Draft { groups } => groups
            .iter()
            .map(|group| {
                (
                    group.group_name.clone(),
                    group.members.iter().map(|person| person.uuid).collect(),
                )
            })
            .collect(),
        other => panic!("expected draft state, got {other:?}"),
    };

    board.commit_draft().unwrap();

    let groups = persisted_groups(&board);
    assert_eq!(groups.len(), 3);

    let persisted_sets: BTreeMap<String, BTreeSet<PersonId>> = groups
        .iter()
        .map(|group| {
            (
                group.group_name.clone(),
                group.members.iter().map(|member| member.person_uuid).collect(),
            )
        })
        .collect();
    assert_eq!(persisted_sets, draft_sets);

    for group in &groups {
        assert_eq!(group.session_uuid, session.uuid);
        for (index, member) in group.members.iter().enumerate() {
            assert_eq!(member.position_index, index as i64);
            assert!(member.person.is_some());
        }
    }
}

#[test]
fn commit_failure_keeps_draft_intact() {
    let (conn, session) = setup_with_people(6);
    let mut board = BoardService::open(
        FailingSaveRepo {
            inner: SqliteGroupRepository::try_new(&conn).unwrap(),
        },
        session.uuid,
        None,
    )
    .unwrap();
    board
        .generate_with(2, &mut StdRng::seed_from_u64(3))
        .unwrap();

    let state_before = board.state().clone();
    let payload_before = board.commit_payload().unwrap();

    let err = board.commit_draft().unwrap_err();
    assert!(matches!(err, BoardError::Repo(_)));

    // No partial commit: the draft and its serialized form are unchanged,
    // so a retry sends the identical payload.
    assert_eq!(board.state(), &state_before);
    assert_eq!(board.commit_payload().unwrap(), payload_before);

    let detail = SqliteGroupRepository::try_new(&conn)
        .unwrap()
        .session_detail(session.uuid)
        .unwrap();
    assert!(detail.is_empty());
}

#[test]
fn save_generated_rejects_already_generated_session() {
    let (conn, session) = setup_with_people(4);
    let _board = committed_board(&conn, &session);

    let repo = SqliteGroupRepository::try_new(&conn).unwrap();
    let err = repo
        .save_generated(
            session.uuid,
            &[GeneratedGroup {
                group_name: "Extra".to_string(),
                members: Vec::new(),
            }],
        )
        .unwrap_err();
    assert!(matches!(err, GroupRepoError::SessionAlreadyGenerated(id) if id == session.uuid));
}

#[test]
fn rename_persisted_group_round_trips() {
    let (conn, session) = setup_with_people(5);
    let mut board = committed_board(&conn, &session);

    let group_uuid = persisted_groups(&board)[0].uuid;
    board
        .rename_persisted_group(group_uuid, "  Renamed  ")
        .unwrap();

    let groups = persisted_groups(&board);
    let renamed = groups.iter().find(|group| group.uuid == group_uuid).unwrap();
    assert_eq!(renamed.group_name, "Renamed");
}

#[test]
fn rename_persisted_group_rejects_blank_name() {
    let (conn, session) = setup_with_people(5);
    let mut board = committed_board(&conn, &session);

    let group_uuid = persisted_groups(&board)[0].uuid;
    let err = board.rename_persisted_group(group_uuid, " ").unwrap_err();
    assert!(matches!(err, BoardError::InvalidGroupName));
}

#[test]
fn rename_unknown_persisted_group_fails() {
    let (conn, session) = setup_with_people(5);
    let mut board = committed_board(&conn, &session);

    let err = board
        .rename_persisted_group(Uuid::new_v4(), "Ghost")
        .unwrap_err();
    assert!(matches!(
        err,
        BoardError::Repo(GroupRepoError::GroupNotFound(_))
    ));
}

#[test]
fn move_persisted_moves_member_and_renumbers() {
    let (conn, session) = setup_with_people(7);
    let mut board = committed_board(&conn, &session);

    let groups = persisted_groups(&board);
    let from = groups[0].clone();
    let to = groups[1].clone();
    let person_uuid = from.members[0].person_uuid;

    // An oversized index appends.
    board
        .move_persisted(from.uuid, to.uuid, person_uuid, 99)
        .unwrap();

    let groups = persisted_groups(&board);
    let from_after = groups.iter().find(|group| group.uuid == from.uuid).unwrap();
    let to_after = groups.iter().find(|group| group.uuid == to.uuid).unwrap();

    assert_eq!(from_after.members.len(), from.members.len() - 1);
    assert_eq!(to_after.members.len(), to.members.len() + 1);
    assert_eq!(
        to_after.members.last().unwrap().person_uuid,
        person_uuid
    );
    for group in &groups {
        for (index, member) in group.members.iter().enumerate() {
            assert_eq!(member.position_index, index as i64);
        }
    }
    assert_eq!(all_person_ids(&groups).len(), 7);
}

#[test]
fn two_sequential_moves_last_write_wins() {
    let (conn, session) = setup_with_people(7);
    let mut board = committed_board(&conn, &session);

    let groups = persisted_groups(&board);
    let person_uuid = groups[0].members[0].person_uuid;
    let (g0, g1, g2) = (groups[0].uuid, groups[1].uuid, groups[2].uuid);

    board.move_persisted(g0, g1, person_uuid, 0).unwrap();
    board.move_persisted(g1, g2, person_uuid, 0).unwrap();

    // The second re-fetch is authoritative: the person sits exactly where
    // the last move put them, and nobody was duplicated or lost.
    let groups = persisted_groups(&board);
    let final_group = groups.iter().find(|group| group.uuid == g2).unwrap();
    assert_eq!(final_group.members[0].person_uuid, person_uuid);

    let ids = all_person_ids(&groups);
    assert_eq!(ids.len(), 7);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 7);
}

#[test]
fn swap_member_with_mismatched_from_group_moves_from_actual() {
    let (conn, session) = setup_with_people(7);
    let board = committed_board(&conn, &session);

    let groups = persisted_groups(&board);
    let person_uuid = groups[0].members[0].person_uuid;
    let claimed_from = groups[2].uuid;
    let to = groups[1].uuid;

    // The claimed source group is wrong; the membership row wins.
    let repo = SqliteGroupRepository::try_new(&conn).unwrap();
    repo.swap_member(claimed_from, to, person_uuid, 0).unwrap();

    let detail = repo.session_detail(session.uuid).unwrap();
    let target = detail.iter().find(|group| group.uuid == to).unwrap();
    assert_eq!(target.members[0].person_uuid, person_uuid);

    let ids = all_person_ids(&detail);
    assert_eq!(ids.len(), 7);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 7);
}

#[test]
fn swap_member_unknown_person_fails() {
    let (conn, session) = setup_with_people(4);
    let board = committed_board(&conn, &session);

    let groups = persisted_groups(&board);
    let repo = SqliteGroupRepository::try_new(&conn).unwrap();
    let ghost = Uuid::new_v4();
    let err = repo
        .swap_member(groups[0].uuid, groups[1].uuid, ghost, 0)
        .unwrap_err();
    assert!(matches!(err, GroupRepoError::MemberNotFound(id) if id == ghost));
}

#[test]
fn swap_member_unknown_target_group_fails() {
    let (conn, session) = setup_with_people(4);
    let board = committed_board(&conn, &session);

    let groups = persisted_groups(&board);
    let person_uuid = groups[0].members[0].person_uuid;
    let repo = SqliteGroupRepository::try_new(&conn).unwrap();
    let ghost = Uuid::new_v4();
    let err = repo
        .swap_member(groups[0].uuid, ghost, person_uuid, 0)
        .unwrap_err();
    assert!(matches!(err, GroupRepoError::GroupNotFound(id) if id == ghost));
}

#[test]
fn persisted_operations_are_invalid_while_drafting() {
    let (conn, session) = setup_with_people(4);
    let mut board = BoardService::open(
        SqliteGroupRepository::try_new(&conn).unwrap(),
        session.uuid,
        Some(2),
    )
    .unwrap();

    let err = board
        .move_persisted(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 0)
        .unwrap_err();
    assert!(matches!(
        err,
        BoardError::InvalidState {
            operation: "move_persisted",
            phase: "draft"
        }
    ));
}

#[test]
fn deleted_person_membership_resolves_to_none() {
    let (conn, session) = setup_with_people(4);
    let board = committed_board(&conn, &session);

    let groups = persisted_groups(&board);
    let deleted_person = groups[0].members[0].person_uuid;
    SqlitePersonRepository::try_new(&conn)
        .unwrap()
        .soft_delete_person(deleted_person)
        .unwrap();

    // A fresh open reads the authoritative set with the tombstoned person
    // left unresolved but the membership row intact.
    let reopened = BoardService::open(
        SqliteGroupRepository::try_new(&conn).unwrap(),
        session.uuid,
        None,
    )
    .unwrap();
    let groups = persisted_groups(&reopened);
    let member = groups[0]
        .members
        .iter()
        .find(|member| member.person_uuid == deleted_person)
        .unwrap();
    assert!(member.person.is_none());

    let roster = reopened.roster();
    assert!(roster
        .iter()
        .any(|group| group.member_names.iter().any(|name| name == "-")));
}

#[test]
fn commit_payload_matches_wire_shape() {
    let person_uuid = Uuid::new_v4();
    let payload = GeneratedGroup {
        group_name: "Group 1".to_string(),
        members: vec![person_uuid],
    };

    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(value["group_name"], "Group 1");
    assert_eq!(value["members"][0], person_uuid.to_string());

    let parsed: GeneratedGroup = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, payload);
}
