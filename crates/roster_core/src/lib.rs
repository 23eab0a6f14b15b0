//! Core domain logic for Roster.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod grouping;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use grouping::{generate_balanced_groups, generate_with_thread_rng};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::group::{
    DraftGroup, GeneratedGroup, GroupId, MemberId, Membership, PersistedGroup,
};
pub use model::person::{Person, PersonId, PersonValidationError};
pub use model::session::{Session, SessionId};
pub use repo::group_repo::{
    GroupRepoError, GroupRepoResult, GroupRepository, SqliteGroupRepository,
};
pub use repo::person_repo::{
    PersonListQuery, PersonRepository, RepoError, RepoResult, SqlitePersonRepository,
};
pub use repo::session_repo::{
    SessionRepoError, SessionRepoResult, SessionRepository, SqliteSessionRepository,
};
pub use service::board_service::{BoardError, BoardService, BoardState, RosterGroup};
pub use service::people_service::PeopleService;
pub use service::session_service::{
    CreateSessionRequest, CreatedSession, SessionService, SessionServiceError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
