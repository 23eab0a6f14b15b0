//! Session directory use-case service.
//!
//! # Responsibility
//! - Validate session input above the repository layer.
//! - Carry the optional auto-generate hint from session creation to the
//!   board's first open without persisting it.
//!
//! # Invariants
//! - Session names are non-blank after trimming.
//! - An auto-generate count, when present, is at least 1.

use crate::model::session::{Session, SessionId};
use crate::repo::session_repo::{SessionRepoError, SessionRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from session service operations.
#[derive(Debug)]
pub enum SessionServiceError {
    /// Session name is blank after trim.
    InvalidSessionName,
    /// Auto-generate hint present but below 1.
    InvalidGroupCount(usize),
    /// Repository-level failure.
    Repo(SessionRepoError),
}

impl Display for SessionServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSessionName => write!(f, "session name must not be blank"),
            Self::InvalidGroupCount(count) => {
                write!(f, "group count must be at least 1, got {count}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionRepoError> for SessionServiceError {
    fn from(value: SessionRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Request model for creating one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSessionRequest {
    /// User-facing session label. Required, non-blank.
    pub session_name: String,
    /// Optional explicit ISO-8601 date; defaults to now when absent.
    pub session_date_iso: Option<String>,
    /// Optional group count to generate on the board's first open, so a
    /// freshly created session does not need a second user action.
    pub auto_generate_count: Option<usize>,
}

/// A created session plus the non-persisted auto-generate hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub session: Session,
    pub auto_generate_count: Option<usize>,
}

/// Session directory service facade.
pub struct SessionService<R: SessionRepository> {
    repo: R,
}

impl<R: SessionRepository> SessionService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one session, validating name and hint.
    pub fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreatedSession, SessionServiceError> {
        let name = request.session_name.trim();
        if name.is_empty() {
            return Err(SessionServiceError::InvalidSessionName);
        }
        if let Some(count) = request.auto_generate_count {
            if count < 1 {
                return Err(SessionServiceError::InvalidGroupCount(count));
            }
        }

        let date = request
            .session_date_iso
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let session = self.repo.create_session(name, date)?;
        info!(
            "event=session_create module=session status=ok session={}",
            session.uuid
        );

        Ok(CreatedSession {
            session,
            auto_generate_count: request.auto_generate_count,
        })
    }

    /// Loads one session by id.
    pub fn get_session(&self, id: SessionId) -> Result<Option<Session>, SessionServiceError> {
        self.repo.get_session(id).map_err(Into::into)
    }

    /// Lists all sessions, newest first.
    pub fn list_sessions(&self) -> Result<Vec<Session>, SessionServiceError> {
        self.repo.list_sessions().map_err(Into::into)
    }
}
