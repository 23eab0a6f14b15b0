//! People management use-case service.
//!
//! # Responsibility
//! - Provide stable CRUD entry points for the people directory.
//! - Normalize free-form input before it reaches persistence.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Empty optional fields are stored as absent, not as empty strings.

use crate::model::person::{Person, PersonId};
use crate::repo::person_repo::{PersonListQuery, PersonRepository, RepoResult};
use uuid::Uuid;

/// Use-case service wrapper for people CRUD operations.
pub struct PeopleService<R: PersonRepository> {
    repo: R,
}

impl<R: PersonRepository> PeopleService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a new person record.
    ///
    /// # Contract
    /// - `names` is trimmed; a blank value surfaces the repository's
    ///   validation error.
    /// - Returns the created stable person ID.
    pub fn create_person(
        &self,
        names: impl Into<String>,
        phone: Option<String>,
        notes: Option<String>,
    ) -> RepoResult<PersonId> {
        let person = build_person(Uuid::new_v4(), names.into(), phone, notes);
        self.repo.create_person(&person)
    }

    /// Replaces names/phone/notes of an existing person.
    ///
    /// Returns repository-level not-found or validation errors unchanged.
    pub fn update_person(
        &self,
        id: PersonId,
        names: impl Into<String>,
        phone: Option<String>,
        notes: Option<String>,
    ) -> RepoResult<()> {
        let person = build_person(id, names.into(), phone, notes);
        self.repo.update_person(&person)
    }

    /// Gets one person by ID with optional deleted-row visibility.
    pub fn get_person(&self, id: PersonId, include_deleted: bool) -> RepoResult<Option<Person>> {
        self.repo.get_person(id, include_deleted)
    }

    /// Lists people using search and ordering options.
    pub fn list_people(&self, query: &PersonListQuery) -> RepoResult<Vec<Person>> {
        self.repo.list_people(query)
    }

    /// Soft-deletes a person by ID.
    pub fn delete_person(&self, id: PersonId) -> RepoResult<()> {
        self.repo.soft_delete_person(id)
    }
}

fn build_person(
    uuid: PersonId,
    names: String,
    phone: Option<String>,
    notes: Option<String>,
) -> Person {
    let mut person = Person::with_id(uuid, names.trim());
    person.phone = normalize_optional(phone);
    person.notes = normalize_optional(notes);
    person
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
