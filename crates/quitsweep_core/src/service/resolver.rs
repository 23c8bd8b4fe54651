//! Identity resolution for external quit rows.
//!
//! # Responsibility
//! - Map an email to an identity and its latest intake record.
//! - Cross-check declared names against the intake record.
//!
//! # Invariants
//! - Read-only: never mutates storage.
//! - A name mismatch is reported separately from not-found conditions.

use crate::model::identity::{ContactRecord, IntakeRecord, UserId};
use crate::model::quit_record::ExternalQuitRecord;
use crate::repo::identity_repo::IdentityRepository;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Identity matched for one quit row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    pub contact: ContactRecord,
    pub intake: IntakeRecord,
}

impl ResolvedIdentity {
    pub fn user_id(&self) -> UserId {
        self.contact.user_id
    }
}

/// Errors from identity resolution.
#[derive(Debug)]
pub enum ResolveError {
    /// No live contact record carries the email.
    ContactNotFound { email: String },
    /// The identity has no live intake record.
    IntakeNotFound { user_id: UserId },
    /// Declared names differ from the intake record's names.
    NameMismatch {
        user_id: UserId,
        declared: (String, String),
        recorded: (Option<String>, Option<String>),
    },
    Repo(RepoError),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContactNotFound { email } => write!(f, "no contact record for email `{email}`"),
            Self::IntakeNotFound { user_id } => {
                write!(f, "no intake record for user {user_id}")
            }
            Self::NameMismatch {
                user_id,
                declared,
                recorded,
            } => write!(
                f,
                "intake names for user {user_id} do not match: declared `{} {}`, recorded `{} {}`",
                declared.0,
                declared.1,
                recorded.0.as_deref().unwrap_or("<missing>"),
                recorded.1.as_deref().unwrap_or("<missing>"),
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ResolveError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Resolves external rows to internal identities.
pub struct IdentityResolver<R: IdentityRepository> {
    repo: R,
}

impl<R: IdentityRepository> IdentityResolver<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Resolves `email` to its identity and latest intake record.
    ///
    /// A blank email never matches.
    pub fn resolve(&self, email: &str) -> Result<ResolvedIdentity, ResolveError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ResolveError::ContactNotFound {
                email: email.to_string(),
            });
        }

        let contact = self
            .repo
            .find_contact_by_email(email)?
            .ok_or_else(|| ResolveError::ContactNotFound {
                email: email.to_string(),
            })?;
        let intake = self
            .repo
            .latest_intake_record(contact.user_id)?
            .ok_or(ResolveError::IntakeNotFound {
                user_id: contact.user_id,
            })?;

        Ok(ResolvedIdentity { contact, intake })
    }

    /// Resolves a quit row and cross-checks its names.
    pub fn resolve_record(
        &self,
        record: &ExternalQuitRecord,
    ) -> Result<ResolvedIdentity, ResolveError> {
        let resolved = self.resolve(&record.email)?;
        check_names(&resolved, &record.first_name, &record.last_name)?;
        Ok(resolved)
    }
}

/// Compares declared names with the intake record, case-insensitively.
///
/// A missing or non-string name in the intake metadata never matches.
pub fn check_names(
    resolved: &ResolvedIdentity,
    first_name: &str,
    last_name: &str,
) -> Result<(), ResolveError> {
    let recorded_first = resolved.intake.first_name();
    let recorded_last = resolved.intake.last_name();

    if names_match(first_name, recorded_first) && names_match(last_name, recorded_last) {
        return Ok(());
    }

    Err(ResolveError::NameMismatch {
        user_id: resolved.user_id(),
        declared: (first_name.to_string(), last_name.to_string()),
        recorded: (
            recorded_first.map(str::to_string),
            recorded_last.map(str::to_string),
        ),
    })
}

fn names_match(declared: &str, recorded: Option<&str>) -> bool {
    recorded.is_some_and(|recorded| declared.to_uppercase() == recorded.to_uppercase())
}
