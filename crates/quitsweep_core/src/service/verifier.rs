//! Employer association verification.
//!
//! # Responsibility
//! - Confirm a `participant:employer` association between a resolved identity
//!   and the employer named on the quit row.
//! - Issue the [`DeletionAuthorization`] the cascade executor requires.
//!
//! # Invariants
//! - Read-only: never mutates storage.
//! - Both roles of the association must match, not just one side.
//! - A `DeletionAuthorization` can only be obtained from a successful verify.

use crate::model::association::{Association, AssociationKind, Role};
use crate::model::identity::{User, UserId};
use crate::repo::association_repo::AssociationRepository;
use crate::repo::identity_repo::IdentityRepository;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Proof that an identity passed association verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionAuthorization {
    participant: UserId,
    employer: User,
    association: Association,
}

impl DeletionAuthorization {
    /// Identity cleared for cascade deletion.
    pub fn participant(&self) -> UserId {
        self.participant
    }

    pub fn employer(&self) -> &User {
        &self.employer
    }

    pub fn association(&self) -> &Association {
        &self.association
    }
}

/// Errors from association verification.
#[derive(Debug)]
pub enum VerifyError {
    /// No live user carries the employer display name.
    EmployerNotFound { company: String },
    /// No live association links the participant to any matching employer.
    AssociationNotFound {
        participant: UserId,
        company: String,
    },
    Repo(RepoError),
}

impl Display for VerifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmployerNotFound { company } => {
                write!(f, "no employer user with display name `{company}`")
            }
            Self::AssociationNotFound {
                participant,
                company,
            } => write!(
                f,
                "no {} association between user {participant} and `{company}`",
                AssociationKind::PARTICIPANT_EMPLOYER
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VerifyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for VerifyError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Verifies participant/employer relationships before deletion.
pub struct AssociationVerifier<I: IdentityRepository, A: AssociationRepository> {
    identities: I,
    associations: A,
}

impl<I: IdentityRepository, A: AssociationRepository> AssociationVerifier<I, A> {
    pub fn new(identities: I, associations: A) -> Self {
        Self {
            identities,
            associations,
        }
    }

    /// Confirms `participant` is employed by a user named `employer_display_name`.
    ///
    /// Every live user with that display name is a candidate; the oldest
    /// candidate with a matching association wins.
    pub fn verify(
        &self,
        participant: UserId,
        employer_display_name: &str,
    ) -> Result<DeletionAuthorization, VerifyError> {
        let company = employer_display_name.trim();
        let candidates = if company.is_empty() {
            Vec::new()
        } else {
            self.identities.find_users_by_display_name(company)?
        };
        if candidates.is_empty() {
            return Err(VerifyError::EmployerNotFound {
                company: company.to_string(),
            });
        }

        for employer in candidates {
            let found = self.associations.find_association(
                AssociationKind::PARTICIPANT_EMPLOYER,
                participant,
                employer.user_id,
            )?;
            if let Some(association) = found {
                debug_assert_eq!(association.member(Role::Participant), Some(participant));
                return Ok(DeletionAuthorization {
                    participant,
                    employer,
                    association,
                });
            }
        }

        Err(VerifyError::AssociationNotFound {
            participant,
            company: company.to_string(),
        })
    }
}
