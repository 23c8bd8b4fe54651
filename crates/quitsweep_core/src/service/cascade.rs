//! Cascade soft-delete across every table owned by one identity.
//!
//! # Responsibility
//! - Walk [`CascadeTable::ALL`] and soft-delete the identity's rows.
//! - Report per-table change counts.
//!
//! # Invariants
//! - Runs inside a caller-provided transaction; on error the caller must roll
//!   back, so partial cascades are never committed.
//! - Requires a [`DeletionAuthorization`]; there is no unverified delete path.
//! - Re-application is idempotent: first soft-delete timestamp wins.

use crate::model::identity::UserId;
use crate::repo::soft_delete_repo::{CascadeTable, SoftDeleteRepository};
use crate::repo::RepoError;
use crate::service::verifier::DeletionAuthorization;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result of one cascade run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeSummary {
    pub user_id: UserId,
    /// Epoch ms written to newly deleted rows.
    pub deleted_at: i64,
    /// Rows changed per table, in execution order.
    pub rows: Vec<(CascadeTable, usize)>,
}

impl CascadeSummary {
    /// Number of tables the cascade walked.
    pub fn tables_processed(&self) -> usize {
        self.rows.len()
    }

    /// Number of tables where at least one row changed.
    pub fn tables_affected(&self) -> usize {
        self.rows.iter().filter(|(_, changed)| *changed > 0).count()
    }

    pub fn rows_affected(&self) -> usize {
        self.rows.iter().map(|(_, changed)| changed).sum()
    }

    pub fn rows_in(&self, table: CascadeTable) -> usize {
        self.rows
            .iter()
            .find(|(current, _)| *current == table)
            .map_or(0, |(_, changed)| *changed)
    }
}

/// One table's soft-delete failed; the whole cascade is void.
#[derive(Debug)]
pub struct CascadeError {
    pub table: CascadeTable,
    pub source: RepoError,
}

impl Display for CascadeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to soft-delete `{}`: {}", self.table, self.source)
    }
}

impl Error for CascadeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Executes identity-wide soft deletes.
pub struct CascadeExecutor<R: SoftDeleteRepository> {
    repo: R,
}

impl<R: SoftDeleteRepository> CascadeExecutor<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Soft-deletes every row owned by the authorized participant.
    ///
    /// Stops at the first failing table.
    pub fn soft_delete_all(
        &self,
        authorization: &DeletionAuthorization,
        deleted_at: i64,
    ) -> Result<CascadeSummary, CascadeError> {
        let user_id = authorization.participant();
        let mut rows = Vec::with_capacity(CascadeTable::ALL.len());

        for table in CascadeTable::ALL {
            let changed = self
                .repo
                .soft_delete_for_user(table, user_id, deleted_at)
                .map_err(|source| CascadeError { table, source })?;
            debug!(
                "event=cascade_table module=cascade status=ok table={} user_id={} rows={}",
                table, user_id, changed
            );
            rows.push((table, changed));
        }

        Ok(CascadeSummary {
            user_id,
            deleted_at,
            rows,
        })
    }
}
