//! Batch controller for quit-list reconciliation.
//!
//! # Responsibility
//! - Drive each row through resolve -> verify -> cascade.
//! - Own one transaction per row and classify every row outcome.
//! - Log one outcome line per row and a final summary.
//!
//! # Invariants
//! - Row index 0 is the header and is never processed.
//! - No transaction spans more than one row.
//! - A row failure rolls back that row only; the batch always continues.
//!
//! Row state machine:
//! `Pending -> Resolving -> Verifying -> Deleting -> Committed`, with any
//! failure ending in `Skipped`. Dry runs end in `RolledBack` instead of
//! `Committed`.

use crate::ingest::quit_csv::SourceRow;
use crate::logging::sanitize_message;
use crate::model::identity::UserId;
use crate::model::quit_record::{ExternalQuitRecord, QuitRecordError};
use crate::repo::association_repo::SqliteAssociationRepository;
use crate::repo::identity_repo::SqliteIdentityRepository;
use crate::repo::soft_delete_repo::SqliteSoftDeleteRepository;
use crate::repo::RepoError;
use crate::service::cascade::{CascadeError, CascadeExecutor, CascadeSummary};
use crate::service::resolver::{IdentityResolver, ResolveError};
use crate::service::verifier::{AssociationVerifier, VerifyError};
use log::{debug, error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const MAX_LOG_FIELD_CHARS: usize = 120;

/// Batch behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Run the whole pipeline per row, then roll back instead of committing.
    pub dry_run: bool,
}

/// Per-row processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Pending,
    Resolving,
    Verifying,
    Deleting,
    Committed,
    /// Dry-run terminal state: the cascade ran and was rolled back.
    RolledBack,
    Skipped,
}

impl RowState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::Verifying => "verifying",
            Self::Deleting => "deleting",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Skipped => "skipped",
        }
    }
}

/// Why a row was skipped.
#[derive(Debug)]
pub enum RowError {
    Malformed(QuitRecordError),
    Resolve(ResolveError),
    Verify(VerifyError),
    Cascade(CascadeError),
    /// The row transaction could not be opened or rolled back.
    Transaction(RepoError),
    Commit(RepoError),
}

impl RowError {
    /// State the row was in when it failed.
    pub fn failed_in(&self) -> RowState {
        match self {
            Self::Malformed(_) | Self::Transaction(_) => RowState::Pending,
            Self::Resolve(_) => RowState::Resolving,
            Self::Verify(_) => RowState::Verifying,
            Self::Cascade(_) | Self::Commit(_) => RowState::Deleting,
        }
    }

    /// Stable reason code used in outcome logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed_row",
            Self::Resolve(ResolveError::ContactNotFound { .. }) => "no_contact_match",
            Self::Resolve(ResolveError::IntakeNotFound { .. }) => "no_intake_record",
            Self::Resolve(ResolveError::NameMismatch { .. }) => "name_mismatch",
            Self::Verify(VerifyError::EmployerNotFound { .. }) => "no_employer_match",
            Self::Verify(VerifyError::AssociationNotFound { .. }) => "no_employer_association",
            Self::Resolve(ResolveError::Repo(_)) | Self::Verify(VerifyError::Repo(_)) => {
                "lookup_failed"
            }
            Self::Cascade(_) => "deletion_failed",
            Self::Transaction(_) => "transaction_failed",
            Self::Commit(_) => "commit_failed",
        }
    }

    /// Returns whether this is a business skip (bad row, no match, mismatch)
    /// rather than a storage failure.
    pub fn is_expected_skip(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_)
                | Self::Resolve(
                    ResolveError::ContactNotFound { .. }
                        | ResolveError::IntakeNotFound { .. }
                        | ResolveError::NameMismatch { .. }
                )
                | Self::Verify(
                    VerifyError::EmployerNotFound { .. } | VerifyError::AssociationNotFound { .. }
                )
        )
    }
}

impl Display for RowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "{err}"),
            Self::Resolve(err) => write!(f, "{err}"),
            Self::Verify(err) => write!(f, "{err}"),
            Self::Cascade(err) => write!(f, "{err}"),
            Self::Transaction(err) => write!(f, "row transaction failed: {err}"),
            Self::Commit(err) => write!(f, "commit failed: {err}"),
        }
    }
}

impl Error for RowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::Resolve(err) => Some(err),
            Self::Verify(err) => Some(err),
            Self::Cascade(err) => Some(err),
            Self::Transaction(err) | Self::Commit(err) => Some(err),
        }
    }
}

impl From<ResolveError> for RowError {
    fn from(value: ResolveError) -> Self {
        Self::Resolve(value)
    }
}

impl From<VerifyError> for RowError {
    fn from(value: VerifyError) -> Self {
        Self::Verify(value)
    }
}

impl From<CascadeError> for RowError {
    fn from(value: CascadeError) -> Self {
        Self::Cascade(value)
    }
}

/// A row whose identity was soft-deleted (or would have been, in a dry run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSuccess {
    pub user_id: UserId,
    pub employer_id: UserId,
    pub summary: CascadeSummary,
    pub dry_run: bool,
}

/// Outcome of one data row.
#[derive(Debug)]
pub struct RowReport {
    pub index: usize,
    pub line: Option<u64>,
    /// `None` when the row could not be parsed.
    pub record: Option<ExternalQuitRecord>,
    pub result: Result<RowSuccess, RowError>,
}

impl RowReport {
    pub fn state(&self) -> RowState {
        match &self.result {
            Ok(success) if success.dry_run => RowState::RolledBack,
            Ok(_) => RowState::Committed,
            Err(_) => RowState::Skipped,
        }
    }
}

/// Aggregated outcomes of one batch run, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub rows: Vec<RowReport>,
}

impl BatchReport {
    pub fn committed(&self) -> usize {
        self.count_state(RowState::Committed)
    }

    pub fn rolled_back(&self) -> usize {
        self.count_state(RowState::RolledBack)
    }

    pub fn skipped(&self) -> usize {
        self.count_state(RowState::Skipped)
    }

    /// Skip counts keyed by [`RowError::reason_code`].
    pub fn skipped_by_reason(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            if let Err(err) = &row.result {
                *counts.entry(err.reason_code()).or_insert(0) += 1;
            }
        }
        counts
    }

    fn count_state(&self, state: RowState) -> usize {
        self.rows.iter().filter(|row| row.state() == state).count()
    }
}

/// Row-by-row reconciliation over an injected connection.
pub struct BatchController<'conn> {
    conn: &'conn mut Connection,
    options: BatchOptions,
}

impl<'conn> BatchController<'conn> {
    pub fn new(conn: &'conn mut Connection, options: BatchOptions) -> Self {
        Self { conn, options }
    }

    /// Processes every data row; never stops on a row failure.
    pub fn process_batch<I>(&mut self, rows: I) -> BatchReport
    where
        I: IntoIterator<Item = SourceRow>,
    {
        let started_at = Instant::now();
        info!(
            "event=batch_start module=batch status=start dry_run={}",
            self.options.dry_run
        );

        let mut report = BatchReport::default();
        for row in rows {
            if row.index == 0 {
                debug!("event=header_skipped module=batch row=0");
                continue;
            }
            report.rows.push(self.process_row(row));
        }

        let skipped = report
            .skipped_by_reason()
            .into_iter()
            .map(|(reason, count)| format!("{reason}:{count}"))
            .collect::<Vec<_>>()
            .join(",");
        info!(
            "event=batch_done module=batch status=ok rows={} committed={} rolled_back={} skipped={} reasons={} duration_ms={}",
            report.rows.len(),
            report.committed(),
            report.rolled_back(),
            report.skipped(),
            if skipped.is_empty() { "-" } else { skipped.as_str() },
            started_at.elapsed().as_millis()
        );
        report
    }

    /// Processes one data row inside its own transaction.
    pub fn process_row(&mut self, row: SourceRow) -> RowReport {
        let report = match row.record {
            Ok(record) => {
                let result = self.run_row(row.index, &record);
                RowReport {
                    index: row.index,
                    line: row.line,
                    record: Some(record),
                    result,
                }
            }
            Err(err) => RowReport {
                index: row.index,
                line: row.line,
                record: None,
                result: Err(RowError::Malformed(err)),
            },
        };
        log_row_outcome(&report);
        report
    }

    fn run_row(
        &mut self,
        index: usize,
        record: &ExternalQuitRecord,
    ) -> Result<RowSuccess, RowError> {
        let dry_run = self.options.dry_run;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| RowError::Transaction(err.into()))?;

        match reconcile_row(&tx, index, record, now_epoch_ms()) {
            Ok(mut success) if dry_run => {
                tx.rollback()
                    .map_err(|err| RowError::Transaction(err.into()))?;
                success.dry_run = true;
                Ok(success)
            }
            Ok(success) => {
                // A failed COMMIT leaves the transaction open; dropping it rolls back.
                tx.commit().map_err(|err| RowError::Commit(err.into()))?;
                Ok(success)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!(
                        "event=row_rollback module=batch status=error row={} error={}",
                        index, rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}

fn reconcile_row(
    conn: &Connection,
    index: usize,
    record: &ExternalQuitRecord,
    deleted_at: i64,
) -> Result<RowSuccess, RowError> {
    trace_state(index, RowState::Resolving);
    let resolver = IdentityResolver::new(SqliteIdentityRepository::new(conn));
    let resolved = resolver.resolve_record(record)?;

    trace_state(index, RowState::Verifying);
    let verifier = AssociationVerifier::new(
        SqliteIdentityRepository::new(conn),
        SqliteAssociationRepository::new(conn),
    );
    let authorization = verifier.verify(resolved.user_id(), &record.company)?;

    trace_state(index, RowState::Deleting);
    let executor = CascadeExecutor::new(SqliteSoftDeleteRepository::new(conn));
    let summary = executor.soft_delete_all(&authorization, deleted_at)?;

    Ok(RowSuccess {
        user_id: authorization.participant(),
        employer_id: authorization.employer().user_id,
        summary,
        dry_run: false,
    })
}

fn trace_state(index: usize, state: RowState) {
    debug!(
        "event=row_state module=batch row={} state={}",
        index,
        state.as_str()
    );
}

fn log_row_outcome(report: &RowReport) {
    let (first_name, last_name, email, company, flagged) = match &report.record {
        Some(record) => (
            field(&record.first_name),
            field(&record.last_name),
            field(&record.email),
            field(&record.company),
            record.soft_deleted,
        ),
        None => ("-".into(), "-".into(), "-".into(), "-".into(), false),
    };
    let line = report
        .line
        .map_or_else(|| "-".to_string(), |line| line.to_string());

    match &report.result {
        Ok(success) => info!(
            "event=row_outcome module=batch status={} row={} line={} user_id={} first_name={} last_name={} email={} employer_id={} tables={} rows={} flagged={}",
            report.state().as_str(),
            report.index,
            line,
            success.user_id,
            first_name,
            last_name,
            email,
            success.employer_id,
            success.summary.tables_affected(),
            success.summary.rows_affected(),
            flagged
        ),
        Err(RowError::Cascade(err)) => error!(
            "event=row_outcome module=batch status=skipped reason=deletion_failed row={} line={} table={} first_name={} last_name={} company={} error={}",
            report.index,
            line,
            err.table,
            first_name,
            last_name,
            company,
            field(&err.source.to_string())
        ),
        Err(err) if err.is_expected_skip() => warn!(
            "event=row_outcome module=batch status=skipped reason={} state={} row={} line={} first_name={} last_name={} email={} company={} detail={}",
            err.reason_code(),
            err.failed_in().as_str(),
            report.index,
            line,
            first_name,
            last_name,
            email,
            company,
            field(&err.to_string())
        ),
        Err(err) => error!(
            "event=row_outcome module=batch status=skipped reason={} state={} row={} line={} first_name={} last_name={} email={} error={}",
            err.reason_code(),
            err.failed_in().as_str(),
            report.index,
            line,
            first_name,
            last_name,
            email,
            field(&err.to_string())
        ),
    }
}

fn field(value: &str) -> String {
    if value.is_empty() {
        return "\"\"".to_string();
    }
    let sanitized = sanitize_message(value, MAX_LOG_FIELD_CHARS);
    if sanitized.contains(' ') {
        format!("{sanitized:?}")
    } else {
        sanitized
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
