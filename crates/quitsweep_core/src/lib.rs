//! Core logic for quit-list reconciliation.
//! Resolves departing participants to identities, verifies their employer
//! association and soft-deletes everything they own.

pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{load_config, locate_config, AppConfig, ConfigError, ConfigSource};
pub use ingest::quit_csv::{read_quit_file, read_quit_rows, IngestError, SourceRow};
pub use logging::{default_log_level, flush_logging, init_logging, logging_status};
pub use model::association::{Association, AssociationError, AssociationKind, Role};
pub use model::identity::{ContactRecord, IntakeRecord, User, UserId, INTAKE_ENTITY_NAME};
pub use model::quit_record::{ExternalQuitRecord, QuitRecordError};
pub use repo::association_repo::{AssociationRepository, SqliteAssociationRepository};
pub use repo::identity_repo::{IdentityRepository, SqliteIdentityRepository};
pub use repo::soft_delete_repo::{CascadeTable, SoftDeleteRepository, SqliteSoftDeleteRepository};
pub use repo::{RepoError, RepoResult};
pub use service::batch::{
    BatchController, BatchOptions, BatchReport, RowError, RowReport, RowState, RowSuccess,
};
pub use service::cascade::{CascadeError, CascadeExecutor, CascadeSummary};
pub use service::resolver::{check_names, IdentityResolver, ResolveError, ResolvedIdentity};
pub use service::verifier::{AssociationVerifier, DeletionAuthorization, VerifyError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
