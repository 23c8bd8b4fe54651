//! CSV reader for quit lists.
//!
//! # Invariants
//! - Only files with a `.csv` extension are accepted.
//! - Row indices are 0-based and include the header row.
//! - Undecodable or short rows become row-level errors; I/O failures are fatal.

use crate::model::quit_record::{ExternalQuitRecord, QuitRecordError};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::info;
use std::error::Error;
use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Extension a quit list must carry.
pub const QUIT_FILE_EXTENSION: &str = "csv";

/// One raw row read from a quit list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// 0-based record index; index 0 is the header.
    pub index: usize,
    /// 1-based line in the source, when known.
    pub line: Option<u64>,
    pub record: Result<ExternalQuitRecord, QuitRecordError>,
}

/// Fatal input errors; any of these aborts the run before processing.
#[derive(Debug)]
pub enum IngestError {
    UnsupportedExtension(PathBuf),
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Read {
        line: Option<u64>,
        source: csv::Error,
    },
}

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedExtension(path) => write!(
                f,
                "input file `{}` is not a .{QUIT_FILE_EXTENSION} file",
                path.display()
            ),
            Self::Open { path, source } => {
                write!(f, "failed to open input `{}`: {source}", path.display())
            }
            Self::Read { line, source } => match line {
                Some(line) => write!(f, "failed to read input at line {line}: {source}"),
                None => write!(f, "failed to read input: {source}"),
            },
        }
    }
}

impl Error for IngestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnsupportedExtension(_) => None,
            Self::Open { source, .. } => Some(source),
            Self::Read { source, .. } => Some(source),
        }
    }
}

/// Reads every row of the quit list at `path`.
///
/// The extension is checked before the file is opened.
pub fn read_quit_file(path: &Path) -> Result<Vec<SourceRow>, IngestError> {
    let has_csv_extension = path
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(QUIT_FILE_EXTENSION));
    if !has_csv_extension {
        return Err(IngestError::UnsupportedExtension(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = read_quit_rows(file)?;
    info!(
        "event=input_read module=ingest status=ok path={} rows={}",
        path.display(),
        rows.len()
    );
    Ok(rows)
}

/// Reads every row from an already-open CSV source.
pub fn read_quit_rows<R: Read>(source: R) -> Result<Vec<SourceRow>, IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source);

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    loop {
        let index = rows.len();
        match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => rows.push(SourceRow {
                index,
                line: record.position().map(|position| position.line()),
                record: ExternalQuitRecord::from_fields(record.iter()),
            }),
            Err(err) if err.is_io_error() => {
                return Err(IngestError::Read {
                    line: err.position().map(|position| position.line()),
                    source: err,
                });
            }
            Err(err) => rows.push(SourceRow {
                index,
                line: err.position().map(|position| position.line()),
                record: Err(QuitRecordError::Undecodable(err.to_string())),
            }),
        }
    }

    Ok(rows)
}
