//! Persistence layer for the three line-delimited JSON files.
//!
//! # Responsibility
//! - Parse tolerant record lines and write canonical ones (`codec`).
//! - Load/save the marker lists and the connection set as files (`jsonl_repo`).
//!
//! # Invariants
//! - A malformed line never aborts a load; it is skipped with a diagnostic.
//! - I/O failures on whole files are surfaced as `RepoError` with the path.

pub mod codec;
pub mod jsonl_repo;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type RepoResult<T> = Result<T, RepoError>;

/// File-level persistence failure.
#[derive(Debug)]
pub enum RepoError {
    Read { path: PathBuf, source: std::io::Error },
    Write { path: PathBuf, source: std::io::Error },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Write { path, source } => {
                write!(f, "failed to write `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
        }
    }
}
