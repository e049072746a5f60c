//! Crate-wide error type.
//!
//! Every fallible operation returns [`Error`], and callers that need to
//! distinguish recoverable from fatal conditions branch on [`Error::kind`]
//! instead of matching message strings.

use std::path::PathBuf;
use thiserror::Error;

/// Discriminator for [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Parse,
    Schema,
    InvalidSpec,
    RebuildInProgress,
    DatabaseUnavailable,
    Io,
    Database,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("schema setup failed: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("invalid query spec: {0}")]
    InvalidSpec(String),

    #[error("rebuild in progress for {}", .0.display())]
    RebuildInProgress(PathBuf),

    #[error("database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Schema(_) => ErrorKind::Schema,
            Error::InvalidSpec(_) => ErrorKind::InvalidSpec,
            Error::RebuildInProgress(_) => ErrorKind::RebuildInProgress,
            Error::DatabaseUnavailable(_) => ErrorKind::DatabaseUnavailable,
            Error::Io(_) => ErrorKind::Io,
            Error::Database(_) => ErrorKind::Database,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            Error::InvalidSpec("both flags".into()).kind(),
            ErrorKind::InvalidSpec
        );
        assert_eq!(
            Error::DatabaseUnavailable("missing".into()).kind(),
            ErrorKind::DatabaseUnavailable
        );
        assert_eq!(
            Error::RebuildInProgress(PathBuf::from("/tmp/x.db")).kind(),
            ErrorKind::RebuildInProgress
        );
    }
}
