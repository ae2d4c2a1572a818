//! Error taxonomy
//!
//! Component internals propagate `anyhow::Result`; conditions the user must
//! distinguish are raised as `SodError` so the entry point can map them to
//! exit codes. Fatal errors leave refs and the staging index untouched: the
//! index is only written after the mutating command has fully succeeded and
//! the ref update is a single atomic rename.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for user errors (bad argument, not a repo, nothing staged)
pub const EXIT_USER_ERROR: i32 = 1;
/// Exit code for internal failures (I/O, corrupt objects)
pub const EXIT_FATAL: i32 = 2;
/// Exit code for lock contention
pub const EXIT_LOCKED: i32 = 3;

#[derive(Debug, Error)]
pub enum SodError {
    #[error("not a sod repository (or any parent up to filesystem root)")]
    NotARepository,

    #[error("unable to lock repository: another sod process is running")]
    LockContention,

    #[error("{0}")]
    BadArgument(String),

    #[error("pathspec '{0}' did not match any tracked or working-tree file")]
    NoMatch(String),

    #[error("no changes staged for commit")]
    NothingToCommit,

    #[error("object store corruption: {0}")]
    ObjectStoreCorruption(String),

    #[error("I/O failure on {}: {}", .path.display(), .source)]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("remote operation failed: {0}")]
    RemoteFailure(String),
}

impl SodError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SodError::NotARepository
            | SodError::BadArgument(_)
            | SodError::NoMatch(_)
            | SodError::NothingToCommit => EXIT_USER_ERROR,
            SodError::LockContention => EXIT_LOCKED,
            SodError::ObjectStoreCorruption(_)
            | SodError::IoFailure { .. }
            | SodError::RemoteFailure(_) => EXIT_FATAL,
        }
    }
}

/// Map any error chain to the process exit code
///
/// Errors that are not a `SodError` are internal failures.
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<SodError>()
        .map(SodError::exit_code)
        .unwrap_or(EXIT_FATAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_contract() {
        assert_eq!(SodError::NotARepository.exit_code(), 1);
        assert_eq!(SodError::NothingToCommit.exit_code(), 1);
        assert_eq!(SodError::LockContention.exit_code(), 3);
        assert_eq!(
            SodError::ObjectStoreCorruption("missing".into()).exit_code(),
            2
        );
    }

    #[test]
    fn anyhow_wrapped_errors_keep_their_code() {
        let error = anyhow::Error::from(SodError::LockContention).context("while starting up");
        assert_eq!(exit_code_for(&error), 3);

        let plain = anyhow::anyhow!("arbitrary failure");
        assert_eq!(exit_code_for(&plain), EXIT_FATAL);
    }
}
