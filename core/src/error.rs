//! Top-level error taxonomy.
//!
//! Per-component modules define their own narrow error enum (`StoreError`,
//! `SessionError`, `TaskError`, ...) for precise `match`ing; this module's
//! [`Error`] is the coarse kind every one of them folds into, so a CLI
//! entry point can pick an exit code without knowing which store raised it.

use crate::store::StoreError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error kind, independent of which component raised it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("domain error: {0}")]
    Domain(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("corrupt document at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("safety violation: refused to touch {0}")]
    SafetyViolation(PathBuf),

    #[error("external collaborator failed: {0}")]
    External(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Exit-code bucket: 0 success (not representable here),
    /// 1 for every validation/domain error, >=2 reserved for unexpected
    /// internal errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Corrupt { .. } | Error::External(_) => 2,
            _ => 1,
        }
    }
}
