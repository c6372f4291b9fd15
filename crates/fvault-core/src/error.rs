use std::path::PathBuf;

use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("file is already encrypted: {0}")]
    DuplicateEntry(String),

    #[error("a ciphertext blob already exists at {}", .0.display())]
    BlobExists(PathBuf),

    #[error("ciphertext file not found: {}", .0.display())]
    CiphertextNotFound(PathBuf),

    #[error("no metadata record matches {0}")]
    RecordNotFound(String),

    /// Wrong password and tampered data are deliberately indistinguishable.
    #[error("authentication failed: wrong password or corrupted data")]
    AuthenticationFailure,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The metadata store could not be replaced after a successful staging
    /// write. The staged copy is left at `staged` for manual recovery.
    #[error("metadata store {} may be inconsistent (staged copy at {}): {source}", .path.display(), .staged.display())]
    StoreCorruptionRisk {
        path: PathBuf,
        staged: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metadata store {}: {reason}", .path.display())]
    MalformedStore { path: PathBuf, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// Build a [`VaultError::MalformedStore`] for `path`.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        VaultError::MalformedStore {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
