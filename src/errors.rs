pub use anyhow::Error;
pub use anyhow::Result;

/// Failures with a meaning callers may branch on. They travel inside `anyhow::Error`;
/// use `err.downcast_ref::<StorageError>()` to recover them.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StorageError {
    #[error("page buffer must be {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("disk manager is shut down")]
    Closed,
    #[error("no frame available in the buffer pool")]
    Full,
}
