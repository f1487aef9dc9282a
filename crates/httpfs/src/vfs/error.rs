//! Errors shared by every filesystem operation.
//!
//! Variants carry the offending path. Callers classify errors with
//! [`VfsError::kind`] and the `is_*` helpers, never by matching messages.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A write was attempted on a read-only backend.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// A path component that must be a directory is something else.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// The path resolves (possibly through a symlink) outside the backend root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Recursive removal went deeper than the configured limit.
    #[error("directory nesting too deep: {0}")]
    TooDeep(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

// Shorthand constructors, so backends can write `VfsError::not_found(path)`.
impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl VfsError {
    /// The `io::ErrorKind` this error corresponds to.
    ///
    /// Backends that surface raw `io::Error`s and backends that build typed
    /// variants classify the same way through this.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            VfsError::NotFound(_) => io::ErrorKind::NotFound,
            VfsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            VfsError::PermissionDenied(_) | VfsError::ReadOnly | VfsError::PathEscapesRoot(_) => {
                io::ErrorKind::PermissionDenied
            }
            VfsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            VfsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            VfsError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            VfsError::Io(e) => e.kind(),
            VfsError::TooDeep(_) | VfsError::Other(_) => io::ErrorKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == io::ErrorKind::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind() == io::ErrorKind::AlreadyExists
    }

    /// A directory could not be removed because it (reportedly) has children.
    pub fn is_not_empty(&self) -> bool {
        self.kind() == io::ErrorKind::DirectoryNotEmpty
    }
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> Self {
        if let VfsError::Io(inner) = err {
            return inner;
        }
        io::Error::new(err.kind(), err.to_string())
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
