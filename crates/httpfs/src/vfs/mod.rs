//! Virtual filesystem abstraction.
//!
//! Key components:
//!
//! - [`Filer`] - Operations the adapter needs from a backing filesystem
//! - [`VfsFile`] - Open file or directory handle
//! - [`RemoveAll`] - Optional native recursive delete, probed via
//!   [`Filer::remove_aller`]
//! - [`MemoryBackend`] - In-memory filesystem (for tests and scratch trees)
//! - [`LocalBackend`] - Host directory access (with path security)
//! - [`SubFs`] - A subdirectory of another `Filer` viewed as its root
//!
//! ## Design Decisions
//!
//! - **Slash paths**: virtual paths are `&str` with `/` separators on every
//!   platform; see [`path`].
//! - **POSIX error kinds**: backends report `NotFound`, `AlreadyExists`,
//!   `DirectoryNotEmpty` and friends, and callers classify errors with
//!   [`VfsError::is_not_found`] and siblings rather than by message.

pub mod backends;
mod error;
mod ops;
pub mod path;
mod sub;
mod types;

pub use backends::{LocalBackend, MemoryBackend};
pub use error::{VfsError, VfsResult};
pub use ops::{Filer, RemoveAll, VfsFile};
pub use sub::SubFs;
pub use types::{DirEntry, FileInfo, FileType, OpenFlags, SetAttr};
