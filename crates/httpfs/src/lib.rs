//! # httpfs
//!
//! Serve any virtual filesystem through a static-file HTTP interface.
//!
//! [`Httpfs`] wraps an `Arc<dyn Filer>` and hands read-only [`HttpFile`]
//! handles to the HTTP layer via [`HttpFileSystem`], so the server never
//! needs the filesystem's concrete type. The write side of the backing
//! filesystem (mkdir, remove, chmod, chtimes, chown) is re-exported on the
//! same facade, together with [`Httpfs::remove_all`], a fault-tolerant
//! recursive delete that works on backends with or without a native one.
//!
//! ```no_run
//! # async fn demo() -> httpfs::VfsResult<()> {
//! use std::sync::Arc;
//! use httpfs::{Httpfs, MemoryBackend};
//!
//! let fs = Httpfs::new(Arc::new(MemoryBackend::new()));
//! fs.mkdir_all("/static/css", 0o755).await?;
//!
//! let mut index = fs.open("/static").await?;
//! let entries = index.readdir(0).await?;
//! # let _ = entries;
//! fs.remove_all("/static").await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod file;
pub mod remove;
pub mod vfs;

pub use adapter::{HttpFileSystem, Httpfs};
pub use config::{ConfigError, HttpfsConfig};
pub use file::HttpFile;
pub use remove::RecursiveRemover;
pub use vfs::{
    backends::{LocalBackend, MemoryBackend},
    DirEntry, FileInfo, FileType, Filer, OpenFlags, RemoveAll, SetAttr, SubFs, VfsError, VfsFile,
    VfsResult,
};
