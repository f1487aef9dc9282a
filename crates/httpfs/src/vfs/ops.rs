//! Backing filesystem traits.
//!
//! [`Filer`] is the whole surface the adapter needs from a virtual
//! filesystem. Handles returned by [`Filer::open_file`] implement
//! [`VfsFile`]. A backend with its own recursive delete advertises it
//! through [`Filer::remove_aller`].

use async_trait::async_trait;
use std::io::SeekFrom;
use std::time::SystemTime;

use super::types::{DirEntry, FileInfo, OpenFlags, SetAttr};
use super::VfsResult;

/// An open file or directory.
///
/// Handles keep their own cursor. Directory handles list their children
/// through [`readdir`](VfsFile::readdir); file handles read, write and seek.
#[async_trait]
pub trait VfsFile: Send + Sync {
    /// Path the handle was opened with.
    fn name(&self) -> &str;

    /// Read into `buf` from the current position.
    ///
    /// Returns 0 at end of file.
    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize>;

    /// Write `data` at the current position (or at the end in append mode).
    async fn write(&mut self, data: &[u8]) -> VfsResult<usize>;

    /// Move the cursor. Returns the new absolute position.
    async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64>;

    /// List up to `limit` further children of a directory.
    ///
    /// `limit == 0` returns every remaining entry in one call. With a
    /// positive limit an empty result means the listing is exhausted.
    async fn readdir(&mut self, limit: usize) -> VfsResult<Vec<FileInfo>>;

    /// Metadata of the open entry.
    async fn stat(&self) -> VfsResult<FileInfo>;

    /// Release the handle.
    async fn close(&mut self) -> VfsResult<()>;

    /// Read from the current position to end of file.
    async fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }
}

/// Optional native recursive removal.
///
/// Backends that can delete a subtree more cheaply than a stat/list/remove
/// walk implement this and return it from [`Filer::remove_aller`].
#[async_trait]
pub trait RemoveAll: Send + Sync {
    /// Remove `path` and everything below it.
    async fn remove_all(&self, path: &str) -> VfsResult<()>;
}

/// Backing filesystem operations.
///
/// Paths are slash-separated virtual paths. Errors follow POSIX conventions:
/// missing entries are `NotFound`, removing a populated directory is
/// `DirectoryNotEmpty`, and so on; see [`VfsError`](super::VfsError).
#[async_trait]
pub trait Filer: Send + Sync {
    // ========================================================================
    // Required
    // ========================================================================

    /// Open a file or directory.
    async fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        perm: u32,
    ) -> VfsResult<Box<dyn VfsFile>>;

    /// Create a single directory. The parent must already exist.
    async fn mkdir(&self, path: &str, perm: u32) -> VfsResult<()>;

    /// Remove a file or an empty directory.
    async fn remove(&self, path: &str) -> VfsResult<()>;

    /// Get entry metadata.
    async fn stat(&self, path: &str) -> VfsResult<FileInfo>;

    /// Apply a metadata update.
    async fn setattr(&self, path: &str, attr: SetAttr) -> VfsResult<()>;

    // ========================================================================
    // Capabilities
    // ========================================================================

    /// Returns true if this filesystem rejects writes.
    fn read_only(&self) -> bool {
        false
    }

    /// Native recursive removal, if the backend has one.
    fn remove_aller(&self) -> Option<&dyn RemoveAll> {
        None
    }

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Change permission bits.
    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        self.setattr(path, SetAttr::perm(mode)).await
    }

    /// Change access and modification times.
    async fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        self.setattr(path, SetAttr::times(atime, mtime)).await
    }

    /// Change owner and group.
    async fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        self.setattr(path, SetAttr::owner(uid, gid)).await
    }

    /// List a directory, sorted by name.
    async fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let mut dir = self.open_file(path, OpenFlags::read(), 0).await?;
        let listing = dir.readdir(0).await;
        dir.close().await?;

        let mut entries: Vec<DirEntry> = listing?
            .iter()
            .filter(|info| info.name != "." && info.name != "..")
            .map(DirEntry::from)
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Read a whole file.
    async fn read_file(&self, path: &str) -> VfsResult<Vec<u8>> {
        let mut file = self.open_file(path, OpenFlags::read(), 0).await?;
        let data = file.read_to_end().await;
        file.close().await?;
        data
    }
}
