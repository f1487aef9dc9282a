//! Read-only file handles for the HTTP layer.

use std::io::SeekFrom;

use crate::vfs::{FileInfo, VfsFile, VfsResult};

const RANGE_CHUNK: usize = 8192;

/// A read-only view of an open [`VfsFile`].
///
/// This is what a static-file server gets from
/// [`HttpFileSystem::open`](crate::HttpFileSystem::open): enough to stream
/// a body start to finish, serve a byte range, or enumerate a directory for
/// an index page. There is no way to write through it.
pub struct HttpFile {
    inner: Box<dyn VfsFile>,
}

impl std::fmt::Debug for HttpFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFile")
            .field("name", &self.inner.name())
            .finish()
    }
}

impl HttpFile {
    pub(crate) fn new(inner: Box<dyn VfsFile>) -> Self {
        Self { inner }
    }

    /// Path the file was opened with.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Read into `buf` from the current position. Returns 0 at end of file.
    pub async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner.read(buf).await
    }

    /// Read from the current position to end of file.
    pub async fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        self.inner.read_to_end().await
    }

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// Returns fewer bytes if the file ends first; memory grows with what is
    /// actually read, not with `len`. Leaves the cursor just past the
    /// returned bytes.
    pub async fn read_range(&mut self, offset: u64, len: usize) -> VfsResult<Vec<u8>> {
        self.inner.seek(SeekFrom::Start(offset)).await?;

        let mut out = Vec::new();
        let mut chunk = [0u8; RANGE_CHUNK];
        while out.len() < len {
            let want = (len - out.len()).min(RANGE_CHUNK);
            let n = self.inner.read(&mut chunk[..want]).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }

    /// Move the cursor. Returns the new absolute position.
    pub async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.inner.seek(pos).await
    }

    /// List up to `limit` further directory entries (0 = all remaining).
    pub async fn readdir(&mut self, limit: usize) -> VfsResult<Vec<FileInfo>> {
        self.inner.readdir(limit).await
    }

    /// Metadata of the open entry.
    pub async fn stat(&self) -> VfsResult<FileInfo> {
        self.inner.stat().await
    }

    /// Release the handle.
    pub async fn close(mut self) -> VfsResult<()> {
        self.inner.close().await
    }
}
