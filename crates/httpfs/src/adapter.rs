//! The [`Httpfs`] facade.
//!
//! Wraps any [`Filer`] so a static-file HTTP server can open files from it
//! through [`HttpFileSystem`], while the write side (create, remove, change
//! metadata) stays reachable through the same value.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::HttpfsConfig;
use crate::file::HttpFile;
use crate::remove::RecursiveRemover;
use crate::vfs::{
    path, DirEntry, FileInfo, Filer, OpenFlags, RemoveAll, SetAttr, SubFs, VfsError, VfsFile,
    VfsResult,
};

/// What a static-file HTTP server needs from a filesystem.
#[async_trait]
pub trait HttpFileSystem: Send + Sync {
    /// Open `name` for reading.
    async fn open(&self, name: &str) -> VfsResult<HttpFile>;
}

/// Adapter exposing a [`Filer`] to the HTTP layer.
///
/// Cloning is cheap; clones share the backing filesystem.
#[derive(Clone)]
pub struct Httpfs {
    fs: Arc<dyn Filer>,
    config: HttpfsConfig,
}

impl std::fmt::Debug for Httpfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Httpfs")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Httpfs {
    /// Wrap `fs` with the default configuration.
    pub fn new(fs: Arc<dyn Filer>) -> Self {
        Self::with_config(fs, HttpfsConfig::default())
    }

    /// Wrap `fs` with an explicit configuration.
    pub fn with_config(fs: Arc<dyn Filer>, config: HttpfsConfig) -> Self {
        Self { fs, config }
    }

    /// The adapter's configuration.
    pub fn config(&self) -> &HttpfsConfig {
        &self.config
    }

    /// The backing filesystem.
    pub fn inner(&self) -> &Arc<dyn Filer> {
        &self.fs
    }

    /// Open `name` read-only for serving.
    pub async fn open(&self, name: &str) -> VfsResult<HttpFile> {
        tracing::trace!(name = %name, "open");
        let file = self.fs.open_file(name, OpenFlags::read(), 0o400).await?;
        Ok(HttpFile::new(file))
    }

    /// Open a file with explicit flags and creation mode.
    pub async fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: u32,
    ) -> VfsResult<Box<dyn VfsFile>> {
        self.fs.open_file(name, flags, perm).await
    }

    /// Create a directory.
    pub async fn mkdir(&self, name: &str, perm: u32) -> VfsResult<()> {
        self.fs.mkdir(name, perm).await
    }

    /// Create `name` and any missing parents.
    ///
    /// Directories that already exist are skipped; `/` is a no-op.
    pub async fn mkdir_all(&self, name: &str, perm: u32) -> VfsResult<()> {
        let mut current = String::from("/");
        for component in path::components(name) {
            current = path::join(&current, component);
            match self.fs.mkdir(&current, perm).await {
                Ok(()) => tracing::trace!(path = %current, "mkdir_all: created"),
                Err(e) if e.is_already_exists() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// [`mkdir_all`](Self::mkdir_all) with the configured `dir_mode`.
    pub async fn mkdir_all_default(&self, name: &str) -> VfsResult<()> {
        self.mkdir_all(name, self.config.dir_mode).await
    }

    /// Remove a file or an empty directory.
    pub async fn remove(&self, name: &str) -> VfsResult<()> {
        self.fs.remove(name).await
    }

    /// Remove `name` and everything below it.
    ///
    /// Succeeds if `name` does not exist. See [`RecursiveRemover`] for the
    /// failure semantics.
    pub async fn remove_all(&self, name: &str) -> VfsResult<()> {
        RecursiveRemover::with_config(self.fs.as_ref(), &self.config)
            .remove_all(name)
            .await
    }

    /// Get entry metadata.
    pub async fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        self.fs.stat(name).await
    }

    /// Change permission bits.
    pub async fn chmod(&self, name: &str, mode: u32) -> VfsResult<()> {
        self.fs.chmod(name, mode).await
    }

    /// Change access and modification times.
    pub async fn chtimes(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        self.fs.chtimes(name, atime, mtime).await
    }

    /// Change owner and group.
    pub async fn chown(&self, name: &str, uid: u32, gid: u32) -> VfsResult<()> {
        self.fs.chown(name, uid, gid).await
    }

    /// List a directory, sorted by name.
    pub async fn read_dir(&self, name: &str) -> VfsResult<Vec<DirEntry>> {
        self.fs.read_dir(name).await
    }

    /// Read a whole file.
    pub async fn read_file(&self, name: &str) -> VfsResult<Vec<u8>> {
        self.fs.read_file(name).await
    }

    /// An adapter over the subtree rooted at `dir`.
    pub async fn sub(&self, dir: &str) -> VfsResult<Httpfs> {
        let info = self.fs.stat(dir).await?;
        if !info.is_dir() {
            return Err(VfsError::not_a_directory(path::clean(dir)));
        }
        let sub = SubFs::new(Arc::clone(&self.fs), dir);
        Ok(Self::with_config(Arc::new(sub), self.config.clone()))
    }
}

#[async_trait]
impl HttpFileSystem for Httpfs {
    async fn open(&self, name: &str) -> VfsResult<HttpFile> {
        Httpfs::open(self, name).await
    }
}

#[async_trait]
impl Filer for Httpfs {
    async fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: u32,
    ) -> VfsResult<Box<dyn VfsFile>> {
        Httpfs::open_file(self, name, flags, perm).await
    }

    async fn mkdir(&self, name: &str, perm: u32) -> VfsResult<()> {
        Httpfs::mkdir(self, name, perm).await
    }

    async fn remove(&self, name: &str) -> VfsResult<()> {
        Httpfs::remove(self, name).await
    }

    async fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        Httpfs::stat(self, name).await
    }

    async fn setattr(&self, name: &str, attr: SetAttr) -> VfsResult<()> {
        self.fs.setattr(name, attr).await
    }

    fn read_only(&self) -> bool {
        self.fs.read_only()
    }

    fn remove_aller(&self) -> Option<&dyn RemoveAll> {
        Some(self)
    }
}

#[async_trait]
impl RemoveAll for Httpfs {
    async fn remove_all(&self, name: &str) -> VfsResult<()> {
        Httpfs::remove_all(self, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryBackend;

    fn setup() -> (Httpfs, MemoryBackend) {
        let mem = MemoryBackend::new();
        (Httpfs::new(Arc::new(mem.clone())), mem)
    }

    #[tokio::test]
    async fn test_mkdir_all() {
        let (fs, _mem) = setup();
        fs.mkdir_all("/a/b/c/d", 0o755).await.unwrap();

        for path in ["/a", "/a/b", "/a/b/c", "/a/b/c/d"] {
            assert!(fs.stat(path).await.unwrap().is_dir(), "{path}");
        }
        // Existing prefixes are fine
        fs.mkdir_all("/a/b/c", 0o755).await.unwrap();
        fs.mkdir_all("/", 0o755).await.unwrap();
        fs.mkdir_all("", 0o755).await.unwrap();
    }

    #[tokio::test]
    async fn test_mkdir_all_default_uses_config_mode() {
        let mem = MemoryBackend::new();
        let config = HttpfsConfig {
            dir_mode: 0o700,
            ..Default::default()
        };
        let fs = Httpfs::with_config(Arc::new(mem), config);

        fs.mkdir_all_default("/private/keys").await.unwrap();
        assert_eq!(fs.stat("/private/keys").await.unwrap().perm, 0o700);
    }

    #[tokio::test]
    async fn test_mkdir_all_through_file_fails() {
        let (fs, _mem) = setup();
        let mut f = fs
            .open_file("/file", OpenFlags::create(), 0o644)
            .await
            .unwrap();
        f.close().await.unwrap();

        let err = fs.mkdir_all("/file/subdir", 0o755).await.unwrap_err();
        assert!(matches!(err, VfsError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_sub() {
        let (fs, mem) = setup();
        fs.mkdir_all("/www/css", 0o755).await.unwrap();

        let sub = fs.sub("/www").await.unwrap();
        assert!(sub.stat("/css").await.unwrap().is_dir());

        sub.remove_all("/css").await.unwrap();
        assert!(mem.stat("/www/css").await.unwrap_err().is_not_found());

        let mut f = fs
            .open_file("/plain", OpenFlags::create(), 0o644)
            .await
            .unwrap();
        f.close().await.unwrap();
        assert!(matches!(
            fs.sub("/plain").await.unwrap_err(),
            VfsError::NotADirectory(_)
        ));
        assert!(fs.sub("/missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_adapter_is_a_filer() {
        let (fs, _mem) = setup();
        let stacked = Httpfs::new(Arc::new(fs.clone()));

        stacked.mkdir_all("/x/y", 0o755).await.unwrap();
        assert!(fs.stat("/x/y").await.unwrap().is_dir());
        assert!(Filer::remove_aller(&fs).is_some());

        stacked.remove_all("/x").await.unwrap();
        assert!(fs.stat("/x").await.unwrap_err().is_not_found());
    }
}
