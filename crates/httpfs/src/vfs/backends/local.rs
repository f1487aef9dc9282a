//! A host directory exposed as a [`Filer`].
//!
//! Directory handles snapshot their listing on the first `readdir`, so a
//! walk that deletes children while listing sees a stable view.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs::FileTimes;
use std::io::SeekFrom;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{Filer, RemoveAll, VfsFile};
use crate::vfs::path;
use crate::vfs::types::{FileInfo, FileType, OpenFlags, SetAttr};

/// Serves a directory on the host.
///
/// All virtual paths are relative to `root`. For example, if `root` is
/// `/srv/www`, then `stat("/css/site.css")` looks at
/// `/srv/www/css/site.css`.
///
/// `..` is resolved lexically before touching the disk, and symlinks that
/// lead outside the root are rejected with `PathEscapesRoot`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
}

impl LocalBackend {
    /// Serve `root` read-write. The root is canonicalized once here, so
    /// escape checks compare against the real location.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = match dunce::canonicalize(&root) {
            Ok(canonical) => canonical,
            Err(e) => {
                tracing::warn!(
                    root = %root.display(),
                    error = %e,
                    "local backend root cannot be resolved; every path will be NotFound until it exists"
                );
                root
            }
        };
        Self {
            root,
            read_only: false,
        }
    }

    /// Serve `root`; every mutating call fails with `ReadOnly`.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        let mut backend = Self::new(root);
        backend.read_only = true;
        backend
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Canonical host path of the root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a virtual path to a host path within the root, following a
    /// symlink in the final component.
    fn resolve(&self, name: &str) -> VfsResult<PathBuf> {
        self.resolve_with(name, true)
    }

    /// Like [`resolve`](Self::resolve), but the final component is not
    /// followed, for operations that act on a symlink itself (`stat`,
    /// `remove`). A link pointing outside the root can still be removed.
    fn resolve_link(&self, name: &str) -> VfsResult<PathBuf> {
        self.resolve_with(name, false)
    }

    fn resolve_with(&self, name: &str, follow: bool) -> VfsResult<PathBuf> {
        let cleaned = path::clean(name);
        let relative = cleaned.trim_start_matches('/');
        if relative.is_empty() {
            return Ok(self.root.clone());
        }
        let full = self.root.join(relative);

        // Lexical cleaning already removed `..`; symlinks can still lead out.
        let probe = if follow && full.exists() {
            Some(full.as_path())
        } else {
            full.parent()
        };
        if let Some(probe) = probe.filter(|p| p.exists()) {
            let canonical = dunce::canonicalize(probe).map_err(VfsError::from)?;
            if !canonical.starts_with(&self.root) {
                return Err(VfsError::path_escapes_root(format!(
                    "{} is not under {}",
                    canonical.display(),
                    self.root.display()
                )));
            }
        }

        Ok(full)
    }

    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Convert std::fs::Metadata to FileInfo.
    fn metadata_to_info(name: String, meta: &std::fs::Metadata) -> FileInfo {
        let kind = if meta.is_dir() {
            FileType::Directory
        } else if meta.file_type().is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        };

        FileInfo {
            name,
            size: meta.len(),
            kind,
            perm: meta.permissions().mode() & 0o7777,
            mtime: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            atime: meta.accessed().ok(),
            uid: Some(meta.uid()),
            gid: Some(meta.gid()),
        }
    }
}

#[async_trait]
impl Filer for LocalBackend {
    async fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: u32,
    ) -> VfsResult<Box<dyn VfsFile>> {
        if flags.writable() || flags.create {
            self.check_writable()?;
        }
        let full_path = self.resolve(name)?;
        let name = path::clean(name);

        // Directories get a listing handle rather than an fd.
        if let Ok(meta) = fs::metadata(&full_path).await {
            if meta.is_dir() {
                if flags.writable() {
                    return Err(VfsError::is_a_directory(name));
                }
                if flags.create && flags.exclusive {
                    return Err(VfsError::already_exists(name));
                }
                return Ok(Box::new(LocalFile {
                    name,
                    flags,
                    inner: Some(Handle::Dir {
                        path: full_path,
                        listing: None,
                    }),
                }));
            }
        }

        let file = fs::OpenOptions::new()
            .read(flags.read)
            .write(flags.write)
            .append(flags.append)
            .create(flags.create && !flags.exclusive)
            .create_new(flags.create && flags.exclusive)
            .truncate(flags.truncate && flags.writable())
            .mode(perm)
            .open(&full_path)
            .await
            .map_err(VfsError::from)?;

        Ok(Box::new(LocalFile {
            name,
            flags,
            inner: Some(Handle::File(file)),
        }))
    }

    async fn mkdir(&self, name: &str, perm: u32) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(name)?;

        fs::DirBuilder::new()
            .mode(perm)
            .create(&full_path)
            .await
            .map_err(VfsError::from)
    }

    async fn remove(&self, name: &str) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve_link(name)?;
        if full_path == self.root {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let meta = fs::symlink_metadata(&full_path)
            .await
            .map_err(VfsError::from)?;
        if meta.is_dir() {
            fs::remove_dir(&full_path).await.map_err(VfsError::from)
        } else {
            fs::remove_file(&full_path).await.map_err(VfsError::from)
        }
    }

    async fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        let full_path = self.resolve_link(name)?;
        let meta = fs::symlink_metadata(&full_path)
            .await
            .map_err(VfsError::from)?;
        Ok(Self::metadata_to_info(path::base(name), &meta))
    }

    async fn setattr(&self, name: &str, attr: SetAttr) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(name)?;

        // Handle permissions
        if let Some(perm) = attr.perm {
            let permissions = std::fs::Permissions::from_mode(perm);
            fs::set_permissions(&full_path, permissions)
                .await
                .map_err(VfsError::from)?;
        }

        // Handle times
        if attr.mtime.is_some() || attr.atime.is_some() {
            let mut times = FileTimes::new();
            if let Some(atime) = attr.atime {
                times = times.set_accessed(atime);
            }
            if let Some(mtime) = attr.mtime {
                times = times.set_modified(mtime);
            }
            let target = full_path.clone();
            tokio::task::spawn_blocking(move || std::fs::File::open(&target)?.set_times(times))
                .await
                .map_err(std::io::Error::from)??;
        }

        // Handle uid/gid
        if attr.uid.is_some() || attr.gid.is_some() {
            let (target, uid, gid) = (full_path.clone(), attr.uid, attr.gid);
            tokio::task::spawn_blocking(move || std::os::unix::fs::chown(&target, uid, gid))
                .await
                .map_err(std::io::Error::from)??;
        }

        Ok(())
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn remove_aller(&self) -> Option<&dyn RemoveAll> {
        Some(self)
    }
}

#[async_trait]
impl RemoveAll for LocalBackend {
    async fn remove_all(&self, name: &str) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve_link(name)?;
        if full_path == self.root {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let meta = fs::symlink_metadata(&full_path)
            .await
            .map_err(VfsError::from)?;
        if meta.is_dir() {
            fs::remove_dir_all(&full_path).await.map_err(VfsError::from)
        } else {
            fs::remove_file(&full_path).await.map_err(VfsError::from)
        }
    }
}

/// Open state of a [`LocalFile`].
#[derive(Debug)]
enum Handle {
    File(fs::File),
    Dir {
        path: PathBuf,
        /// Remaining entries, loaded on the first `readdir`.
        listing: Option<VecDeque<FileInfo>>,
    },
}

/// Handle to a file or directory in a [`LocalBackend`].
#[derive(Debug)]
pub struct LocalFile {
    name: String,
    flags: OpenFlags,
    inner: Option<Handle>,
}

impl LocalFile {
    fn handle(&mut self) -> VfsResult<&mut Handle> {
        self.inner
            .as_mut()
            .ok_or_else(|| VfsError::other(format!("file already closed: {}", self.name)))
    }

    async fn load_listing(dir: &Path) -> VfsResult<VecDeque<FileInfo>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(dir).await.map_err(VfsError::from)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(VfsError::from)? {
            let meta = entry.metadata().await.map_err(VfsError::from)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(LocalBackend::metadata_to_info(name, &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries.into())
    }
}

#[async_trait]
impl VfsFile for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        let name = self.name.clone();
        match self.handle()? {
            Handle::File(file) => file.read(buf).await.map_err(VfsError::from),
            Handle::Dir { .. } => Err(VfsError::is_a_directory(name)),
        }
    }

    async fn write(&mut self, data: &[u8]) -> VfsResult<usize> {
        if !self.flags.writable() {
            return Err(VfsError::permission_denied(format!(
                "not opened for writing: {}",
                self.name
            )));
        }
        let name = self.name.clone();
        match self.handle()? {
            Handle::File(file) => {
                file.write_all(data).await.map_err(VfsError::from)?;
                Ok(data.len())
            }
            Handle::Dir { .. } => Err(VfsError::is_a_directory(name)),
        }
    }

    async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        match self.handle()? {
            Handle::File(file) => file.seek(pos).await.map_err(VfsError::from),
            // Rewinding a directory restarts the listing
            Handle::Dir { listing, .. } if pos == SeekFrom::Start(0) => {
                *listing = None;
                Ok(0)
            }
            Handle::Dir { .. } => Err(VfsError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "directories can only be rewound",
            ))),
        }
    }

    async fn readdir(&mut self, limit: usize) -> VfsResult<Vec<FileInfo>> {
        let name = self.name.clone();
        match self.handle()? {
            Handle::File(_) => Err(VfsError::not_a_directory(name)),
            Handle::Dir { path, listing } => {
                if listing.is_none() {
                    *listing = Some(Self::load_listing(path).await?);
                }
                let remaining = listing.get_or_insert_with(VecDeque::new);
                let take = if limit == 0 {
                    remaining.len()
                } else {
                    limit.min(remaining.len())
                };
                Ok(remaining.drain(..take).collect())
            }
        }
    }

    async fn stat(&self) -> VfsResult<FileInfo> {
        let base = path::base(&self.name);
        match &self.inner {
            Some(Handle::File(file)) => {
                let meta = file.metadata().await.map_err(VfsError::from)?;
                Ok(LocalBackend::metadata_to_info(base, &meta))
            }
            Some(Handle::Dir { path, .. }) => {
                let meta = fs::metadata(path).await.map_err(VfsError::from)?;
                Ok(LocalBackend::metadata_to_info(base, &meta))
            }
            None => Err(VfsError::other(format!("file already closed: {}", self.name))),
        }
    }

    async fn close(&mut self) -> VfsResult<()> {
        match self.inner.take() {
            Some(Handle::File(mut file)) => file.flush().await.map_err(VfsError::from),
            Some(Handle::Dir { .. }) => Ok(()),
            None => Err(VfsError::other(format!("file already closed: {}", self.name))),
        }
    }
}
