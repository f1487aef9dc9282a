//! Recursive removal on top of a [`Filer`].
//!
//! [`RecursiveRemover`] deletes a file or a whole directory tree using only
//! `stat`, `open_file`/`readdir`, and single-entry `remove`. When the
//! backend offers its own [`RemoveAll`](crate::vfs::RemoveAll) the walk is
//! skipped entirely.
//!
//! Semantics:
//!
//! - A path that does not exist is already removed: `NotFound` at the top of
//!   any (sub)walk is success.
//! - The first other error aborts the walk and is returned unchanged.
//!   Siblings after the failing child are not visited and nothing already
//!   deleted is restored.
//! - Some backends report "directory not empty" for a directory whose
//!   children are gone. If the final `remove` fails but a follow-up `stat`
//!   says the directory no longer exists, the removal counts as done.

use futures::future::BoxFuture;

use crate::config::HttpfsConfig;
use crate::vfs::{path, FileInfo, Filer, OpenFlags, VfsError, VfsFile, VfsResult};

/// Stateless recursive delete over a borrowed [`Filer`].
#[derive(Clone, Copy)]
pub struct RecursiveRemover<'a> {
    fs: &'a dyn Filer,
    use_native: bool,
    max_depth: usize,
    list_limit: usize,
}

impl std::fmt::Debug for RecursiveRemover<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecursiveRemover")
            .field("use_native", &self.use_native)
            .field("max_depth", &self.max_depth)
            .field("list_limit", &self.list_limit)
            .finish_non_exhaustive()
    }
}

impl<'a> RecursiveRemover<'a> {
    /// Remover with default settings.
    pub fn new(fs: &'a dyn Filer) -> Self {
        Self::with_config(fs, &HttpfsConfig::default())
    }

    /// Remover using the removal settings from `config`.
    pub fn with_config(fs: &'a dyn Filer, config: &HttpfsConfig) -> Self {
        Self {
            fs,
            use_native: config.use_native_remove_all,
            max_depth: config.max_depth,
            list_limit: config.list_limit,
        }
    }

    /// Remove `path` and, if it is a directory, everything below it.
    pub async fn remove_all(&self, path: &str) -> VfsResult<()> {
        if self.use_native {
            if let Some(native) = self.fs.remove_aller() {
                tracing::debug!(path = %path, "remove_all: using native bulk delete");
                return match native.remove_all(path).await {
                    Err(e) if e.is_not_found() => Ok(()),
                    result => result,
                };
            }
        }

        tracing::debug!(path = %path, "remove_all: walking tree");
        self.walk(path.to_string(), 0).await
    }

    fn walk(&self, path: String, depth: usize) -> BoxFuture<'_, VfsResult<()>> {
        Box::pin(async move {
            if depth > self.max_depth {
                return Err(VfsError::TooDeep(path));
            }

            let info = match self.fs.stat(&path).await {
                Ok(info) => info,
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            };

            if !info.is_dir() {
                tracing::trace!(path = %path, "remove_all: file");
                return self.fs.remove(&path).await;
            }

            let Some(children) = self.list(&path).await? else {
                return Ok(());
            };
            for name in children {
                self.walk(path::join(&path, &name), depth + 1).await?;
            }

            tracing::trace!(path = %path, "remove_all: directory");
            match self.fs.remove(&path).await {
                Ok(()) => Ok(()),
                Err(err) => match self.fs.stat(&path).await {
                    Err(stat_err) if stat_err.is_not_found() => {
                        tracing::debug!(
                            path = %path,
                            error = %err,
                            "remove_all: directory gone despite remove error"
                        );
                        Ok(())
                    }
                    _ => Err(err),
                },
            }
        })
    }

    /// Names of the children of `path`, or `None` if it vanished before it
    /// could be opened.
    ///
    /// The handle is closed before returning, whether listing worked or not.
    async fn list(&self, path: &str) -> VfsResult<Option<Vec<String>>> {
        let mut dir = match self.fs.open_file(path, OpenFlags::read(), 0).await {
            Ok(dir) => dir,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let listing = self.read_entries(dir.as_mut()).await;
        if let Err(e) = dir.close().await {
            tracing::warn!(path = %path, error = %e, "remove_all: failed to close directory");
        }

        let names = listing?
            .into_iter()
            .map(|info| info.name)
            .filter(|name| name != "." && name != "..")
            .collect();
        Ok(Some(names))
    }

    async fn read_entries(&self, dir: &mut dyn VfsFile) -> VfsResult<Vec<FileInfo>> {
        if self.list_limit == 0 {
            return dir.readdir(0).await;
        }

        let mut entries = Vec::new();
        loop {
            let batch = dir.readdir(self.list_limit).await?;
            if batch.is_empty() {
                return Ok(entries);
            }
            entries.extend(batch);
        }
    }
}
