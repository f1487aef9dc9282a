//! Subtree views.
//!
//! [`SubFs`] presents a directory of another [`Filer`] as the root of a
//! filesystem of its own.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::VfsResult;
use super::ops::{Filer, RemoveAll, VfsFile};
use super::path;
use super::types::{FileInfo, OpenFlags, SetAttr};

/// A [`Filer`] rooted at a directory of another `Filer`.
///
/// Every path is cleaned before the prefix is applied, so `..` can never
/// climb above the subtree root.
#[derive(Clone)]
pub struct SubFs {
    inner: Arc<dyn Filer>,
    root: String,
}

impl std::fmt::Debug for SubFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubFs").field("root", &self.root).finish()
    }
}

impl SubFs {
    /// View `root` of `inner` as `/`.
    ///
    /// Does not check that `root` exists; [`Httpfs::sub`](crate::Httpfs::sub)
    /// does.
    pub fn new(inner: Arc<dyn Filer>, root: &str) -> Self {
        Self {
            inner,
            root: path::clean(root),
        }
    }

    /// The subtree root, as a path of the inner filesystem.
    pub fn root(&self) -> &str {
        &self.root
    }

    fn full(&self, name: &str) -> String {
        path::join(&self.root, &path::clean(name))
    }
}

#[async_trait]
impl Filer for SubFs {
    async fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: u32,
    ) -> VfsResult<Box<dyn VfsFile>> {
        self.inner.open_file(&self.full(name), flags, perm).await
    }

    async fn mkdir(&self, name: &str, perm: u32) -> VfsResult<()> {
        self.inner.mkdir(&self.full(name), perm).await
    }

    async fn remove(&self, name: &str) -> VfsResult<()> {
        self.inner.remove(&self.full(name)).await
    }

    async fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        self.inner.stat(&self.full(name)).await
    }

    async fn setattr(&self, name: &str, attr: SetAttr) -> VfsResult<()> {
        self.inner.setattr(&self.full(name), attr).await
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }

    fn remove_aller(&self) -> Option<&dyn RemoveAll> {
        // Only advertise the capability the inner filesystem really has
        self.inner.remove_aller().map(|_| self as &dyn RemoveAll)
    }
}

#[async_trait]
impl RemoveAll for SubFs {
    async fn remove_all(&self, name: &str) -> VfsResult<()> {
        let full = self.full(name);
        match self.inner.remove_aller() {
            Some(native) => native.remove_all(&full).await,
            None => crate::remove::RecursiveRemover::new(self.inner.as_ref())
                .remove_all(&full)
                .await,
        }
    }
}
