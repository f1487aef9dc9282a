//! In-memory filesystem backend.
//!
//! Used for tests and ephemeral trees. All data is lost when the last
//! handle to the backend is dropped.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{Filer, RemoveAll, VfsFile};
use crate::vfs::path;
use crate::vfs::types::{FileInfo, OpenFlags, SetAttr};

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, info: FileInfo },
    Directory { info: FileInfo },
}

impl Node {
    fn info(&self) -> &FileInfo {
        match self {
            Node::File { info, .. } => info,
            Node::Directory { info } => info,
        }
    }

    fn info_mut(&mut self) -> &mut FileInfo {
        match self {
            Node::File { info, .. } => info,
            Node::Directory { info } => info,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }
}

type Nodes = BTreeMap<String, Node>;

/// Prefix shared by every child key of `dir`.
fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{dir}/")
    }
}

/// Immediate children of `dir`, in name order.
fn children<'a>(nodes: &'a Nodes, dir: &str) -> Vec<&'a Node> {
    let prefix = child_prefix(dir);
    nodes
        .range(prefix.clone()..)
        .take_while(|(key, _)| key.starts_with(&prefix))
        .filter(|(key, _)| {
            let rest = &key[prefix.len()..];
            !rest.is_empty() && !rest.contains('/')
        })
        .map(|(_, node)| node)
        .collect()
}

/// The parent of `path` must exist and be a directory.
fn check_parent(nodes: &Nodes, path: &str) -> VfsResult<()> {
    let Some(parent) = path::parent(path) else {
        return Ok(());
    };
    match nodes.get(&parent) {
        Some(node) if node.is_dir() => Ok(()),
        Some(_) => Err(VfsError::not_a_directory(parent)),
        None => Err(VfsError::not_found(path)),
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via an internal `RwLock`. Cloning shares the same tree, as
/// do the handles returned by `open_file`.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    nodes: Arc<RwLock<Nodes>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        // Root directory always exists
        nodes.insert(
            "/".to_string(),
            Node::Directory {
                info: FileInfo::directory("", 0o755),
            },
        );
        Self {
            nodes: Arc::new(RwLock::new(nodes)),
        }
    }

    /// Number of entries, including the root.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns true if only the root exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }
}

#[async_trait]
impl Filer for MemoryBackend {
    async fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: u32,
    ) -> VfsResult<Box<dyn VfsFile>> {
        let normalized = path::clean(name);
        let mut nodes = self.nodes.write();

        match nodes.get(&normalized).map(Node::is_dir) {
            Some(_) if flags.create && flags.exclusive => {
                return Err(VfsError::already_exists(normalized));
            }
            Some(true) if flags.writable() => {
                return Err(VfsError::is_a_directory(normalized));
            }
            Some(false) if flags.truncate && flags.writable() => {
                if let Some(Node::File { data, info }) = nodes.get_mut(&normalized) {
                    data.clear();
                    info.size = 0;
                    info.mtime = SystemTime::now();
                }
            }
            Some(_) => {}
            None if flags.create => {
                check_parent(&nodes, &normalized)?;
                let info = FileInfo::file(path::base(&normalized), 0, perm);
                nodes.insert(
                    normalized.clone(),
                    Node::File {
                        data: Vec::new(),
                        info,
                    },
                );
            }
            None => return Err(VfsError::not_found(normalized)),
        }

        Ok(Box::new(MemoryFile {
            nodes: Arc::clone(&self.nodes),
            path: normalized,
            flags,
            pos: 0,
            listed_after: None,
            closed: false,
        }))
    }

    async fn mkdir(&self, name: &str, perm: u32) -> VfsResult<()> {
        let normalized = path::clean(name);
        let mut nodes = self.nodes.write();

        if nodes.contains_key(&normalized) {
            return Err(VfsError::already_exists(normalized));
        }
        check_parent(&nodes, &normalized)?;

        let info = FileInfo::directory(path::base(&normalized), perm);
        nodes.insert(normalized, Node::Directory { info });
        Ok(())
    }

    async fn remove(&self, name: &str) -> VfsResult<()> {
        let normalized = path::clean(name);
        if normalized == "/" {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut nodes = self.nodes.write();
        let is_dir = match nodes.get(&normalized) {
            Some(node) => node.is_dir(),
            None => return Err(VfsError::not_found(normalized)),
        };
        if is_dir && !children(&nodes, &normalized).is_empty() {
            return Err(VfsError::directory_not_empty(normalized));
        }

        nodes.remove(&normalized);
        Ok(())
    }

    async fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        let normalized = path::clean(name);
        self.nodes
            .read()
            .get(&normalized)
            .map(|node| node.info().clone())
            .ok_or_else(|| VfsError::not_found(normalized))
    }

    async fn setattr(&self, name: &str, set: SetAttr) -> VfsResult<()> {
        let normalized = path::clean(name);
        let mut nodes = self.nodes.write();
        let info = nodes
            .get_mut(&normalized)
            .ok_or_else(|| VfsError::not_found(normalized.clone()))?
            .info_mut();

        if let Some(mtime) = set.mtime {
            info.mtime = mtime;
        }
        if let Some(atime) = set.atime {
            info.atime = Some(atime);
        }
        if let Some(perm) = set.perm {
            info.perm = perm;
        }
        if let Some(uid) = set.uid {
            info.uid = Some(uid);
        }
        if let Some(gid) = set.gid {
            info.gid = Some(gid);
        }
        Ok(())
    }

    fn remove_aller(&self) -> Option<&dyn RemoveAll> {
        Some(self)
    }
}

#[async_trait]
impl RemoveAll for MemoryBackend {
    async fn remove_all(&self, name: &str) -> VfsResult<()> {
        let normalized = path::clean(name);
        if normalized == "/" {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut nodes = self.nodes.write();
        if nodes.remove(&normalized).is_none() {
            return Err(VfsError::not_found(normalized));
        }
        let prefix = child_prefix(&normalized);
        nodes.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}

/// Handle to an entry in a [`MemoryBackend`].
#[derive(Debug)]
pub struct MemoryFile {
    nodes: Arc<RwLock<Nodes>>,
    path: String,
    flags: OpenFlags,
    pos: u64,
    /// Name of the last entry handed out by `readdir`.
    listed_after: Option<String>,
    closed: bool,
}

impl MemoryFile {
    fn check_open(&self) -> VfsResult<()> {
        if self.closed {
            Err(VfsError::other(format!("file already closed: {}", self.path)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VfsFile for MemoryFile {
    fn name(&self) -> &str {
        &self.path
    }

    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.check_open()?;
        if !self.flags.read {
            return Err(VfsError::permission_denied(format!(
                "not opened for reading: {}",
                self.path
            )));
        }

        let nodes = self.nodes.read();
        match nodes.get(&self.path) {
            Some(Node::File { data, .. }) => {
                let start = usize::try_from(self.pos).map_or(data.len(), |pos| pos.min(data.len()));
                let n = (data.len() - start).min(buf.len());
                buf[..n].copy_from_slice(&data[start..start + n]);
                self.pos += n as u64;
                Ok(n)
            }
            Some(Node::Directory { .. }) => Err(VfsError::is_a_directory(self.path.clone())),
            None => Err(VfsError::not_found(self.path.clone())),
        }
    }

    async fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        self.check_open()?;
        if !self.flags.writable() {
            return Err(VfsError::permission_denied(format!(
                "not opened for writing: {}",
                self.path
            )));
        }

        let mut nodes = self.nodes.write();
        match nodes.get_mut(&self.path) {
            Some(Node::File { data, info }) => {
                if self.flags.append {
                    self.pos = data.len() as u64;
                }
                let range = usize::try_from(self.pos)
                    .ok()
                    .and_then(|start| Some(start..start.checked_add(buf.len())?));
                let Some(range) = range else {
                    return Err(VfsError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("write at offset {} is out of range: {}", self.pos, self.path),
                    )));
                };
                if range.end > data.len() {
                    data.resize(range.end, 0);
                }
                data[range.clone()].copy_from_slice(buf);
                info.size = data.len() as u64;
                info.mtime = SystemTime::now();
                self.pos = range.end as u64;
                Ok(buf.len())
            }
            Some(Node::Directory { .. }) => Err(VfsError::is_a_directory(self.path.clone())),
            None => Err(VfsError::not_found(self.path.clone())),
        }
    }

    async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.check_open()?;
        let len = self
            .nodes
            .read()
            .get(&self.path)
            .map(|node| node.info().size)
            .ok_or_else(|| VfsError::not_found(self.path.clone()))?;

        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => len.checked_add_signed(delta),
        };
        match target {
            Some(target) => {
                self.pos = target;
                Ok(target)
            }
            None => Err(VfsError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek to a negative offset",
            ))),
        }
    }

    async fn readdir(&mut self, limit: usize) -> VfsResult<Vec<FileInfo>> {
        self.check_open()?;
        let nodes = self.nodes.read();
        match nodes.get(&self.path) {
            Some(Node::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(self.path.clone())),
            None => return Err(VfsError::not_found(self.path.clone())),
        }

        let remaining = children(&nodes, &self.path)
            .into_iter()
            .map(|node| node.info())
            .filter(|info| match &self.listed_after {
                Some(after) => info.name.as_str() > after.as_str(),
                None => true,
            });
        let batch: Vec<FileInfo> = if limit == 0 {
            remaining.cloned().collect()
        } else {
            remaining.take(limit).cloned().collect()
        };

        if let Some(last) = batch.last() {
            self.listed_after = Some(last.name.clone());
        }
        Ok(batch)
    }

    async fn stat(&self) -> VfsResult<FileInfo> {
        self.check_open()?;
        self.nodes
            .read()
            .get(&self.path)
            .map(|node| node.info().clone())
            .ok_or_else(|| VfsError::not_found(self.path.clone()))
    }

    async fn close(&mut self) -> VfsResult<()> {
        self.check_open()?;
        self.closed = true;
        Ok(())
    }
}
