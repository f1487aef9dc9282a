//! Metadata snapshots and open flags.
//!
//! Everything here is a plain value copied out of the backing filesystem per
//! call; nothing holds a reference into a backend.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// What kind of entry a path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

/// Result of `stat`, and one element of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Base name (`""` for the root).
    pub name: String,
    pub size: u64,
    pub kind: FileType,
    /// Permission bits, e.g. `0o644`.
    pub perm: u32,
    pub mtime: SystemTime,
    pub atime: Option<SystemTime>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl FileInfo {
    fn stamped(name: impl Into<String>, kind: FileType, size: u64, perm: u32) -> Self {
        let now = SystemTime::now();
        Self {
            name: name.into(),
            size,
            kind,
            perm,
            mtime: now,
            atime: Some(now),
            uid: None,
            gid: None,
        }
    }

    /// A regular file stamped with the current time.
    pub fn file(name: impl Into<String>, size: u64, perm: u32) -> Self {
        Self::stamped(name, FileType::File, size, perm)
    }

    /// An empty directory stamped with the current time.
    pub fn directory(name: impl Into<String>, perm: u32) -> Self {
        Self::stamped(name, FileType::Directory, 0, perm)
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Directory
    }
}

/// Name and kind of one child, as returned by `read_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileType,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Directory
    }
}

impl From<&FileInfo> for DirEntry {
    fn from(info: &FileInfo) -> Self {
        Self {
            name: info.name.clone(),
            kind: info.kind,
        }
    }
}

/// A metadata update. Backends apply the fields that are `Some` and leave
/// the rest alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAttr {
    pub mtime: Option<SystemTime>,
    pub atime: Option<SystemTime>,
    pub perm: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl SetAttr {
    /// Change permission bits only.
    pub fn perm(perm: u32) -> Self {
        Self {
            perm: Some(perm),
            ..Self::default()
        }
    }

    /// Change access and modification times only.
    pub fn times(atime: SystemTime, mtime: SystemTime) -> Self {
        Self {
            atime: Some(atime),
            mtime: Some(mtime),
            ..Self::default()
        }
    }

    /// Change owner and group only.
    pub fn owner(uid: u32, gid: u32) -> Self {
        Self {
            uid: Some(uid),
            gid: Some(gid),
            ..Self::default()
        }
    }
}

/// How to open a path.
///
/// Every preset except [`read`](Self::read) also grants read access, so a
/// handle opened for writing can be read back without reopening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub create: bool,
    pub truncate: bool,
    /// Fail if the path already exists. Only meaningful with `create`.
    pub exclusive: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::read()
    }
}

impl OpenFlags {
    pub const fn read() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
            exclusive: false,
        }
    }

    pub const fn write() -> Self {
        Self {
            write: true,
            ..Self::read()
        }
    }

    pub const fn append() -> Self {
        Self {
            append: true,
            ..Self::write()
        }
    }

    /// Write, creating the file if missing. Existing content is kept.
    pub const fn create() -> Self {
        Self {
            create: true,
            ..Self::write()
        }
    }

    pub const fn create_exclusive() -> Self {
        Self {
            exclusive: true,
            ..Self::create()
        }
    }

    pub const fn create_truncate() -> Self {
        Self {
            truncate: true,
            ..Self::create()
        }
    }

    /// True if the handle may modify the file.
    pub fn writable(&self) -> bool {
        self.write || self.append
    }
}
