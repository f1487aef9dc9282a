//! Recursive removal against fault-injecting backends.
//!
//! `Faulty` wraps a `MemoryBackend`, records every call it sees, and can be
//! told to fail specific operations on specific paths. Unless a test opts in,
//! it hides the memory backend's native bulk delete so the walk is exercised.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use httpfs::{
    FileInfo, Filer, Httpfs, HttpfsConfig, MemoryBackend, OpenFlags, RemoveAll, SetAttr, VfsError,
    VfsFile, VfsResult,
};
use parking_lot::Mutex;

/// Fail an operation, optionally only for one path.
#[derive(Clone, Copy)]
struct Fault {
    path: Option<&'static str>,
    error: fn(String) -> VfsError,
}

impl Fault {
    fn any(error: fn(String) -> VfsError) -> Self {
        Self { path: None, error }
    }

    fn at(path: &'static str, error: fn(String) -> VfsError) -> Self {
        Self {
            path: Some(path),
            error,
        }
    }

    fn check(fault: &Option<Fault>, path: &str) -> VfsResult<()> {
        match fault {
            Some(f) if f.path.is_none_or(|p| p == path) => Err((f.error)(path.to_string())),
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
struct Faults {
    stat: Option<Fault>,
    open: Option<Fault>,
    readdir: Option<Fault>,
    /// `readdir` calls allowed to succeed before the readdir fault fires.
    readdir_ok_batches: usize,
    remove: Option<Fault>,
    native: Option<Fault>,
    /// Directory removes succeed but report "directory not empty".
    remove_dir_lies: bool,
    /// Listings include synthetic `.` and `..` entries.
    dot_entries: bool,
    /// Advertise the memory backend's native bulk delete.
    expose_native: bool,
}

struct Faulty {
    inner: MemoryBackend,
    faults: Faults,
    calls: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl Faulty {
    fn new(inner: MemoryBackend, faults: Faults) -> Self {
        Self {
            inner,
            faults,
            calls: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn record(&self, op: &str, path: &str) {
        self.calls.lock().push(format!("{op} {path}"));
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Filer for Faulty {
    async fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: u32,
    ) -> VfsResult<Box<dyn VfsFile>> {
        self.record("open", name);
        Fault::check(&self.faults.open, name)?;
        let inner = self.inner.open_file(name, flags, perm).await?;
        Ok(Box::new(FaultyFile {
            inner,
            readdir: self.faults.readdir,
            readdir_ok_batches: self.faults.readdir_ok_batches,
            batches: 0,
            dot_entries: self.faults.dot_entries,
            closes: Arc::clone(&self.closes),
        }))
    }

    async fn mkdir(&self, name: &str, perm: u32) -> VfsResult<()> {
        self.inner.mkdir(name, perm).await
    }

    async fn remove(&self, name: &str) -> VfsResult<()> {
        self.record("remove", name);
        Fault::check(&self.faults.remove, name)?;
        let is_dir = self.inner.stat(name).await.map(|i| i.is_dir()).unwrap_or(false);
        self.inner.remove(name).await?;
        if is_dir && self.faults.remove_dir_lies {
            return Err(VfsError::directory_not_empty(name));
        }
        Ok(())
    }

    async fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        self.record("stat", name);
        Fault::check(&self.faults.stat, name)?;
        self.inner.stat(name).await
    }

    async fn setattr(&self, name: &str, attr: SetAttr) -> VfsResult<()> {
        self.inner.setattr(name, attr).await
    }

    fn remove_aller(&self) -> Option<&dyn RemoveAll> {
        if self.faults.expose_native {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl RemoveAll for Faulty {
    async fn remove_all(&self, name: &str) -> VfsResult<()> {
        self.record("native", name);
        Fault::check(&self.faults.native, name)?;
        self.inner.remove_all(name).await
    }
}

struct FaultyFile {
    inner: Box<dyn VfsFile>,
    readdir: Option<Fault>,
    readdir_ok_batches: usize,
    batches: usize,
    dot_entries: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl VfsFile for FaultyFile {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner.read(buf).await
    }

    async fn write(&mut self, data: &[u8]) -> VfsResult<usize> {
        self.inner.write(data).await
    }

    async fn seek(&mut self, pos: std::io::SeekFrom) -> VfsResult<u64> {
        self.inner.seek(pos).await
    }

    async fn readdir(&mut self, limit: usize) -> VfsResult<Vec<FileInfo>> {
        let name = self.inner.name().to_string();
        if self.batches >= self.readdir_ok_batches {
            Fault::check(&self.readdir, &name)?;
        }
        self.batches += 1;
        let mut entries = self.inner.readdir(limit).await?;
        if self.dot_entries && limit == 0 {
            entries.insert(0, FileInfo::directory("..", 0o755));
            entries.insert(0, FileInfo::directory(".", 0o755));
        }
        Ok(entries)
    }

    async fn stat(&self) -> VfsResult<FileInfo> {
        self.inner.stat().await
    }

    async fn close(&mut self) -> VfsResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

async fn touch(fs: &MemoryBackend, name: &str) {
    let mut f = fs
        .open_file(name, OpenFlags::create(), 0o644)
        .await
        .unwrap();
    f.write(name.as_bytes()).await.unwrap();
    f.close().await.unwrap();
}

/// `/a/file1.txt`, `/a/b/file2.txt`, `/a/b/c/file3.txt`
async fn populated() -> MemoryBackend {
    let mem = MemoryBackend::new();
    let fs = Httpfs::new(Arc::new(mem.clone()));
    fs.mkdir_all("/a/b/c", 0o755).await.unwrap();
    for name in ["/a/file1.txt", "/a/b/file2.txt", "/a/b/c/file3.txt"] {
        touch(&mem, name).await;
    }
    mem
}

fn adapter(faulty: Arc<Faulty>) -> Httpfs {
    Httpfs::new(faulty)
}

#[tokio::test]
async fn removes_whole_tree_by_walking() {
    let mem = populated().await;
    let faulty = Arc::new(Faulty::new(mem.clone(), Faults::default()));
    let fs = adapter(Arc::clone(&faulty));

    fs.remove_all("/a").await.unwrap();

    assert!(fs.stat("/a").await.unwrap_err().is_not_found());
    assert!(mem.is_empty());
    assert!(!faulty.calls().iter().any(|c| c.starts_with("native")));
}

#[tokio::test]
async fn missing_path_is_success() {
    let faulty = Arc::new(Faulty::new(MemoryBackend::new(), Faults::default()));
    let fs = adapter(Arc::clone(&faulty));

    fs.remove_all("/nonexistent").await.unwrap();
    fs.remove_all("/nonexistent/deeper/still").await.unwrap();
    assert_eq!(
        faulty.calls(),
        vec!["stat /nonexistent", "stat /nonexistent/deeper/still"]
    );
}

#[tokio::test]
async fn file_is_a_single_remove() {
    let mem = MemoryBackend::new();
    touch(&mem, "/test.txt").await;
    let faulty = Arc::new(Faulty::new(mem.clone(), Faults::default()));
    let fs = adapter(Arc::clone(&faulty));

    fs.remove_all("/test.txt").await.unwrap();

    assert_eq!(faulty.calls(), vec!["stat /test.txt", "remove /test.txt"]);
    assert!(mem.stat("/test.txt").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn file_remove_error_is_returned() {
    let mem = MemoryBackend::new();
    touch(&mem, "/locked").await;
    let faults = Faults {
        remove: Some(Fault::any(VfsError::permission_denied)),
        ..Default::default()
    };
    let fs = adapter(Arc::new(Faulty::new(mem, faults)));

    let err = fs.remove_all("/locked").await.unwrap_err();
    assert!(matches!(err, VfsError::PermissionDenied(ref p) if p == "/locked"));
}

#[tokio::test]
async fn first_child_failure_stops_the_walk() {
    let mem = MemoryBackend::new();
    mem.mkdir("/d", 0o755).await.unwrap();
    for name in ["/d/a", "/d/b", "/d/c"] {
        touch(&mem, name).await;
    }
    let faults = Faults {
        remove: Some(Fault::at("/d/b", VfsError::permission_denied)),
        ..Default::default()
    };
    let faulty = Arc::new(Faulty::new(mem.clone(), faults));
    let fs = adapter(Arc::clone(&faulty));

    let err = fs.remove_all("/d").await.unwrap_err();
    assert!(matches!(err, VfsError::PermissionDenied(ref p) if p == "/d/b"));

    // Earlier sibling gone, later sibling and the parent untouched
    assert!(mem.stat("/d/a").await.unwrap_err().is_not_found());
    assert!(mem.stat("/d/b").await.is_ok());
    assert!(mem.stat("/d/c").await.is_ok());
    assert!(mem.stat("/d").await.is_ok());
    assert!(!faulty.calls().iter().any(|c| c.ends_with("/d/c")));
}

#[tokio::test]
async fn not_empty_error_is_ignored_when_directory_is_gone() {
    let mem = populated().await;
    let faults = Faults {
        remove_dir_lies: true,
        ..Default::default()
    };
    let fs = adapter(Arc::new(Faulty::new(mem.clone(), faults)));

    fs.remove_all("/a").await.unwrap();
    assert!(mem.is_empty());
}

#[tokio::test]
async fn final_remove_error_kept_when_directory_remains() {
    let mem = MemoryBackend::new();
    mem.mkdir("/keep", 0o755).await.unwrap();
    touch(&mem, "/keep/child").await;
    let faults = Faults {
        remove: Some(Fault::at("/keep", VfsError::directory_not_empty)),
        ..Default::default()
    };
    let fs = adapter(Arc::new(Faulty::new(mem.clone(), faults)));

    let err = fs.remove_all("/keep").await.unwrap_err();
    assert!(err.is_not_empty());
    assert!(mem.stat("/keep").await.is_ok());
    assert!(mem.stat("/keep/child").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn deep_nesting() {
    let mem = MemoryBackend::new();
    let fs = adapter(Arc::new(Faulty::new(mem.clone(), Faults::default())));

    fs.mkdir_all("/a/b/c/d/e/f/g/h/i/j", 0o755).await.unwrap();
    touch(&mem, "/a/b/c/d/e/f/g/h/i/j/file.txt").await;

    fs.remove_all("/a").await.unwrap();
    assert!(fs.stat("/a").await.unwrap_err().is_not_found());
    assert!(mem.is_empty());
}

#[tokio::test]
async fn stat_error_propagates() {
    let mem = populated().await;
    let faults = Faults {
        stat: Some(Fault::any(VfsError::other)),
        ..Default::default()
    };
    let fs = adapter(Arc::new(Faulty::new(mem.clone(), faults)));

    let err = fs.remove_all("/a").await.unwrap_err();
    assert!(matches!(err, VfsError::Other(ref p) if p == "/a"));
    assert_eq!(mem.len(), 7);
    assert!(mem.stat("/a/b/c/file3.txt").await.is_ok());
}

#[tokio::test]
async fn open_error_propagates() {
    let mem = populated().await;
    let faults = Faults {
        open: Some(Fault::any(VfsError::permission_denied)),
        ..Default::default()
    };
    let fs = adapter(Arc::new(Faulty::new(mem.clone(), faults)));

    let err = fs.remove_all("/a").await.unwrap_err();
    assert!(matches!(err, VfsError::PermissionDenied(_)));
    assert!(mem.stat("/a/file1.txt").await.is_ok());
}

#[tokio::test]
async fn open_not_found_is_success() {
    let mem = populated().await;
    let faults = Faults {
        open: Some(Fault::any(VfsError::not_found)),
        ..Default::default()
    };
    let fs = adapter(Arc::new(Faulty::new(mem, faults)));

    fs.remove_all("/a").await.unwrap();
}

#[tokio::test]
async fn readdir_error_propagates_and_closes_handle() {
    let mem = populated().await;
    let faults = Faults {
        readdir: Some(Fault::any(VfsError::other)),
        ..Default::default()
    };
    let faulty = Arc::new(Faulty::new(mem.clone(), faults));
    let fs = adapter(Arc::clone(&faulty));

    let err = fs.remove_all("/a").await.unwrap_err();
    assert!(matches!(err, VfsError::Other(ref p) if p == "/a"));
    assert_eq!(faulty.closes.load(Ordering::SeqCst), 1);
    assert!(mem.stat("/a/file1.txt").await.is_ok());
}

#[tokio::test]
async fn every_directory_handle_is_closed() {
    let mem = populated().await;
    let faulty = Arc::new(Faulty::new(mem, Faults::default()));
    let fs = adapter(Arc::clone(&faulty));

    fs.remove_all("/a").await.unwrap();
    // /a, /a/b, /a/b/c
    assert_eq!(faulty.closes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn synthetic_dot_entries_are_skipped() {
    let mem = populated().await;
    let faults = Faults {
        dot_entries: true,
        ..Default::default()
    };
    let faulty = Arc::new(Faulty::new(mem.clone(), faults));
    let fs = adapter(Arc::clone(&faulty));

    fs.remove_all("/a").await.unwrap();
    assert!(mem.is_empty());
    // Joining `..` would have reached the root
    assert!(!faulty.calls().iter().any(|c| c == "stat /"));
}

#[tokio::test]
async fn native_bulk_delete_is_preferred() {
    let mem = populated().await;
    let faults = Faults {
        expose_native: true,
        ..Default::default()
    };
    let faulty = Arc::new(Faulty::new(mem.clone(), faults));
    let fs = adapter(Arc::clone(&faulty));

    fs.remove_all("/a").await.unwrap();
    assert_eq!(faulty.calls(), vec!["native /a"]);
    assert!(mem.is_empty());

    // NotFound from the native call is success too
    fs.remove_all("/a").await.unwrap();
    assert_eq!(faulty.calls(), vec!["native /a", "native /a"]);
}

#[tokio::test]
async fn native_errors_propagate() {
    let mem = populated().await;
    let faults = Faults {
        expose_native: true,
        native: Some(Fault::any(VfsError::permission_denied)),
        ..Default::default()
    };
    let fs = adapter(Arc::new(Faulty::new(mem.clone(), faults)));

    let err = fs.remove_all("/a").await.unwrap_err();
    assert!(matches!(err, VfsError::PermissionDenied(_)));
    assert_eq!(mem.len(), 7);
    assert!(mem.stat("/a/b/c/file3.txt").await.is_ok());
}

#[tokio::test]
async fn native_can_be_disabled_by_config() {
    let mem = populated().await;
    let faults = Faults {
        expose_native: true,
        ..Default::default()
    };
    let faulty = Arc::new(Faulty::new(mem.clone(), faults));
    let config = HttpfsConfig::from_ron_str("(use_native_remove_all: false)").unwrap();
    let fs = Httpfs::with_config(faulty.clone(), config);

    fs.remove_all("/a").await.unwrap();
    assert!(mem.is_empty());
    assert!(!faulty.calls().iter().any(|c| c.starts_with("native")));
}

#[tokio::test]
async fn local_backend_without_native_delete() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("site/assets/img")).unwrap();
    std::fs::write(dir.path().join("site/index.html"), "<html>").unwrap();
    std::fs::write(dir.path().join("site/assets/img/logo.png"), [0u8; 16]).unwrap();

    let local = httpfs::LocalBackend::new(dir.path());
    let config = HttpfsConfig {
        use_native_remove_all: false,
        ..Default::default()
    };
    let fs = Httpfs::with_config(Arc::new(local), config);

    fs.remove_all("/site").await.unwrap();
    assert!(!dir.path().join("site").exists());
    fs.remove_all("/site").await.unwrap();
}

#[tokio::test]
async fn depth_limit_from_config() {
    let mem = populated().await;
    let faulty = Arc::new(Faulty::new(mem.clone(), Faults::default()));
    let shallow = HttpfsConfig::from_ron_str("(max_depth: 2)").unwrap();
    let fs = Httpfs::with_config(faulty.clone(), shallow);

    let err = fs.remove_all("/a").await.unwrap_err();
    assert!(matches!(err, VfsError::TooDeep(ref p) if p == "/a/b/c/file3.txt"));
    // The guard trips before anything is removed
    assert_eq!(mem.len(), 7);
    assert!(!faulty.calls().iter().any(|c| c.starts_with("remove")));

    let deep_enough = HttpfsConfig::from_ron_str("(max_depth: 3)").unwrap();
    Httpfs::with_config(faulty, deep_enough)
        .remove_all("/a")
        .await
        .unwrap();
    assert!(mem.is_empty());
}

#[tokio::test]
async fn paged_listing_removes_everything() {
    let mem = populated().await;
    let faulty = Arc::new(Faulty::new(mem.clone(), Faults::default()));
    let config = HttpfsConfig::from_ron_str("(list_limit: 1)").unwrap();
    let fs = Httpfs::with_config(faulty.clone(), config);

    fs.remove_all("/a").await.unwrap();
    assert!(mem.is_empty());
    assert_eq!(faulty.closes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn paged_listing_error_still_closes_handle() {
    let mem = populated().await;
    let faults = Faults {
        readdir: Some(Fault::at("/a", VfsError::other)),
        readdir_ok_batches: 1,
        ..Default::default()
    };
    let faulty = Arc::new(Faulty::new(mem.clone(), faults));
    let config = HttpfsConfig::from_ron_str("(list_limit: 1)").unwrap();
    let fs = Httpfs::with_config(faulty.clone(), config);

    let err = fs.remove_all("/a").await.unwrap_err();
    assert!(matches!(err, VfsError::Other(ref p) if p == "/a"));
    assert_eq!(faulty.closes.load(Ordering::SeqCst), 1);
    // The first batch was read but nothing was removed
    assert_eq!(mem.len(), 7);
}
