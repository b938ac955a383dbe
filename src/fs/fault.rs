//! Deterministic fault injection for tests.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{FileInfo, FileSystem, WriteFlags};

/// Gateway operation kinds, used to select which calls fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOp {
    Stat,
    ReadFile,
    ReadDir,
    WriteFile,
    RemoveFile,
    Rename,
    CreateDir,
    SyncDir,
}

/// A gateway that delegates to an inner [`FileSystem`] but fails selected
/// operation kinds with a configured error.
pub struct FaultFs {
    inner: Arc<dyn FileSystem>,
    faults: Mutex<HashMap<FsOp, io::ErrorKind>>,
}

impl FaultFs {
    pub fn new(inner: Arc<dyn FileSystem>) -> Self {
        FaultFs {
            inner,
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Makes every subsequent call of the given kind fail.
    pub fn fail_with(&self, op: FsOp, kind: io::ErrorKind) {
        self.faults.lock().unwrap().insert(op, kind);
    }

    /// Clears an injected fault.
    pub fn reset(&self, op: FsOp) {
        self.faults.lock().unwrap().remove(&op);
    }

    fn check(&self, op: FsOp) -> io::Result<()> {
        match self.faults.lock().unwrap().get(&op) {
            Some(kind) => Err(io::Error::new(*kind, "injected fault")),
            None => Ok(()),
        }
    }
}

impl FileSystem for FaultFs {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        self.check(FsOp::Stat)?;
        self.inner.stat(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.check(FsOp::ReadFile)?;
        self.inner.read_file(path)
    }

    fn read_dir_names(&self, path: &Path) -> io::Result<Vec<String>> {
        self.check(FsOp::ReadDir)?;
        self.inner.read_dir_names(path)
    }

    fn write_file(&self, path: &Path, data: &[u8], flags: WriteFlags) -> io::Result<()> {
        self.check(FsOp::WriteFile)?;
        self.inner.write_file(path, data, flags)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.check(FsOp::RemoveFile)?;
        self.inner.remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.check(FsOp::Rename)?;
        self.inner.rename(from, to)
    }

    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.check(FsOp::CreateDir)?;
        self.inner.create_dir_all(path, mode)
    }

    fn sync_dir(&self, path: &Path) -> io::Result<()> {
        self.check(FsOp::SyncDir)?;
        self.inner.sync_dir(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use crate::tmpfs::TempDir;

    #[test]
    fn test_delegates_when_clear() {
        let dir = TempDir::new().expect("temp dir");
        let fs = FaultFs::new(Arc::new(OsFileSystem::new()));
        let path = dir.join("file");

        fs.write_file(&path, b"x", WriteFlags::default())
            .expect("write");
        assert_eq!(fs.read_file(&path).expect("read"), b"x");
    }

    #[test]
    fn test_injected_fault_and_reset() {
        let dir = TempDir::new().expect("temp dir");
        let fs = FaultFs::new(Arc::new(OsFileSystem::new()));
        let path = dir.join("file");
        fs.write_file(&path, b"x", WriteFlags::default())
            .expect("write");

        fs.fail_with(FsOp::ReadFile, io::ErrorKind::PermissionDenied);
        let err = fs.read_file(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        // Other operations are unaffected.
        assert!(fs.stat(&path).is_ok());

        fs.reset(FsOp::ReadFile);
        assert_eq!(fs.read_file(&path).expect("read"), b"x");
    }
}
