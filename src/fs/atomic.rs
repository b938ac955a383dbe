//! Atomic single-file writes.
//!
//! A concurrent reader or a crash must observe either the prior content of
//! the target (or its absence) or the new content, never a partial write.
//! Payloads that fit in one disk sector are written directly on Linux, where
//! a single-sector write can be assumed atomic. Everything else goes through
//! a temporary file followed by an atomic rename.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{FileSystem, WriteFlags};

/// Assumed disk sector size.
const DEFAULT_DISK_SECTOR_SIZE: usize = 4096;

pub struct AtomicWriter {
    fs: Arc<dyn FileSystem>,
    sync_writes: bool,
    disk_sector_size: usize,
}

impl AtomicWriter {
    pub fn new(fs: Arc<dyn FileSystem>, sync_writes: bool) -> Self {
        AtomicWriter {
            fs,
            sync_writes,
            disk_sector_size: DEFAULT_DISK_SECTOR_SIZE,
        }
    }

    /// Writes `data` to `path` atomically. With `excl`, the write fails if
    /// the target already exists (only enforced on the direct-write path;
    /// the rename path replaces whatever is there).
    pub fn write_file(&self, path: &Path, data: &[u8], excl: bool) -> io::Result<()> {
        let result = self.write_inner(path, data, excl);
        if result.is_ok() && self.sync_writes {
            if let Some(parent) = path.parent() {
                // Durability of the directory entry is best-effort.
                let _ = self.fs.sync_dir(parent);
            }
        }
        result
    }

    fn write_inner(&self, path: &Path, data: &[u8], excl: bool) -> io::Result<()> {
        let flags = WriteFlags {
            excl,
            sync: self.sync_writes,
        };

        if cfg!(target_os = "linux") && data.len() <= self.disk_sector_size {
            return self.fs.write_file(path, data, flags);
        }

        let tmp = temp_path(path);
        self.fs.write_file(&tmp, data, flags)?;
        self.fs.rename(&tmp, path)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("{}-{}-{}-{}", base, std::process::id(), nanos, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::fault::{FaultFs, FsOp};
    use crate::fs::OsFileSystem;
    use crate::tmpfs::TempDir;

    fn os_fs() -> Arc<dyn FileSystem> {
        Arc::new(OsFileSystem::new())
    }

    #[test]
    fn test_small_write() {
        let dir = TempDir::new().expect("temp dir");
        let writer = AtomicWriter::new(os_fs(), false);
        let path = dir.join("small");

        writer.write_file(&path, b"tiny", false).expect("write");
        assert_eq!(std::fs::read(&path).unwrap(), b"tiny");
    }

    #[test]
    fn test_large_write_goes_through_rename() {
        let dir = TempDir::new().expect("temp dir");
        let writer = AtomicWriter::new(os_fs(), false);
        let path = dir.join("large");
        let data = vec![0xabu8; DEFAULT_DISK_SECTOR_SIZE + 1];

        writer.write_file(&path, &data, false).expect("write");
        assert_eq!(std::fs::read(&path).unwrap(), data);

        // No temporary leftovers next to the target.
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["large"]);
    }

    #[test]
    fn test_large_write_replaces_existing() {
        let dir = TempDir::new().expect("temp dir");
        let writer = AtomicWriter::new(os_fs(), false);
        let path = dir.join("large");

        writer.write_file(&path, b"old", false).expect("write");
        let data = vec![7u8; DEFAULT_DISK_SECTOR_SIZE * 2];
        writer.write_file(&path, &data, false).expect("overwrite");
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_exclusive_refuses_existing_target() {
        let dir = TempDir::new().expect("temp dir");
        let writer = AtomicWriter::new(os_fs(), false);
        let path = dir.join("record");

        writer.write_file(&path, b"first", true).expect("create");
        let err = writer.write_file(&path, b"second", true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&path).unwrap(), b"first");
    }

    #[test]
    fn test_sync_writes() {
        let dir = TempDir::new().expect("temp dir");
        let writer = AtomicWriter::new(os_fs(), true);
        let path = dir.join("durable");

        writer.write_file(&path, b"synced", false).expect("write");
        assert_eq!(std::fs::read(&path).unwrap(), b"synced");
    }

    #[test]
    fn test_write_error_propagates() {
        let dir = TempDir::new().expect("temp dir");
        let fs = Arc::new(FaultFs::new(os_fs()));
        fs.fail_with(FsOp::WriteFile, io::ErrorKind::PermissionDenied);

        let writer = AtomicWriter::new(fs, false);
        let err = writer
            .write_file(&dir.join("record"), b"data", false)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_rename_error_propagates() {
        let dir = TempDir::new().expect("temp dir");
        let fs = Arc::new(FaultFs::new(os_fs()));
        fs.fail_with(FsOp::Rename, io::ErrorKind::PermissionDenied);

        let writer = AtomicWriter::new(fs, false);
        let data = vec![1u8; DEFAULT_DISK_SECTOR_SIZE + 1];
        let err = writer
            .write_file(&dir.join("record"), &data, false)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(!dir.join("record").exists());
    }
}
