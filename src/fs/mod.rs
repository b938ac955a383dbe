//! Narrow filesystem gateway.
//!
//! The database performs all disk access through the [`FileSystem`] trait so
//! tests can substitute a deterministic fault injector. The OS-backed
//! implementation is [`OsFileSystem`]. The one hard requirement on any
//! implementation is that `rename` is atomic: the destination either becomes
//! the source's content or neither endpoint is modified.

pub mod atomic;
pub mod fault;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

pub use atomic::AtomicWriter;
pub use fault::{FaultFs, FsOp};

/// Default permissions for record and metadata files.
pub const FILE_MODE: u32 = 0o600;

/// Default permissions for database directories.
pub const DIR_MODE: u32 = 0o700;

/// The subset of file status the engine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub is_dir: bool,
    pub len: u64,
    /// Unix permission bits. Always readable/writable on platforms without
    /// a permission mode.
    pub mode: u32,
}

/// Flags for a single-file write.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteFlags {
    /// Refuse to overwrite an existing file.
    pub excl: bool,
    /// Open with O_SYNC semantics so the data reaches stable storage before
    /// the write returns.
    pub sync: bool,
}

pub trait FileSystem: Send + Sync {
    fn stat(&self, path: &Path) -> io::Result<FileInfo>;

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Lists the names of a directory's immediate children, unsorted.
    fn read_dir_names(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Creates or truncates `path` and writes `data` to it in full.
    fn write_file(&self, path: &Path, data: &[u8], flags: WriteFlags) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Atomically replaces `to` with `from`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Flushes a directory's entries to stable storage.
    fn sync_dir(&self, path: &Path) -> io::Result<()>;
}

/// OS-backed gateway.
pub struct OsFileSystem;

impl OsFileSystem {
    pub fn new() -> Self {
        OsFileSystem
    }
}

impl Default for OsFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for OsFileSystem {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let md = fs::metadata(path)?;
        Ok(FileInfo {
            is_dir: md.is_dir(),
            len: md.len(),
            mode: mode_of(&md),
        })
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_dir_names(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let name = entry?.file_name().into_string().map_err(|name| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("non-UTF-8 file name: {name:?}"),
                )
            })?;
            names.push(name);
        }
        Ok(names)
    }

    fn write_file(&self, path: &Path, data: &[u8], flags: WriteFlags) -> io::Result<()> {
        let mut f = open_for_write(path, flags)?;
        f.write_all(data)?;
        // Without O_SYNC support the durability request is served by an
        // explicit flush after the write.
        #[cfg(not(unix))]
        if flags.sync {
            f.sync_all()?;
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        make_dir_all(path, mode)
    }

    fn sync_dir(&self, path: &Path) -> io::Result<()> {
        File::open(path)?.sync_all()
    }
}

#[cfg(unix)]
fn mode_of(md: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    md.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn mode_of(_md: &fs::Metadata) -> u32 {
    DIR_MODE
}

#[cfg(unix)]
fn open_for_write(path: &Path, flags: WriteFlags) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut opts = OpenOptions::new();
    opts.write(true).mode(FILE_MODE);
    if flags.excl {
        opts.create_new(true);
    } else {
        opts.create(true).truncate(true);
    }
    if flags.sync {
        opts.custom_flags(libc::O_SYNC);
    }
    opts.open(path)
}

#[cfg(not(unix))]
fn open_for_write(path: &Path, flags: WriteFlags) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true);
    if flags.excl {
        opts.create_new(true);
    } else {
        opts.create(true).truncate(true);
    }
    opts.open(path)
}

#[cfg(unix)]
fn make_dir_all(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(mode).create(path)
}

#[cfg(not(unix))]
fn make_dir_all(path: &Path, _mode: u32) -> io::Result<()> {
    fs::DirBuilder::new().recursive(true).create(path)
}
