use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::encoding::bincode;
use crate::error::{Error, Result};
use crate::fs::{AtomicWriter, FileSystem};

/// On-disk format version. A mismatch at open is fatal.
pub(crate) const FORMAT_VERSION: u32 = 1;

pub(crate) const METADATA_DIR: &str = "meta";
const METADATA_FILENAME: &str = "meta.bin";

/// Engine bookkeeping persisted alongside the data tree.
///
/// `generation` advances on every mutation; `checkpoint` is the last
/// generation durably marked consistent. Equal counters after a shutdown
/// mean the store is clean; unequal counters trigger a recount at the next
/// open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Metadata {
    pub version: u32,
    pub total_entries: u64,
    pub generation: u64,
    pub checkpoint: u64,
}

impl Metadata {
    pub fn new() -> Self {
        Metadata {
            version: FORMAT_VERSION,
            total_entries: 0,
            generation: 0,
            checkpoint: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != FORMAT_VERSION {
            return Err(Error::VersionMismatch {
                expected: FORMAT_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }
}

/// Loads and saves the metadata blob under `<root>/meta/meta.bin`.
pub(crate) struct MetadataStore {
    fs: Arc<dyn FileSystem>,
    file_path: PathBuf,
    writer: AtomicWriter,
}

impl MetadataStore {
    /// Metadata writes stay buffered even when the database itself uses
    /// synchronous writes; the checkpoint scheme tolerates losing them.
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        let file_path = root.into().join(METADATA_DIR).join(METADATA_FILENAME);
        let writer = AtomicWriter::new(Arc::clone(&fs), false);
        MetadataStore {
            fs,
            file_path,
            writer,
        }
    }

    pub fn load(&self) -> Result<Metadata> {
        let data = self
            .fs
            .read_file(&self.file_path)
            .map_err(|e| Error::Corruption(format!("read metadata: {e}")))?;
        bincode::deserialize(&data)
    }

    pub fn save(&self, metadata: &Metadata) -> Result<()> {
        let data = bincode::serialize(metadata)?;
        self.writer
            .write_file(&self.file_path, &data, false)
            .map_err(|e| Error::io("write metadata", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{OsFileSystem, DIR_MODE};
    use crate::tmpfs::TempDir;

    fn store_in(dir: &TempDir) -> MetadataStore {
        let fs: Arc<dyn FileSystem> = Arc::new(OsFileSystem::new());
        fs.create_dir_all(&dir.path().join(METADATA_DIR), DIR_MODE)
            .expect("mkdir");
        MetadataStore::new(fs, dir.path())
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().expect("temp dir");
        let store = store_in(&dir);

        let metadata = Metadata {
            version: FORMAT_VERSION,
            total_entries: 42,
            generation: 7,
            checkpoint: 6,
        };
        store.save(&metadata).expect("save");
        assert_eq!(store.load().expect("load"), metadata);
    }

    #[test]
    fn test_load_missing_is_corruption() {
        let dir = TempDir::new().expect("temp dir");
        let store = store_in(&dir);
        assert!(matches!(store.load(), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_load_garbage_is_corruption() {
        let dir = TempDir::new().expect("temp dir");
        let store = store_in(&dir);

        let path = dir.path().join(METADATA_DIR).join(METADATA_FILENAME);
        std::fs::write(&path, b"not metadata").expect("write");
        assert!(matches!(store.load(), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_validate_version() {
        let mut metadata = Metadata::new();
        assert!(metadata.validate().is_ok());

        metadata.version = 99;
        assert_eq!(
            metadata.validate(),
            Err(Error::VersionMismatch {
                expected: FORMAT_VERSION,
                found: 99
            })
        );
    }
}
