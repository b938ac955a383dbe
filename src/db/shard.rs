use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fs::{FileSystem, DIR_MODE};

/// Name of the reserved rightmost shard. In base32hex the alphabet is
/// `0-9A-V`, so `_` sorts strictly above every legal key token and the
/// sentinel covers all keys beyond every other upper bound.
pub(crate) const SENTINEL_SHARD: &str = "_";

/// One data subdirectory. Its name is the inclusive upper bound on the key
/// tokens stored inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Shard {
    pub max_key: String,
    pub count: u64,
}

/// In-memory directory of shards, ordered by upper bound.
#[derive(Debug)]
pub(crate) struct ShardIndex {
    shards: Vec<Shard>,
}

impl ShardIndex {
    /// The index of a freshly created store: a single sentinel shard.
    pub fn bootstrap() -> Self {
        ShardIndex {
            shards: vec![Shard {
                max_key: SENTINEL_SHARD.to_string(),
                count: 0,
            }],
        }
    }

    /// Reads the shard layout from the data root. Fails if the sentinel is
    /// not the last (greatest-named) subdirectory.
    pub fn load(fs: &dyn FileSystem, data_root: &Path) -> Result<Self> {
        let mut names = fs
            .read_dir_names(data_root)
            .map_err(|e| Error::io("read data dir", e))?;
        names.sort_unstable();

        let mut shards = Vec::with_capacity(names.len());
        for name in names {
            let count = fs
                .read_dir_names(&data_root.join(&name))
                .map_err(|e| Error::io("read shard dir", e))?
                .len() as u64;
            shards.push(Shard {
                max_key: name,
                count,
            });
        }

        match shards.last() {
            Some(last) if last.max_key == SENTINEL_SHARD => Ok(ShardIndex { shards }),
            _ => Err(Error::Corruption("sentinel shard is missing".to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard owning `token`: the first whose upper bound is
    /// at least `token`. The sentinel guarantees a match for legal tokens.
    pub fn locate(&self, token: &str) -> usize {
        self.shards
            .partition_point(|s| s.max_key.as_str() < token)
    }

    pub fn dir(&self, data_root: &Path, idx: usize) -> PathBuf {
        data_root.join(&self.shards[idx].max_key)
    }

    pub fn count(&self, idx: usize) -> u64 {
        self.shards[idx].count
    }

    pub fn increment(&mut self, idx: usize) {
        self.shards[idx].count += 1;
    }

    pub fn decrement(&mut self, idx: usize) {
        self.shards[idx].count -= 1;
    }

    /// Sum of all shard file counts.
    pub fn total_files(&self) -> u64 {
        self.shards.iter().map(|s| s.count).sum()
    }

    #[cfg(test)]
    pub fn max_keys(&self) -> Vec<&str> {
        self.shards.iter().map(|s| s.max_key.as_str()).collect()
    }

    /// Splits shard `idx` in two: the lower half of its files moves into a
    /// new directory named after the highest token that stays in the lower
    /// half, so upper bounds remain strictly increasing. Shards with fewer
    /// than two files are left alone.
    pub fn split(
        &mut self,
        idx: usize,
        fs: &dyn FileSystem,
        data_root: &Path,
        sync_writes: bool,
    ) -> Result<()> {
        let old_dir = data_root.join(&self.shards[idx].max_key);
        let mut files = fs
            .read_dir_names(&old_dir)
            .map_err(|e| Error::io("read shard dir", e))?;
        if files.len() < 2 {
            return Ok(());
        }
        files.sort_unstable();

        let mid = files.len() / 2;
        let new_max = files[mid - 1].clone();
        let new_dir = data_root.join(&new_max);

        fs.create_dir_all(&new_dir, DIR_MODE)
            .map_err(|e| Error::io("create shard dir", e))?;
        for name in &files[..mid] {
            fs.rename(&old_dir.join(name), &new_dir.join(name))
                .map_err(|e| Error::io("move record", e))?;
        }

        self.shards[idx].count = (files.len() - mid) as u64;
        self.shards.insert(
            idx,
            Shard {
                max_key: new_max,
                count: mid as u64,
            },
        );

        if sync_writes {
            let _ = fs.sync_dir(&new_dir);
        }

        tracing::debug!(
            shard = %self.shards[idx].max_key,
            moved = mid,
            "split shard"
        );
        Ok(())
    }
}
