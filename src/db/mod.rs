//! The database core.
//!
//! Each record is one regular file: the filename is the order-preserving
//! token of the key and the file content is the value. Record files live in
//! shard directories named by their inclusive upper-bound token, so the
//! filesystem's own name ordering represents key ordering. A reserved
//! sentinel shard sorts above every legal token and keeps the shard
//! sequence total.
//!
//! All mutations are single-file operations performed through the atomic
//! writer, which keeps recovery trivial: the only state that can drift
//! across a crash is the entry count, detected through the
//! generation/checkpoint pair and corrected by a recount at open.

mod init;
mod metadata;
mod shard;
mod tasks;

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock, TryLockError};

use crate::cache::Cache;
use crate::config::Config;
use crate::encoding::keycode;
use crate::error::{Error, Result};
use crate::fs::{AtomicWriter, FileSystem, OsFileSystem};

use metadata::{Metadata, MetadataStore};
use shard::ShardIndex;
use tasks::SyncTask;

/// Maximum length of a raw key, in bytes. The limit keeps encoded tokens
/// within typical path-component limits.
pub const MAX_KEY_LENGTH: usize = 128;

pub(crate) const DATA_DIR: &str = "data";

/// Iteration direction for [`Db::items`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Ascending lexical order of raw keys.
    Asc,
    /// Descending lexical order of raw keys.
    Desc,
}

/// An embedded, ordered, persistent key-value store.
///
/// Created with [`Db::open`]. Client applications should call
/// [`Db::close`] when done; dropping the handle closes it as a fallback.
///
/// A `Db` is safe for concurrent use from multiple threads.
pub struct Db {
    shared: Arc<Shared>,
    sync_task: Mutex<Option<SyncTask>>,
}

/// State shared with the background sync worker.
pub(crate) struct Shared {
    config: Config,
    data_root: PathBuf,
    fs: Arc<dyn FileSystem>,
    writer: AtomicWriter,
    metadata_store: MetadataStore,
    state: RwLock<State>,
}

/// Mutable engine state, guarded by one reader/writer lock.
pub(crate) struct State {
    metadata: Metadata,
    shards: ShardIndex,
    cache: Cache,
    closed: bool,
}

impl Db {
    /// Opens the database at the given path, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Db> {
        Self::open_with_config(Config::new(dir))
    }

    /// Opens the database described by `config`.
    pub fn open_with_config(config: Config) -> Result<Db> {
        Self::open_with_fs(config, Arc::new(OsFileSystem::new()))
    }

    /// Opens the database on top of an injected filesystem gateway.
    pub fn open_with_fs(config: Config, fs: Arc<dyn FileSystem>) -> Result<Db> {
        let data_root = config.dir.join(DATA_DIR);
        let metadata_store = MetadataStore::new(Arc::clone(&fs), config.dir.clone());
        let writer = AtomicWriter::new(Arc::clone(&fs), config.sync_writes);

        let state = State {
            metadata: Metadata::new(),
            shards: ShardIndex::bootstrap(),
            cache: Cache::new(config.cache_size),
            closed: false,
        };
        let shared = Arc::new(Shared {
            config,
            data_root,
            fs,
            writer,
            metadata_store,
            state: RwLock::new(state),
        });

        init::initialize(&shared)?;

        let sync_task = if shared.config.auto_sync {
            let task = tasks::spawn(Arc::clone(&shared))
                .map_err(|e| Error::io("spawn sync task", e))?;
            Some(task)
        } else {
            None
        };

        Ok(Db {
            shared,
            sync_task: Mutex::new(sync_task),
        })
    }

    /// Reports whether a key exists.
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        let state = self.shared.state.read()?;
        if state.closed {
            return Err(Error::Closed);
        }

        if state.cache.get(key).is_some() {
            return Ok(true);
        }

        let (path, _) = self.record_path(&state, key);
        match self.shared.fs.stat(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io("stat record", e)),
        }
    }

    /// Retrieves the value for a key, or `None` if it is absent.
    ///
    /// A miss reads straight from disk and is not written back to the
    /// cache; only `put` populates it.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.shared.state.read()?;
        if state.closed {
            return Err(Error::Closed);
        }

        if let Some(value) = state.cache.get(key) {
            return Ok(Some(value));
        }

        let (path, _) = self.record_path(&state, key);
        match self.shared.fs.read_file(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io("read record", e)),
        }
    }

    /// Adds a key-value pair, overwriting any existing value.
    ///
    /// Fails with [`Error::KeyTooLarge`] for keys over [`MAX_KEY_LENGTH`]
    /// bytes.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.shared.prepare_for_mutation()?;
        if key.len() > MAX_KEY_LENGTH {
            return Err(Error::KeyTooLarge(key.len()));
        }

        let mut state = self.shared.state.write()?;
        if state.closed {
            return Err(Error::Closed);
        }

        let (path, shard_id) = self.record_path(&state, key);
        let updated = self.shared.put_path(&path, value)?;

        if !updated {
            state.shards.increment(shard_id);
            state.metadata.total_entries += 1;
        }
        state.metadata.generation += 1;

        if state.shards.count(shard_id) > self.shared.config.max_files_per_shard {
            state.shards.split(
                shard_id,
                self.shared.fs.as_ref(),
                &self.shared.data_root,
                self.shared.config.sync_writes,
            )?;
        }

        state.cache.put(key.to_vec(), value.to_vec());
        Ok(())
    }

    /// Removes a key-value pair. Removing an absent key is not an error.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.shared.prepare_for_mutation()?;

        let mut state = self.shared.state.write()?;
        if state.closed {
            return Err(Error::Closed);
        }

        let (path, shard_id) = self.record_path(&state, key);
        let deleted = match self.shared.fs.remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::io("remove record", e)),
        };

        if deleted {
            state.shards.decrement(shard_id);
            state.metadata.total_entries -= 1;
        }
        state.metadata.generation += 1;

        state.cache.delete(key);
        Ok(())
    }

    /// Iterates over key-value pairs in the given direction, invoking
    /// `f(key, value)` for each pair. Iteration stops early when `f`
    /// returns `Ok(false)` or an error.
    ///
    /// `start` is the first key to include; an empty `start` begins at the
    /// extremity determined by `order`.
    ///
    /// The read lock is held for the whole traversal, including while `f`
    /// runs. `f` must not call mutating operations on the same database
    /// from the same thread, as that would deadlock; concurrent readers
    /// are unaffected. Records deleted concurrently are skipped.
    pub fn items<F>(&self, start: &[u8], order: Order, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool>,
    {
        let state = self.shared.state.read()?;
        if state.closed {
            return Err(Error::Closed);
        }

        let n = state.shards.len();
        let asc = order == Order::Asc;
        let start_token = keycode::encode(start);

        let first = if !start.is_empty() {
            state.shards.locate(&start_token)
        } else if asc {
            0
        } else {
            n - 1
        };

        let shard_ids: Box<dyn Iterator<Item = usize>> = if asc {
            Box::new(first..n)
        } else {
            Box::new((0..=first).rev())
        };

        // Names on the wrong side of `start` are skipped until one crosses
        // the boundary; after that every name is in range.
        let mut skipping = !start.is_empty();

        for idx in shard_ids {
            let dir = state.shards.dir(&self.shared.data_root, idx);
            let mut names = self
                .shared
                .fs
                .read_dir_names(&dir)
                .map_err(|e| Error::io("read shard dir", e))?;
            names.sort_unstable();
            if !asc {
                names.reverse();
            }

            for name in names {
                if skipping {
                    let out_of_range = if asc {
                        name.as_str() < start_token.as_str()
                    } else {
                        name.as_str() > start_token.as_str()
                    };
                    if out_of_range {
                        continue;
                    }
                    skipping = false;
                }

                let key = keycode::decode(&name)?;

                // Use the cache, but do not populate it while iterating:
                // that would churn it with keys that may never be read
                // again.
                let value = match state.cache.get(&key) {
                    Some(value) => value,
                    None => match self.shared.fs.read_file(&dir.join(&name)) {
                        Ok(value) => value,
                        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                        Err(e) => return Err(Error::io("read record", e)),
                    },
                };

                if !f(&key, &value)? {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Returns the number of records, or -1 if the database is closed.
    pub fn len(&self) -> i64 {
        let Ok(state) = self.shared.state.read() else {
            return -1;
        };
        if state.closed {
            return -1;
        }
        state.metadata.total_entries as i64
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    /// Synchronizes the metadata to persistent storage, marking the
    /// current generation as the durable checkpoint.
    pub fn sync(&self) -> Result<()> {
        let mut state = self.shared.state.write()?;
        if state.closed {
            return Err(Error::Closed);
        }
        self.shared.sync_internal(&mut state)
    }

    /// Synchronizes and closes the database. Close is idempotent; every
    /// other operation fails with [`Error::Closed`] afterwards.
    pub fn close(&self) -> Result<()> {
        let task = self.sync_task.lock()?.take();
        if let Some(task) = task {
            task.stop();
        }

        let mut state = self.shared.state.write()?;
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        self.shared.sync_internal(&mut state)
    }

    fn record_path(&self, state: &State, key: &[u8]) -> (PathBuf, usize) {
        let token = keycode::encode(key);
        let idx = state.shards.locate(&token);
        (state.shards.dir(&self.shared.data_root, idx).join(token), idx)
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Shared {
    /// Marks the store dirty on disk ahead of the first mutation after a
    /// clean state, so a crash before the next sync triggers a recount at
    /// the following open. Uses a try-lock: if another writer holds the
    /// lock it has already done, or will do, this work.
    fn prepare_for_mutation(&self) -> Result<()> {
        let mut state = match self.state.try_write() {
            Ok(state) => state,
            Err(TryLockError::WouldBlock) => return Ok(()),
            Err(TryLockError::Poisoned(e)) => return Err(e.into()),
        };

        if state.closed {
            return Err(Error::Closed);
        }
        if state.metadata.generation != state.metadata.checkpoint {
            // Already marked dirty.
            return Ok(());
        }

        state.metadata.generation = state.metadata.checkpoint + 1;
        self.metadata_store.save(&state.metadata)
    }

    /// Writes `value` to the record path, reporting whether an existing
    /// record was overwritten. New records are written exclusively: the
    /// write lock already serializes writers, and O_EXCL catches any
    /// caller that bypassed it.
    fn put_path(&self, path: &std::path::Path, value: &[u8]) -> Result<bool> {
        let updated = match self.fs.stat(path) {
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::io("stat record", e)),
        };

        self.writer
            .write_file(path, value, !updated)
            .map_err(|e| Error::io("write record", e))?;
        Ok(updated)
    }

    fn sync_internal(&self, state: &mut State) -> Result<()> {
        state.metadata.checkpoint = state.metadata.generation;
        self.metadata_store.save(&state.metadata)
    }

    fn background_sync(&self) -> Result<()> {
        let mut state = self.state.write()?;
        if state.closed {
            return Ok(());
        }
        self.sync_internal(&mut state)
    }
}
