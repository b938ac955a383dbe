use std::path::PathBuf;
use std::time::Duration;

/// Default size of the read cache. A negative value means the cache grows
/// without bound.
pub const DEFAULT_CACHE_SIZE: i64 = -1;

/// Default number of record files a shard may hold before it is split.
pub const DEFAULT_MAX_FILES_PER_SHARD: u64 = 50_000;

/// Default interval of the background metadata sync.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory path for the database.
    pub dir: PathBuf,

    /// Size of the read cache. Negative is unbounded, zero disables the
    /// cache, positive bounds it at that many entries (default: -1).
    pub cache_size: i64,

    /// Synchronize every record write to persistent storage (default: false).
    pub sync_writes: bool,

    /// How many record files a shard may hold before it splits
    /// (default: 50,000).
    pub max_files_per_shard: u64,

    /// Run the background metadata sync loop (default: true).
    pub auto_sync: bool,

    /// How often the background loop syncs metadata (default: 60s).
    pub sync_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./sdb"),
            cache_size: DEFAULT_CACHE_SIZE,
            sync_writes: false,
            max_files_per_shard: DEFAULT_MAX_FILES_PER_SHARD,
            auto_sync: true,
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

impl Config {
    /// Create a new config with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the cache size. Negative is unbounded, zero disables the cache.
    pub fn cache_size(mut self, size: i64) -> Self {
        self.cache_size = size;
        self
    }

    /// Enable synchronous writes.
    pub fn sync_writes(mut self, enabled: bool) -> Self {
        self.sync_writes = enabled;
        self
    }

    /// Set the shard split threshold.
    pub fn max_files_per_shard(mut self, max: u64) -> Self {
        self.max_files_per_shard = max;
        self
    }

    /// Enable or disable the background metadata sync loop.
    pub fn auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync = enabled;
        self
    }

    /// Set the background sync interval.
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.dir, PathBuf::from("./sdb"));
        assert_eq!(config.cache_size, -1);
        assert!(!config.sync_writes);
        assert_eq!(config.max_files_per_shard, 50_000);
        assert!(config.auto_sync);
        assert_eq!(config.sync_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new("/tmp/test")
            .cache_size(1024)
            .sync_writes(true)
            .max_files_per_shard(3)
            .auto_sync(false)
            .sync_interval(Duration::from_millis(500));

        assert_eq!(config.dir, PathBuf::from("/tmp/test"));
        assert_eq!(config.cache_size, 1024);
        assert!(config.sync_writes);
        assert_eq!(config.max_files_per_shard, 3);
        assert!(!config.auto_sync);
        assert_eq!(config.sync_interval, Duration::from_millis(500));
    }
}
