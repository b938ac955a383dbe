//! SDB is an embedded, ordered, persistent key-value store in which each
//! record is a single regular file: the filename is an order-preserving
//! encoding of the key and the file content is the value. Records are
//! grouped into shard directories that split as they grow, every write is
//! atomic, and an in-memory cache fronts reads.

pub mod cache;
pub mod config;
pub mod db;
pub mod encoding;
pub mod error;
pub mod fs;
pub mod tmpfs;

pub use config::Config;
pub use db::{Db, Order, MAX_KEY_LENGTH};
pub use error::{Error, Result};
