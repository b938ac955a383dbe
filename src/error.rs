use std::fmt::Display;

/// SDB errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The database has been closed. Every operation except another close
    /// fails with this afterwards.
    Closed,
    /// A key exceeds the maximum length accepted by the store.
    KeyTooLarge(usize),
    /// A filename in the data tree is not a valid key token.
    BadRecordName(String),
    /// The on-disk format version does not match this build of the engine.
    VersionMismatch { expected: u32, found: u32 },
    /// The stored metadata or the directory layout is damaged.
    Corruption(String),
    /// An IO error.
    IO(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Closed => write!(f, "database is closed"),
            Error::KeyTooLarge(len) => write!(f, "key of {len} bytes exceeds maximum length"),
            Error::BadRecordName(name) => write!(f, "bad record name: {name:?}"),
            Error::VersionMismatch { expected, found } => {
                write!(f, "version mismatch: expected {expected}, got {found}")
            }
            Error::Corruption(msg) => write!(f, "corruption: {msg}"),
            Error::IO(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl Error {
    /// Wraps an IO error with a short context string.
    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        Error::IO(format!("{context}: {err}"))
    }
}

/// An SDB Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::IO(err.to_string())
    }
}
