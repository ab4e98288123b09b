use std::os::raw::c_int;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend returned status {0}")]
    Status(c_int),
    #[error("Message contains an interior NUL byte at offset {0}")]
    InvalidMessage(usize),
    #[error("Failed to load {path:?}: {reason}")]
    LibraryLoad { path: PathBuf, reason: String },
    #[error("Symbol {symbol} not found: {reason}")]
    MissingSymbol { symbol: String, reason: String },
    #[error("Library {0:?} is already loaded by another backend")]
    LibraryInUse(PathBuf),
}

impl BackendError {
    ///
    /// Maps a raw backend status code, `0` being the only success value
    ///
    pub fn map<T>(status: c_int, success: impl FnOnce() -> T) -> Result<T, Self> {
        match status {
            0 => Ok(success()),
            e => Err(Self::Status(e)),
        }
    }

    pub fn status(&self) -> Option<c_int> {
        match self {
            Self::Status(e) => Some(*e),
            _ => None,
        }
    }
}
