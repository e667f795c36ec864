use std::fmt;
use std::io;
use std::path::PathBuf;

/// Distinguished failure sentinel returned by every value-returning RVM operation.
///
/// Void-returning operations (`unmap`, `destroy`, `about_to_modify`) never surface this type:
/// per the interface contract they silently no-op on invalid input instead.
#[derive(Debug)]
pub enum RvmError {
    /// Null/empty/negative/unknown-handle argument.
    InvalidArgument(String),
    /// `map` called for a segment name that is already mapped in this library instance.
    AlreadyMapped(String),
    /// Open/read/write/extend failure against the backing store.
    Io { path: PathBuf, source: io::Error },
    /// The segment is already owned by a live transaction.
    StagingConflict(String),
    /// The in-memory buffer for a segment could not be allocated or mapped.
    Allocation(String),
}

impl RvmError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RvmError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for RvmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RvmError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            RvmError::AlreadyMapped(name) => write!(f, "segment already mapped: {name}"),
            RvmError::Io { path, source } => {
                write!(f, "io failure at {}: {source}", path.display())
            }
            RvmError::StagingConflict(name) => {
                write!(f, "segment already staged by a live transaction: {name}")
            }
            RvmError::Allocation(msg) => write!(f, "allocation failure: {msg}"),
        }
    }
}

impl std::error::Error for RvmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RvmError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RvmError>;
