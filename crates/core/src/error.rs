//! Error taxonomy shared by every undu crate

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout undu
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error carried by [`Error::Storage`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a [`Error::NotFound`] lookup was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    /// No checkpoint matched the id or message
    Checkpoint,
    /// The checkpoint's manifest has no row for the path
    File,
    /// A manifest references a hash the content store does not have
    Blob,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotFoundKind::Checkpoint => "Checkpoint",
            NotFoundKind::File => "File",
            NotFoundKind::Blob => "Blob",
        };
        f.write_str(s)
    }
}

/// Every failure an engine operation can report
#[derive(Debug, Error)]
pub enum Error {
    /// `init` on a directory that already holds a repository
    #[error("Already initialized (found {})", .0.display())]
    AlreadyInitialized(PathBuf),

    /// The reserved directory is missing
    #[error("Not an undu repository (no .undu directory at or above {})", .0.display())]
    NotARepository(PathBuf),

    /// Checkpoint, file, or blob lookup miss
    #[error("{kind} not found: {what}")]
    NotFound { kind: NotFoundKind, what: String },

    /// Undo past the beginning of history
    #[error("Can only go back {available} steps (requested {requested})")]
    OutOfRange { requested: usize, available: usize },

    /// Missing or malformed required input
    #[error("{0}")]
    Validation(String),

    /// I/O or persistence failure
    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub fn not_found(kind: NotFoundKind, what: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            what: what.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Storage failure with no underlying error value
    pub fn storage(context: impl Into<String>, msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        Error::Storage {
            context: context.into(),
            source: msg.into(),
        }
    }

    /// Short machine-checkable code for rendering
    pub fn code(&self) -> &'static str {
        match self {
            Error::AlreadyInitialized(_) => "already_initialized",
            Error::NotARepository(_) => "not_a_repository",
            Error::NotFound { .. } => "not_found",
            Error::OutOfRange { .. } => "out_of_range",
            Error::Validation(_) => "validation_error",
            Error::Storage { .. } => "storage",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Attach a context string to a fallible storage call, folding its error
/// into [`Error::Storage`]
pub trait StorageContext<T> {
    fn storage(self, context: impl Into<String>) -> Result<T>;

    fn with_storage<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> StorageContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn storage(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Storage {
            context: context.into(),
            source: Box::new(e),
        })
    }

    fn with_storage<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Storage {
            context: f().into(),
            source: Box::new(e),
        })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage {
            context: "I/O error".to_string(),
            source: Box::new(e),
        }
    }
}
