//! Error types shared by every filer operation.
//!
//! # Logging Convention
//! Variants carrying a source render it through `{:#}` so the full chain shows up in one line:
//! ```ignore
//! tracing::error!("push failed: {:#}", &error);
//! ```

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-supplied input violates the operation's contract (mixed batch, missing names, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A remote directory required to exist does not.
    #[error("remote directory {0} does not exist")]
    NotFound(String),

    /// The filer answered with a status the operation does not tolerate.
    #[error("{operation} {location} failed with status {status}")]
    RemoteOperationFailed {
        operation: &'static str,
        location: String,
        status: StatusCode,
    },

    /// DELETE answered with a server error.
    #[error(
        "cannot remove {location}: it does not exist or is a non-empty directory (use recursive removal for directories)"
    )]
    RemoteDeleteConflict { location: String },

    /// A local path does not have the shape the operation needs.
    #[error("local path {path:?}: {reason}")]
    LocalFilesystem {
        path: std::path::PathBuf,
        reason: String,
    },

    #[error("failed {operation} {path:?}: {source}")]
    Io {
        operation: &'static str,
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request never produced a response (connection, TLS, timeout, ...).
    #[error("{0:#}")]
    Transport(#[source] anyhow::Error),

    #[error("malformed listing of {location}: {source}")]
    Decode {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("transfer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<std::path::PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn local(path: impl Into<std::path::PathBuf>, reason: impl Into<String>) -> Self {
        Self::LocalFilesystem {
            path: path.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
