use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::KeySource;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("command execution failed: {0}")]
    Command(#[from] io::Error),

    #[error("gpg exited with status {status}: {output}")]
    Gpg { status: i32, output: String },

    #[error("failed to install GPG key from {origin}: {output}")]
    KeyInstall { origin: KeySource, output: String },

    #[error("invalid key ID '{keyid}': {reason}")]
    InvalidKeyId { keyid: String, reason: String },

    #[error("invalid key server '{server}': {reason}")]
    InvalidKeyServer { server: String, reason: String },

    #[error("invalid PPA '{ppa}': {reason}")]
    InvalidPpa { ppa: String, reason: String },

    #[error("failed to look up signing key for PPA '{ppa}': {reason}")]
    PpaLookup { ppa: String, reason: String },

    #[error("filesystem operation on '{}' failed: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {detail}")]
    Config { detail: String },

    /// A gpg invocation exceeded the configured timeout. Install paths
    /// report this as [`Error::KeyInstall`] instead.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}
