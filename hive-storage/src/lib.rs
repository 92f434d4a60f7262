//! Local-filesystem and remote-shell storage backends behind one interface.
//!
//! Everything else in the coordinator talks to a `dyn Storage`; it never
//! knows whether the source or destination tree lives on the local disk or
//! on the far end of a shell connection.

mod local;
mod location;
mod remote;

pub use local::LocalStorage;
pub use location::Location;
pub use remote::RemoteShellStorage;

use async_trait::async_trait;

/// Directory-listing and single-file I/O budgets, per the remote-shell
/// transport's two distinct operation classes.
pub const DIR_OP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
pub const FILE_OP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("remote command failed: {0}")]
    RemoteCommand(String),
    #[error("file not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Uniform capability set over local and remote-shell storage: list paths
/// under a prefix by extension, read a whole file, write a whole file, and
/// check existence.
#[async_trait]
pub trait Storage: Send + Sync {
    /// List every file beneath `root` whose extension is `extension`
    /// (without the leading dot), recursively.
    async fn list(&self, root: &str, extension: &str) -> Result<Vec<String>>;

    /// Read the full contents of `path`.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Write `data` to `path`, creating parent directories as needed.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Whether `path` currently exists.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Build the storage backend implied by a location string (see
/// [`Location::parse`]).
pub fn open(location: &Location) -> Box<dyn Storage> {
    match location {
        Location::Local(path) => Box::new(LocalStorage::new(path.clone())),
        Location::Remote { user, host, path } => {
            Box::new(RemoteShellStorage::new(user.clone(), host.clone(), path.clone()))
        }
    }
}
