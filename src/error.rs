//! Unified error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The error type returned by tatami's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures that happen before or outside a request: binding
/// the listen socket, or preparing the access-log directory at startup.
///
/// Note what is *not* here: a failed append to the access log at runtime.
/// Post-startup logging failures are best-effort by contract and are reported
/// to the diagnostic stream instead of propagating.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket-level failure (bind, local_addr).
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// The access-log directory could not be created at startup.
    ///
    /// An already-existing directory is not an error. Anything else
    /// (permissions, read-only filesystem, disk) refuses startup: a server
    /// quietly running without its access log is harder to notice than one
    /// that fails to boot.
    #[error("failed to create log directory `{path}`: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
