//! Error types for local persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures raised by [`crate::store::KeyValueStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key contained characters that cannot be mapped to a storage slot.
    #[error("invalid storage key")]
    InvalidKey {
        /// Offending key.
        key: String,
    },
    /// Reading or writing the backing file failed.
    #[error("storage io failure")]
    Io {
        /// File involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Stored bytes could not be decoded.
    #[error("stored value is corrupted")]
    Corrupt {
        /// Key whose value failed to decode.
        key: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// Encoding a value for storage failed.
    #[error("failed to encode value for storage")]
    Encode {
        /// Key being written.
        key: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}
