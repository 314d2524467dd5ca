//! Error types for the taglens-core library.
//!
//! Decoding a single field never produces an error: field-level failures are
//! modelled as `Option` and simply leave the key out of the record. The
//! variants here cover what is left, i.e. getting at the bytes in the first
//! place and the one top-level failure `parse()` is allowed to report.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for taglens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all taglens operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to open, stat or read the input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The parser was constructed with both or neither of a path and a buffer
    #[error("invalid parser source: {details}")]
    InvalidSource {
        /// Description of the contract violation
        details: String,
    },

    /// A failure escaped the walkers while parsing
    #[error("failed to read metadata: {message}")]
    MetadataRead {
        /// Message of the underlying failure
        message: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new invalid source error
    pub fn invalid_source(details: impl Into<String>) -> Self {
        Self::InvalidSource {
            details: details.into(),
        }
    }

    /// Creates a new metadata read error
    pub fn metadata_read(message: impl Into<String>) -> Self {
        Self::MetadataRead {
            message: message.into(),
        }
    }

    /// Returns true if a batch caller can skip this input and carry on
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MetadataRead { .. } | Self::FileRead { .. })
    }
}
