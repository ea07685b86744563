//! Error taxonomy for the multi-store, per the error handling design.
//!
//! Query errors are returned to the caller. Commit-path and background-task
//! errors (`Internal`) are meant to halt the process; this crate surfaces
//! them as ordinary `Result`s and leaves the halt decision to the caller
//! (a binary embedding this crate should treat `StoreError::Internal` from
//! `commit`, `flush`, `close`, or the background loops as fatal).

use store_errors::codes;
use thiserror::Error;

/// Errors produced by the multi-store and its sub-stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Duplicate mount, nil key, or wrong key type at `mount`/`load_version` time.
    #[error("configuration error:: {0}")]
    Configuration(String),

    /// A version argument exceeded `u32::MAX`.
    #[error("version overflow:: {0}")]
    VersionOverflow(i64),

    /// A required sub-store name was absent after applying upgrades.
    #[error("missing tree:: {0}")]
    MissingTree(String),

    /// The requested height is beyond SS retention or below SC availability.
    #[error("pruned height:: {0}")]
    PrunedHeight(i64),

    /// The query path was malformed.
    #[error("unknown request:: {0}")]
    UnknownRequest(String),

    /// No mounted store matches the requested path segment.
    #[error("unknown store:: {0}")]
    UnknownStore(String),

    /// A write was attempted against a read-only historical view.
    #[error("read-only view:: {0}")]
    ReadOnlyView(String),

    /// A snapshot node's tree height exceeded `i8::MAX`.
    #[error("node height overflow:: {0}")]
    NodeHeightOverflow(i64),

    /// Flush, commit, apply, or import/export failure. Always fatal on the
    /// commit path; background tasks treat it as fatal too.
    #[error("internal error:: {0}")]
    Internal(String),

    /// An I/O failure from the filesystem or a channel.
    #[error("io error")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// The ABCI-style numeric code this error maps to for a query response.
    pub fn code(&self) -> u32 {
        match self {
            StoreError::Configuration(_) => codes::INVALID_ARGUMENT,
            StoreError::VersionOverflow(_) => codes::INVALID_ARGUMENT,
            StoreError::MissingTree(_) => codes::NOT_FOUND,
            StoreError::PrunedHeight(_) => codes::PRUNED_HEIGHT,
            StoreError::UnknownRequest(_) => codes::UNKNOWN_REQUEST,
            StoreError::UnknownStore(_) => codes::UNKNOWN_STORE,
            StoreError::ReadOnlyView(_) => codes::INVALID_ARGUMENT,
            StoreError::NodeHeightOverflow(_) => codes::INVALID_ARGUMENT,
            StoreError::Internal(_) => codes::INTERNAL,
            StoreError::Io(_) => codes::INTERNAL,
        }
    }

    /// Whether this error represents a fatal, halt-the-process condition
    /// as opposed to a recoverable query-time failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Internal(_) | StoreError::Io(_))
    }
}

/// Result type alias used throughout the multi-store.
pub type Result<T> = std::result::Result<T, StoreError>;
