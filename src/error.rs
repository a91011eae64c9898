//! Error taxonomy for store operations.
//!
//! Handlers and backends use `anyhow` internally for context-rich failures;
//! [`StoreError`] is the typed surface where callers need to distinguish an
//! unregistered tag from a handler that blew up.

use crate::format::FormatTag;
use thiserror::Error;

/// Errors produced by the store and the format registry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The tag has no registered handler pair. Fatal to the single call
    /// that used it; never converted into a silent no-op.
    #[error("no format handler registered for tag `{0}`")]
    UnknownFormat(FormatTag),

    /// An underlying format handler or storage backend raised. Caught by the
    /// store, recorded in the failure log, and never propagated from
    /// `save`/`load`.
    #[error("handler failure: {0:#}")]
    Handler(#[from] anyhow::Error),

    /// A tag string that names no known format, from parsing user-supplied
    /// tag names.
    #[error("unrecognized format tag `{0}`")]
    UnknownTag(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
