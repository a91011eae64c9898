//! # Stowage
//!
//! A typed file store: save and load values by declared format tag, with
//! failure bookkeeping and retry for batch workflows.
//!
//! ## Key pieces
//!
//! - **Format dispatch** - a [`FormatRegistry`] maps each [`FormatTag`] to a
//!   [`Format`] handler pair; unregistered tags fail the lookup, never
//!   silently no-op. New formats register without touching the store.
//! - **Collect, don't crash** - [`FileStore::save`] and [`FileStore::load`]
//!   never propagate handler errors. Failed calls are recorded with full
//!   replay context in per-direction failure logs that the caller inspects,
//!   persists, notifies about, or retries.
//! - **Batch execution** - [`FileStore::save_many`] / [`FileStore::load_many`]
//!   fan a batch out sequentially or over a bounded rayon pool
//!   ([`ExecMode`]); one item's failure never aborts its siblings.
//! - **Pluggable medium** - the store is generic over [`Storage`]:
//!   [`LocalStorage`] for the filesystem, [`ObjectStore`] over an injected
//!   [`ObjectClient`] for bucket-style stores (with empty-object tagging,
//!   transfer verification, and modified-time listings).
//! - **Helpers** - a tar [`archive`] module sharing the [`Verification`]
//!   result shape with transfer verification, a document-store pass-through
//!   ([`DocStore`]), and a [`Notifier`] sink for failure summaries.
//!
//! ## Quick start
//!
//! ```
//! use stowage::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! # let tmp = tempfile::tempdir()?;
//! # let dir = tmp.path().to_str().unwrap();
//! let mut store = FileStore::new(LocalStorage);
//!
//! let at = FileReference::new(dir, "x.json");
//! let saved = store.save(
//!     serde_json::json!({"a": 1}).into(),
//!     at.clone(),
//!     FormatTag::Json,
//!     FormatOptions::default(),
//! );
//! assert!(saved);
//!
//! let back = store.load(at, FormatTag::Json, FormatOptions::default());
//! assert_eq!(back, Some(serde_json::json!({"a": 1}).into()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `io-csv` - csv handler for [`Table`] payloads
//! - `io-parquet` - parquet handler (arrow-backed, with a row-based fallback
//!   reader)
//! - `archive` - the tar archival helper
//! - `compression-gzip` / `compression-zstd` - codecs for `.tar.gz` /
//!   `.tar.zst` archives

pub mod docstore;
pub mod error;
pub mod format;
pub mod notify;
pub mod object;
pub mod payload;
pub mod storage;
pub mod store;
pub mod verify;

#[cfg(feature = "archive")]
pub mod archive;
#[cfg(feature = "archive")]
pub mod compression;

// General re-exports
pub use docstore::{DocStore, Document, DocumentClient, MemoryCounter, MemoryDocumentClient};
pub use error::{StoreError, StoreResult};
pub use format::{Format, FormatOptions, FormatRegistry, FormatTag};
pub use notify::{MemoryNotifier, Notifier};
pub use object::{EMPTY_TAG, MemoryObjectClient, ObjectClient, ObjectMeta, ObjectStore};
pub use payload::{Cell, Payload, Table};
pub use storage::{FileReference, LocalStorage, Storage};
pub use store::{Direction, ExecMode, FileStore, LoadRequest, SaveRequest};
pub use verify::Verification;

#[cfg(feature = "archive")]
pub use compression::Codec;
