//! Format dispatch: tags, handler pairs, and the registry.
//!
//! Every save/load call resolves a [`FormatTag`] to a [`Format`] handler
//! through a [`FormatRegistry`]. Dispatch is a map lookup, not a branch chain:
//! new formats slot in by registering a handler under a tag, without touching
//! the store.
//!
//! # Built-in handlers
//! - [`TextFormat`] — raw UTF-8 text (registered under both `text` and `html`)
//! - [`BinaryFormat`] — raw byte passthrough
//! - [`JsonFormat`] — JSON documents via serde_json
//! - [`PostcardFormat`] — structured binary serialization of any payload
//! - `CsvFormat` — tabular data via the csv crate (feature `io-csv`)
//! - `ParquetFormat` — tabular data via arrow/parquet (feature `io-parquet`)
//!
//! The `excel` and `hdf` tags are reserved: no built-in handler exists for
//! them, so resolving them against [`FormatRegistry::defaults`] fails with
//! [`StoreError::UnknownFormat`] until a caller registers one.

mod binary;
mod json;
mod postcard;
mod text;

#[cfg(feature = "io-csv")]
mod csv;
#[cfg(feature = "io-parquet")]
mod parquet;

pub use binary::BinaryFormat;
pub use json::JsonFormat;
pub use postcard::PostcardFormat;
pub use text::TextFormat;

#[cfg(feature = "io-csv")]
pub use csv::CsvFormat;
#[cfg(feature = "io-parquet")]
pub use parquet::ParquetFormat;

use crate::error::{StoreError, StoreResult};
use crate::payload::Payload;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifier selecting a serializer/deserializer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Text,
    Binary,
    Html,
    Json,
    Postcard,
    Csv,
    Parquet,
    Excel,
    Hdf,
}

impl FormatTag {
    /// File extension conventionally used for this tag, for generated file
    /// names such as persisted failure logs.
    pub fn extension(self) -> &'static str {
        match self {
            FormatTag::Text => "txt",
            FormatTag::Binary => "bin",
            FormatTag::Html => "html",
            FormatTag::Json => "json",
            FormatTag::Postcard => "postcard",
            FormatTag::Csv => "csv",
            FormatTag::Parquet => "parquet",
            FormatTag::Excel => "xlsx",
            FormatTag::Hdf => "h5",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatTag::Text => "text",
            FormatTag::Binary => "binary",
            FormatTag::Html => "html",
            FormatTag::Json => "json",
            FormatTag::Postcard => "postcard",
            FormatTag::Csv => "csv",
            FormatTag::Parquet => "parquet",
            FormatTag::Excel => "excel",
            FormatTag::Hdf => "hdf",
        };
        f.write_str(name)
    }
}

impl FromStr for FormatTag {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(FormatTag::Text),
            "binary" => Ok(FormatTag::Binary),
            "html" => Ok(FormatTag::Html),
            "json" => Ok(FormatTag::Json),
            "postcard" => Ok(FormatTag::Postcard),
            "csv" => Ok(FormatTag::Csv),
            "parquet" => Ok(FormatTag::Parquet),
            "excel" => Ok(FormatTag::Excel),
            "hdf" => Ok(FormatTag::Hdf),
            other => Err(StoreError::UnknownTag(other.to_string())),
        }
    }
}

/// Per-call knobs honored by the built-in handlers. Replaces the source
/// ecosystem's open-ended keyword arguments with a concrete struct so a
/// recorded failure can replay with identical options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatOptions {
    /// Whether csv output carries a header row (and input expects one).
    pub has_headers: bool,
    /// csv field delimiter.
    pub delimiter: u8,
    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            has_headers: true,
            delimiter: b',',
            pretty: false,
        }
    }
}

/// A registered serializer/deserializer pair.
///
/// Handlers are byte-oriented: they turn payloads into bytes and back, and the
/// store decides where those bytes live. That split is what lets the same
/// handler set serve the local and object-store backends.
pub trait Format: Send + Sync {
    /// Serialize a payload.
    ///
    /// # Errors
    /// Returns an error if the payload variant does not fit the format or the
    /// underlying serializer fails.
    fn encode(&self, payload: &Payload, opts: &FormatOptions) -> Result<Vec<u8>>;

    /// Deserialize bytes produced by [`Format::encode`].
    ///
    /// # Errors
    /// Returns an error if the bytes cannot be decoded into the format's
    /// payload variant.
    fn decode(&self, bytes: &[u8], opts: &FormatOptions) -> Result<Payload>;
}

/// Tag-to-handler mapping. Unregistered tags are a lookup error, never a
/// silent no-op.
#[derive(Clone)]
pub struct FormatRegistry {
    handlers: HashMap<FormatTag, Arc<dyn Format>>,
}

impl FormatRegistry {
    /// A registry with no handlers. Every lookup fails until something is
    /// registered; useful for tests and fully custom handler sets.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The built-in handler set, honoring the crate's feature flags.
    pub fn defaults() -> Self {
        let mut registry = Self::empty();
        let text: Arc<dyn Format> = Arc::new(TextFormat);
        registry.register(FormatTag::Text, text.clone());
        registry.register(FormatTag::Html, text);
        registry.register(FormatTag::Binary, Arc::new(BinaryFormat));
        registry.register(FormatTag::Json, Arc::new(JsonFormat));
        registry.register(FormatTag::Postcard, Arc::new(PostcardFormat));
        #[cfg(feature = "io-csv")]
        registry.register(FormatTag::Csv, Arc::new(CsvFormat));
        #[cfg(feature = "io-parquet")]
        registry.register(FormatTag::Parquet, Arc::new(ParquetFormat));
        registry
    }

    /// Register (or replace) the handler for a tag.
    pub fn register(&mut self, tag: FormatTag, handler: Arc<dyn Format>) {
        self.handlers.insert(tag, handler);
    }

    /// Resolve a tag to its handler.
    ///
    /// # Errors
    /// [`StoreError::UnknownFormat`] if nothing is registered under `tag`.
    pub fn get(&self, tag: FormatTag) -> StoreResult<&Arc<dyn Format>> {
        self.handlers
            .get(&tag)
            .ok_or(StoreError::UnknownFormat(tag))
    }

    /// Whether a handler is registered for `tag`.
    pub fn contains(&self, tag: FormatTag) -> bool {
        self.handlers.contains_key(&tag)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::defaults()
    }
}
