//! Minimal document-database helper.
//!
//! A pass-through over an injected [`DocumentClient`]: named collections,
//! insert with an optional external counter increment, projected queries,
//! counts, and index creation guarded by an existence check. No dispatch or
//! retry logic lives here. Connection scoping maps onto ownership: dropping
//! the store releases the client.

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A document: a JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Driver-side operations. Implement against a real document database; the
/// crate ships [`MemoryDocumentClient`] for tests.
pub trait DocumentClient: Send + Sync {
    /// Insert one document into a collection.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    fn insert(&self, collection: &str, document: Document) -> Result<()>;

    /// Documents matching `filter` (field equality on every filter key).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>>;

    /// Number of documents matching `filter`.
    ///
    /// # Errors
    /// Returns an error if the count fails.
    fn count(&self, collection: &str, filter: &Document) -> Result<u64>;

    /// Names of the indexes on a collection.
    ///
    /// # Errors
    /// Returns an error if the listing fails.
    fn index_names(&self, collection: &str) -> Result<Vec<String>>;

    /// Create an index on `field`.
    ///
    /// # Errors
    /// Returns an error if creation fails.
    fn create_index(&self, collection: &str, field: &str, ascending: bool, unique: bool)
    -> Result<()>;
}

/// External counter incremented on inserts (the slot the source wired to a
/// cache counter).
pub trait Counter: Send + Sync {
    fn incr(&self, key: &str);
}

/// Conventional driver index name for a single-field index.
fn index_name(field: &str, ascending: bool) -> String {
    format!("{}_{}", field, if ascending { "1" } else { "-1" })
}

/// Document-store helper over an injected client.
pub struct DocStore<C: DocumentClient> {
    client: C,
    database: String,
    counter: Option<Arc<dyn Counter>>,
}

impl<C: DocumentClient> DocStore<C> {
    pub fn new(client: C, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
            counter: None,
        }
    }

    /// Attach the counter bumped by [`DocStore::insert_document`].
    pub fn with_counter(mut self, counter: Arc<dyn Counter>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn qualified(&self, collection: &str) -> String {
        format!("{}.{collection}", self.database)
    }

    /// Insert a document, tracing the values of `key_fields` and bumping the
    /// attached counter (keyed by collection name) when `count` is set.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_document(
        &self,
        collection: &str,
        document: Document,
        key_fields: &[&str],
        count: bool,
    ) -> Result<()> {
        let key: Document = key_fields
            .iter()
            .filter_map(|f| document.get(*f).map(|v| ((*f).to_string(), v.clone())))
            .collect();
        self.client.insert(collection, document)?;
        debug!(
            "document for {} inserted into {}",
            serde_json::Value::Object(key),
            self.qualified(collection)
        );
        if count && let Some(counter) = &self.counter {
            counter.incr(collection);
        }
        Ok(())
    }

    /// Query with field projection. The driver id field is always stripped;
    /// with `return_fields` set, only those fields survive.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn find_documents(
        &self,
        collection: &str,
        filter: &Document,
        return_fields: Option<&[&str]>,
    ) -> Result<Vec<Document>> {
        let docs = self.client.find(collection, filter)?;
        Ok(docs
            .into_iter()
            .map(|doc| {
                doc.into_iter()
                    .filter(|(k, _)| {
                        k != "_id" && return_fields.is_none_or(|fields| fields.contains(&k.as_str()))
                    })
                    .collect()
            })
            .collect())
    }

    /// Number of documents matching `filter`.
    ///
    /// # Errors
    /// Returns an error if the count fails.
    pub fn count_documents(&self, collection: &str, filter: &Document) -> Result<u64> {
        self.client.count(collection, filter)
    }

    /// Create a single-field index unless one with the conventional name
    /// already exists. Returns whether an index was created.
    ///
    /// # Errors
    /// Returns an error if the index listing or creation fails.
    pub fn create_index_if_absent(
        &self,
        collection: &str,
        field: &str,
        ascending: bool,
        unique: bool,
    ) -> Result<bool> {
        let name = index_name(field, ascending);
        if self.client.index_names(collection)?.contains(&name) {
            return Ok(false);
        }
        debug!(
            "index {name} absent from {}, creating it",
            self.qualified(collection)
        );
        self.client
            .create_index(collection, field, ascending, unique)?;
        Ok(true)
    }
}

#[derive(Default)]
struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<String>,
}

/// In-memory [`DocumentClient`] with equality filtering and named indexes.
#[derive(Clone, Default)]
pub struct MemoryDocumentClient {
    collections: Arc<Mutex<HashMap<String, CollectionState>>>,
}

impl MemoryDocumentClient {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

impl DocumentClient for MemoryDocumentClient {
    fn insert(&self, collection: &str, document: Document) -> Result<()> {
        self.collections
            .lock()
            .expect("collection map mutex poisoned")
            .entry(collection.to_string())
            .or_default()
            .documents
            .push(document);
        Ok(())
    }

    fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>> {
        let collections = self.collections.lock().expect("collection map mutex poisoned");
        Ok(collections
            .get(collection)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|d| matches(d, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn count(&self, collection: &str, filter: &Document) -> Result<u64> {
        Ok(self.find(collection, filter)?.len() as u64)
    }

    fn index_names(&self, collection: &str) -> Result<Vec<String>> {
        let collections = self.collections.lock().expect("collection map mutex poisoned");
        Ok(collections
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default())
    }

    fn create_index(
        &self,
        collection: &str,
        field: &str,
        ascending: bool,
        _unique: bool,
    ) -> Result<()> {
        self.collections
            .lock()
            .expect("collection map mutex poisoned")
            .entry(collection.to_string())
            .or_default()
            .indexes
            .push(index_name(field, ascending));
        Ok(())
    }
}

/// In-memory [`Counter`] for tests.
#[derive(Clone, Default)]
pub struct MemoryCounter {
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, key: &str) -> u64 {
        self.counts
            .lock()
            .expect("counter map mutex poisoned")
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

impl Counter for MemoryCounter {
    fn incr(&self, key: &str) {
        *self
            .counts
            .lock()
            .expect("counter map mutex poisoned")
            .entry(key.to_string())
            .or_insert(0) += 1;
    }
}
