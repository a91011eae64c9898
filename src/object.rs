//! Object-store backend: the same dispatch contract over bucket-style keys.
//!
//! The client is an explicitly constructed, injected collaborator owned by the
//! [`ObjectStore`] instance; there is no process-wide singleton. The
//! [`MemoryObjectClient`] fake lets everything here run in unit tests without
//! a real provider.

use crate::storage::{Storage, join};
use crate::verify::Verification;
use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Metadata for a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Full key of the object.
    pub key: String,
    pub size: u64,
    /// Unix timestamp of the last modification.
    pub last_modified: i64,
}

/// Provider-side primitives. Implement this against a real object store; the
/// crate ships [`MemoryObjectClient`] for tests.
pub trait ObjectClient: Send + Sync {
    /// Store `data` under `key`, replacing any existing object.
    ///
    /// # Errors
    /// Returns an error if the upload fails.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Fetch the object at `key`.
    ///
    /// # Errors
    /// Returns an error if the object is absent or the download fails.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete the object at `key`. Deleting an absent key is not an error.
    ///
    /// # Errors
    /// Returns an error if the deletion fails.
    fn delete(&self, key: &str) -> Result<()>;

    /// Metadata for every object whose key starts with `prefix`.
    ///
    /// # Errors
    /// Returns an error if the listing fails. An unknown prefix yields an
    /// empty list.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Whether `path` names an object or a prefix with objects under it.
    ///
    /// # Errors
    /// Returns an error if the check fails.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Metadata for a single object, or `None` if absent.
    ///
    /// # Errors
    /// Returns an error if the lookup fails.
    fn metadata(&self, key: &str) -> Result<Option<ObjectMeta>>;

    /// Replace the metadata tags on an object.
    ///
    /// # Errors
    /// Returns an error if the object is absent or tagging fails.
    fn put_tags(&self, key: &str, tags: HashMap<String, String>) -> Result<()>;

    /// The metadata tags on an object. Absent objects yield an empty map.
    ///
    /// # Errors
    /// Returns an error if the lookup fails.
    fn get_tags(&self, key: &str) -> Result<HashMap<String, String>>;
}

/// Tag marking an object whose logical content is empty. The store
/// distinguishes "exists but empty" from "absent" via this tag rather than
/// relying on zero-byte writes.
pub const EMPTY_TAG: &str = "is_empty";

/// Object-store backend plus the transfer and housekeeping helpers that only
/// make sense against a remote medium.
pub struct ObjectStore<C: ObjectClient> {
    client: C,
}

impl<C: ObjectClient> ObjectStore<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Write a zero-byte object tagged as empty.
    ///
    /// # Errors
    /// Returns an error if the write or tagging fails.
    pub fn save_empty(&self, dir: &str, name: &str) -> Result<()> {
        let key = join(dir, name);
        self.client.put(&key, b"")?;
        self.client
            .put_tags(&key, HashMap::from([(EMPTY_TAG.to_string(), "true".to_string())]))
    }

    /// Drop the names under `dir` whose objects carry the empty tag.
    ///
    /// # Errors
    /// Returns an error if a tag lookup fails.
    pub fn filter_non_empty(&self, dir: &str, names: &[String]) -> Result<Vec<String>> {
        let mut kept = Vec::with_capacity(names.len());
        for name in names {
            let tags = self.client.get_tags(&join(dir, name))?;
            if tags.get(EMPTY_TAG).map(String::as_str) != Some("true") {
                kept.push(name.clone());
            }
        }
        Ok(kept)
    }

    /// Modification time of one object under `dir`, or of the most recently
    /// modified object when `name` is `None`. Absent directories and names
    /// yield `None` with an info-level trace, never an error.
    ///
    /// # Errors
    /// Returns an error if the listing itself fails.
    pub fn modified_in_dir(&self, dir: &str, name: Option<&str>) -> Result<Option<i64>> {
        if !self.client.exists(dir)? {
            info!("{dir} does not exist, no modified time available");
            return Ok(None);
        }
        let entries = self.client.list(dir)?;
        match name {
            Some(name) => {
                let key = join(dir, name);
                let found = entries.iter().find(|m| m.key == key);
                if found.is_none() {
                    info!("{key} does not exist, no modified time available");
                }
                Ok(found.map(|m| m.last_modified))
            }
            None => Ok(entries.iter().map(|m| m.last_modified).max()),
        }
    }

    /// Names under `dir` modified strictly after `cutoff`. An absent
    /// directory yields an empty list.
    ///
    /// # Errors
    /// Returns an error if the listing fails.
    pub fn list_modified_after(&self, dir: &str, cutoff: i64) -> Result<Vec<String>> {
        self.list_filtered(dir, |ts| ts > cutoff)
    }

    /// Names under `dir` modified within `[start, end)`. An absent directory
    /// yields an empty list.
    ///
    /// # Errors
    /// Returns an error if the listing fails.
    pub fn list_modified_between(&self, dir: &str, start: i64, end: i64) -> Result<Vec<String>> {
        self.list_filtered(dir, |ts| ts >= start && ts < end)
    }

    fn list_filtered(&self, dir: &str, keep: impl Fn(i64) -> bool) -> Result<Vec<String>> {
        if !self.client.exists(dir)? {
            return Ok(vec![]);
        }
        Ok(self
            .client
            .list(dir)?
            .into_iter()
            .filter(|m| keep(m.last_modified))
            .map(|m| base_name(&m.key))
            .collect())
    }

    /// Upload one local file. `remote_name` defaults to `local_name`.
    ///
    /// # Errors
    /// Returns an error if the local read or the upload fails.
    pub fn upload(
        &self,
        local_dir: &str,
        remote_dir: &str,
        local_name: &str,
        remote_name: Option<&str>,
    ) -> Result<()> {
        let local = join(local_dir, local_name);
        let remote = join(remote_dir, remote_name.unwrap_or(local_name));
        let data = fs::read(&local).with_context(|| format!("read {local}"))?;
        self.client.put(&remote, &data)
    }

    /// Upload a list of local files under a shared remote prefix.
    ///
    /// # Errors
    /// Returns an error on the first failing transfer.
    pub fn upload_many(&self, local_dir: &str, remote_dir: &str, names: &[String]) -> Result<()> {
        for name in names {
            self.upload(local_dir, remote_dir, name, None)?;
        }
        Ok(())
    }

    /// Download one object to a local directory, creating it if needed.
    /// `local_name` defaults to `remote_name`.
    ///
    /// # Errors
    /// Returns an error if the download or the local write fails.
    pub fn download(
        &self,
        remote_dir: &str,
        local_dir: &str,
        remote_name: &str,
        local_name: Option<&str>,
    ) -> Result<()> {
        let remote = join(remote_dir, remote_name);
        let local = join(local_dir, local_name.unwrap_or(remote_name));
        let data = self.client.get(&remote)?;
        fs::create_dir_all(local_dir).with_context(|| format!("mkdir -p {local_dir}"))?;
        fs::write(&local, data).with_context(|| format!("write {local}"))
    }

    /// Download a list of objects, skipping the ones tagged empty.
    ///
    /// # Errors
    /// Returns an error on the first failing transfer.
    pub fn download_many(&self, remote_dir: &str, local_dir: &str, names: &[String]) -> Result<()> {
        let names = self.filter_non_empty(remote_dir, names)?;
        for name in &names {
            self.download(remote_dir, local_dir, name, None)?;
        }
        Ok(())
    }

    /// Compare an expected name list against what exists remotely.
    ///
    /// # Errors
    /// Returns an error if an existence check fails.
    pub fn verify_uploaded(&self, remote_dir: &str, names: &[String]) -> Result<Verification> {
        let mut missing = Vec::new();
        for name in names {
            let key = join(remote_dir, name);
            if !self.client.exists(&key)? {
                missing.push(key);
            }
        }
        Ok(Verification::from_missing(missing))
    }

    /// Compare an expected name list against the local filesystem.
    pub fn verify_downloaded(&self, local_dir: &str, names: &[String]) -> Verification {
        let missing = names
            .iter()
            .map(|name| join(local_dir, name))
            .filter(|path| !Path::new(path).is_file())
            .collect();
        Verification::from_missing(missing)
    }

    /// Remove every object under `prefix`.
    ///
    /// # Errors
    /// Returns an error if the listing or a deletion fails.
    pub fn remove_all(&self, prefix: &str) -> Result<()> {
        for meta in self.client.list(prefix)? {
            self.client.delete(&meta.key)?;
        }
        Ok(())
    }

    /// Remove the objects under `dir` whose names contain `pattern`. Used to
    /// clean up persisted failure logs between runs.
    ///
    /// # Errors
    /// Returns an error if the listing or a deletion fails.
    pub fn remove_matching(&self, dir: &str, pattern: &str) -> Result<()> {
        for meta in self.client.list(dir)? {
            if base_name(&meta.key).contains(pattern) {
                self.client.delete(&meta.key)?;
            }
        }
        Ok(())
    }

    /// Mirror a list of names as empty-tagged placeholders under `remote_dir`.
    ///
    /// # Errors
    /// Returns an error on the first failing write.
    pub fn clone_empty_files(&self, remote_dir: &str, names: &[String]) -> Result<()> {
        for name in names {
            self.save_empty(remote_dir, name)?;
        }
        Ok(())
    }
}

fn base_name(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_string()
}

impl<C: ObjectClient> Storage for ObjectStore<C> {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.client.put(path, bytes)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.client.get(path)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.client.exists(path)
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        Ok(self
            .client
            .list(dir)?
            .into_iter()
            .map(|m| base_name(&m.key))
            .collect())
    }

    fn create_dir_all(&self, _dir: &str) -> Result<()> {
        // Object stores have no directories; prefixes come into existence
        // with the first object written under them.
        Ok(())
    }

    fn modified(&self, path: &str) -> Result<Option<i64>> {
        Ok(self.client.metadata(path)?.map(|m| m.last_modified))
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.client.delete(path)
    }
}

#[derive(Debug, Clone, Default)]
struct StoredObject {
    data: Vec<u8>,
    tags: HashMap<String, String>,
    last_modified: i64,
}

/// In-memory [`ObjectClient`] with tag support. All state lives behind an
/// `Arc`, so clones observe the same objects.
#[derive(Clone, Default)]
pub struct MemoryObjectClient {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override an object's modification time. Lets tests exercise the
    /// modified-after/between listings deterministically.
    pub fn set_modified(&self, key: &str, ts: i64) {
        if let Some(obj) = self
            .objects
            .lock()
            .expect("object map mutex poisoned")
            .get_mut(key)
        {
            obj.last_modified = ts;
        }
    }
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl ObjectClient for MemoryObjectClient {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut objects = self.objects.lock().expect("object map mutex poisoned");
        objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                tags: HashMap::new(),
                last_modified: now_ts(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .expect("object map mutex poisoned")
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| anyhow!("object {key} not found"))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.objects
            .lock()
            .expect("object map mutex poisoned")
            .remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let prefix_dir = format!("{}/", prefix.trim_end_matches('/'));
        let objects = self.objects.lock().expect("object map mutex poisoned");
        let mut metas: Vec<ObjectMeta> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix_dir) || *key == prefix)
            .map(|(key, obj)| ObjectMeta {
                key: key.clone(),
                size: obj.data.len() as u64,
                last_modified: obj.last_modified,
            })
            .collect();
        metas.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(metas)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let prefix_dir = format!("{}/", path.trim_end_matches('/'));
        let objects = self.objects.lock().expect("object map mutex poisoned");
        Ok(objects
            .keys()
            .any(|key| key == path || key.starts_with(&prefix_dir)))
    }

    fn metadata(&self, key: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.lock().expect("object map mutex poisoned");
        Ok(objects.get(key).map(|obj| ObjectMeta {
            key: key.to_string(),
            size: obj.data.len() as u64,
            last_modified: obj.last_modified,
        }))
    }

    fn put_tags(&self, key: &str, tags: HashMap<String, String>) -> Result<()> {
        let mut objects = self.objects.lock().expect("object map mutex poisoned");
        let obj = objects
            .get_mut(key)
            .ok_or_else(|| anyhow!("object {key} not found"))?;
        obj.tags = tags;
        Ok(())
    }

    fn get_tags(&self, key: &str) -> Result<HashMap<String, String>> {
        let objects = self.objects.lock().expect("object map mutex poisoned");
        Ok(objects.get(key).map(|o| o.tags.clone()).unwrap_or_default())
    }
}
