//! The typed file store: dispatch, failure bookkeeping, and retry.
//!
//! # Design notes
//! - **Collect, don't crash**: `save`/`load` never propagate handler errors.
//!   Failures are traced, converted into replayable requests, and appended to
//!   the store's failure logs for later inspection, notification, or retry.
//! - **Batch isolation**: `save_many`/`load_many` dispatch every item
//!   independently; one item's failure never aborts its siblings.
//! - **Single-threaded bookkeeping**: batch attempts run against `&self` and
//!   their outcomes are funnelled back to the owning thread, which appends to
//!   the failure logs only after the worker pool has joined. The logs never
//!   see concurrent writers.

use crate::error::StoreResult;
use crate::format::{Format, FormatOptions, FormatRegistry, FormatTag};
use crate::notify::Notifier;
use crate::payload::Payload;
use crate::storage::{FileReference, Storage};
use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, warn};

/// Which failure log an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Save,
    Load,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Save => "save",
            Direction::Load => "load",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Direction::Save => "saved",
            Direction::Load => "loaded",
        }
    }
}

/// Execution mode for batch operations.
///
/// `Sequential` runs items in order on the calling thread and is the right
/// choice for deterministic tests. `Parallel` fans out over a rayon pool;
/// `workers` bounds the pool size, or `None` uses the shared global pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    Parallel { workers: Option<usize> },
}

impl ExecMode {
    /// Parallel mode bounded at one worker per logical CPU.
    pub fn parallel() -> Self {
        ExecMode::Parallel {
            workers: Some(num_cpus::get()),
        }
    }
}

/// Full context of a save call: enough to replay it with identical arguments.
/// Also the record type of the save failure log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub payload: Payload,
    pub at: FileReference,
    pub tag: FormatTag,
    pub options: FormatOptions,
}

/// Full context of a load call; the record type of the load failure log.
/// Loads carry no payload, only the identity of what to fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub at: FileReference,
    pub tag: FormatTag,
    pub options: FormatOptions,
}

/// Typed file store over a [`Storage`] backend.
///
/// Format dispatch is a [`FormatRegistry`] lookup; the backend decides where
/// the encoded bytes live, so the same store logic serves the local
/// filesystem and the object-store variant.
pub struct FileStore<S: Storage> {
    storage: S,
    registry: FormatRegistry,
    notifier: Option<Arc<dyn Notifier>>,
    verbose: bool,
    failed_saves: Vec<SaveRequest>,
    failed_loads: Vec<LoadRequest>,
}

impl<S: Storage> FileStore<S> {
    /// A store over `storage` with the built-in handler set.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            registry: FormatRegistry::defaults(),
            notifier: None,
            verbose: false,
            failed_saves: Vec::new(),
            failed_loads: Vec::new(),
        }
    }

    /// Replace the format registry.
    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Attach the sink used by [`FileStore::notify_failures`].
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Emit a debug trace for every successful save/load.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Register a handler on the store's registry.
    pub fn register_format(&mut self, tag: FormatTag, handler: Arc<dyn Format>) {
        self.registry.register(tag, handler);
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Accumulated save failures, oldest first.
    pub fn failed_saves(&self) -> &[SaveRequest] {
        &self.failed_saves
    }

    /// Accumulated load failures, oldest first.
    pub fn failed_loads(&self) -> &[LoadRequest] {
        &self.failed_loads
    }

    /// Drop every accumulated save failure. Clearing is always explicit;
    /// nothing in the store clears the logs on its own.
    pub fn clear_failed_saves(&mut self) {
        self.failed_saves.clear();
    }

    /// Drop every accumulated load failure.
    pub fn clear_failed_loads(&mut self) {
        self.failed_loads.clear();
    }

    /// Save a payload at `at` using the handler registered for `tag`.
    ///
    /// Returns `true` on success. On any failure (including an unregistered
    /// tag) the error is traced, the full request is appended to the save
    /// failure log, and `false` is returned; nothing propagates.
    pub fn save(
        &mut self,
        payload: Payload,
        at: FileReference,
        tag: FormatTag,
        options: FormatOptions,
    ) -> bool {
        let req = SaveRequest {
            payload,
            at,
            tag,
            options,
        };
        match self.try_save(&req) {
            Ok(()) => true,
            Err(e) => {
                error!("error saving {}: {e}", req.at);
                self.failed_saves.push(req);
                false
            }
        }
    }

    /// Load the payload at `at` using the handler registered for `tag`.
    ///
    /// Returns `None` on any failure; the request (minus payload, which loads
    /// do not have) is appended to the load failure log.
    pub fn load(
        &mut self,
        at: FileReference,
        tag: FormatTag,
        options: FormatOptions,
    ) -> Option<Payload> {
        let req = LoadRequest { at, tag, options };
        match self.try_load(&req) {
            Ok(payload) => Some(payload),
            Err(e) => {
                error!("error loading {}: {e}", req.at);
                self.failed_loads.push(req);
                None
            }
        }
    }

    /// Save a batch of independent requests, returning how many succeeded.
    ///
    /// Failed items land in the save failure log exactly as [`FileStore::save`]
    /// would record them, in the order of the input batch.
    pub fn save_many(&mut self, mode: ExecMode, items: Vec<SaveRequest>) -> usize {
        let results = run_batch(mode, &items, |req| self.try_save(req));
        let mut succeeded = 0;
        for (req, result) in items.into_iter().zip(results) {
            match result {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    error!("error saving {}: {e}", req.at);
                    self.failed_saves.push(req);
                }
            }
        }
        succeeded
    }

    /// Load a batch of independent requests.
    ///
    /// Each slot holds the loaded payload or `None` for a failed item. Under
    /// [`ExecMode::Parallel`] the order of the returned payloads relative to
    /// the input batch is unspecified; callers needing order should run
    /// sequentially or carry identity in the payloads themselves.
    pub fn load_many(&mut self, mode: ExecMode, items: Vec<LoadRequest>) -> Vec<Option<Payload>> {
        let results = run_batch(mode, &items, |req| self.try_load(req));
        let mut out = Vec::with_capacity(items.len());
        for (req, result) in items.into_iter().zip(results) {
            match result {
                Ok(payload) => out.push(Some(payload)),
                Err(e) => {
                    error!("error loading {}: {e}", req.at);
                    self.failed_loads.push(req);
                    out.push(None);
                }
            }
        }
        out
    }

    /// Send a newline-joined list of the affected paths to the configured
    /// notifier. A no-op when the relevant log is empty: an empty log sends
    /// nothing, and does not even require a notifier to be configured.
    ///
    /// # Errors
    /// Returns an error if no notifier is configured or the sink fails.
    /// The store does not retry; delivery policy belongs to the sink.
    pub fn notify_failures(&self, direction: Direction) -> Result<()> {
        let paths: Vec<String> = match direction {
            Direction::Save => self.failed_saves.iter().map(|r| r.at.path()).collect(),
            Direction::Load => self.failed_loads.iter().map(|r| r.at.path()).collect(),
        };
        if paths.is_empty() {
            return Ok(());
        }
        let notifier = self
            .notifier
            .as_ref()
            .ok_or_else(|| anyhow!("no notifier configured"))?;
        let message = format!(
            "The following files were not {} successfully:\n\n{}",
            direction.verb(),
            paths.join("\n")
        );
        notifier.send(&message)
    }

    /// Serialize a failure log through the store's own dispatch, under a
    /// timestamped name (`{save|load}_fail_list_{unix_timestamp}.{ext}`), so
    /// failures survive across runs. Use a self-describing tag (`json` or
    /// `postcard`); the log is written as a JSON document payload.
    ///
    /// # Errors
    /// Unlike `save`, persistence failures propagate: this path exists to
    /// surface problems, not to swallow them.
    pub fn persist_failures(
        &mut self,
        direction: Direction,
        dir: &str,
        tag: FormatTag,
    ) -> Result<FileReference> {
        let value = match direction {
            Direction::Save => serde_json::to_value(&self.failed_saves),
            Direction::Load => serde_json::to_value(&self.failed_loads),
        }
        .context("serialize failure log")?;
        let name = format!(
            "{}_fail_list_{}.{}",
            direction.prefix(),
            unix_now(),
            tag.extension()
        );
        let at = FileReference::new(dir, name);
        let req = SaveRequest {
            payload: Payload::Json(value),
            at: at.clone(),
            tag,
            options: FormatOptions::default(),
        };
        self.try_save(&req)?;
        Ok(at)
    }

    /// Read back a failure log written by [`FileStore::persist_failures`] and
    /// extend the corresponding in-memory log with its entries.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not decode into a
    /// failure log.
    pub fn restore_failures(
        &mut self,
        direction: Direction,
        at: &FileReference,
        tag: FormatTag,
    ) -> Result<usize> {
        let handler = self.registry.get(tag)?;
        let bytes = self.storage.read(&at.path())?;
        let payload = handler.decode(&bytes, &FormatOptions::default())?;
        let value = payload
            .as_json()
            .cloned()
            .ok_or_else(|| anyhow!("failure log at {at} is not a JSON document"))?;
        match direction {
            Direction::Save => {
                let entries: Vec<SaveRequest> =
                    serde_json::from_value(value).context("decode save failure log")?;
                let count = entries.len();
                self.failed_saves.extend(entries);
                Ok(count)
            }
            Direction::Load => {
                let entries: Vec<LoadRequest> =
                    serde_json::from_value(value).context("decode load failure log")?;
                let count = entries.len();
                self.failed_loads.extend(entries);
                Ok(count)
            }
        }
    }

    /// Replay a snapshot of a failure log through the batch path, each entry
    /// strictly independently with its own location, tag, and options.
    /// Returns how many replays succeeded.
    ///
    /// The log is not cleared before or after; clearing is a separate,
    /// explicit call. Retrying a non-cleared log therefore re-appends any
    /// still-failing entries on top of the originals.
    pub fn retry_failed(&mut self, direction: Direction, mode: ExecMode) -> usize {
        match direction {
            Direction::Save => {
                let snapshot = self.failed_saves.clone();
                self.save_many(mode, snapshot)
            }
            Direction::Load => {
                let snapshot = self.failed_loads.clone();
                self.load_many(mode, snapshot)
                    .iter()
                    .filter(|p| p.is_some())
                    .count()
            }
        }
    }

    fn try_save(&self, req: &SaveRequest) -> StoreResult<()> {
        let handler = self.registry.get(req.tag)?;
        let bytes = handler
            .encode(&req.payload, &req.options)
            .with_context(|| format!("encode {} as {}", req.at, req.tag))?;
        self.storage
            .write(&req.at.path(), &bytes)
            .with_context(|| format!("write {}", req.at))?;
        if self.verbose {
            debug!("{} saved", req.at);
        }
        Ok(())
    }

    fn try_load(&self, req: &LoadRequest) -> StoreResult<Payload> {
        let handler = self.registry.get(req.tag)?;
        let bytes = self
            .storage
            .read(&req.at.path())
            .with_context(|| format!("read {}", req.at))?;
        let payload = handler
            .decode(&bytes, &req.options)
            .with_context(|| format!("decode {} as {}", req.at, req.tag))?;
        if self.verbose {
            debug!("{} loaded", req.at);
        }
        Ok(payload)
    }
}

/// Run `f` over `items` under the given execution mode, funnelling all
/// results back to the calling thread.
fn run_batch<I, R, F>(mode: ExecMode, items: &[I], f: F) -> Vec<R>
where
    I: Sync,
    R: Send,
    F: Fn(&I) -> R + Sync,
{
    match mode {
        ExecMode::Sequential => items.iter().map(&f).collect(),
        ExecMode::Parallel { workers: None } => items.par_iter().map(&f).collect(),
        ExecMode::Parallel {
            workers: Some(workers),
        } => match rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
        {
            Ok(pool) => pool.install(|| items.par_iter().map(&f).collect()),
            Err(e) => {
                warn!("failed to build bounded worker pool ({e}), using shared pool");
                items.par_iter().map(&f).collect()
            }
        },
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
