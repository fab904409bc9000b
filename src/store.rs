// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Durable referrer whitelist record.
//!
//! The record holds two fields: the global `whitelistEnabled` switch and the
//! `referrers` map of every referrer ever observed. Nothing is cached between
//! calls; every operation loads the full record, mutates it in memory and
//! writes the full record back. Two overlapping read-modify-write cycles can
//! therefore lose one update (last writer wins for the whole record).
//!
//! Storage failures never escape this module as errors. A failed read yields
//! an unpersisted default record tagged [`StoreHealth::Degraded`], and a
//! mutation whose write fails returns the intended record with the same tag.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Referrer recorded for requests that carry no referrer header.
pub const UNKNOWN_REFERRER: &str = "unknown";

/// Default location of the record, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "data/config.json";

/// The persisted whitelist configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    /// When false the gate allows every request.
    #[serde(default)]
    pub whitelist_enabled: bool,

    /// Every referrer ever observed, mapped to its whitelisted flag.
    #[serde(default)]
    pub referrers: BTreeMap<String, bool>,
}

impl ConfigRecord {
    /// Whether a request from `referrer` passes under this record.
    pub fn allows(&self, referrer: &str) -> bool {
        !self.whitelist_enabled || self.referrers.get(referrer).copied() == Some(true)
    }

    /// Number of referrers currently whitelisted.
    pub fn whitelisted_count(&self) -> usize {
        self.referrers.values().filter(|allowed| **allowed).count()
    }
}

/// How the record in a [`Snapshot`] relates to durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreHealth {
    /// Loaded from, or written to, storage.
    Healthy,
    /// No record existed; a default one was just persisted.
    Created,
    /// Storage failed. The record is transient and was not persisted.
    Degraded(String),
}

/// A record together with its storage status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub record: ConfigRecord,
    pub health: StoreHealth,
    /// True when the call that produced this snapshot persisted a change.
    pub changed: bool,
}

impl Snapshot {
    pub fn healthy(record: ConfigRecord) -> Self {
        Self {
            record,
            health: StoreHealth::Healthy,
            changed: false,
        }
    }

    pub fn degraded(record: ConfigRecord, err: &StoreError) -> Self {
        Self {
            record,
            health: StoreHealth::Degraded(err.to_string()),
            changed: false,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.health, StoreHealth::Degraded(_))
    }
}

/// Read/write access to the whitelist record.
///
/// Backends implement [`read`](ConfigStore::read) and
/// [`write`](ConfigStore::write); the mutations are shared read-modify-write
/// cycles on top of them. A mutation that starts from a degraded read does
/// not write, so an unreadable record is never overwritten with defaults.
pub trait ConfigStore: Send + Sync {
    /// Load the record, creating and persisting a default one if none exists.
    fn read(&self) -> Snapshot;

    /// Persist the full record.
    fn write(&self, record: &ConfigRecord) -> StoreResult<()>;

    /// Record `referrer` with the given flag unless it is already known.
    fn add_referrer(&self, referrer: &str, whitelisted: bool) -> Snapshot {
        let mut snapshot = self.read();
        if snapshot.is_degraded() || snapshot.record.referrers.contains_key(referrer) {
            return snapshot;
        }

        snapshot
            .record
            .referrers
            .insert(referrer.to_string(), whitelisted);
        let snapshot = persist(self, snapshot.record);
        if !snapshot.is_degraded() {
            debug!(referrer = %referrer, whitelisted, "Added referrer");
        }
        snapshot
    }

    /// Set the flag of a known referrer. Unknown referrers are ignored.
    fn update_referrer_status(&self, referrer: &str, whitelisted: bool) -> Snapshot {
        let mut snapshot = self.read();
        if snapshot.is_degraded() {
            return snapshot;
        }

        if !snapshot.record.referrers.contains_key(referrer) {
            debug!(referrer = %referrer, "Ignoring status update for unknown referrer");
            return snapshot;
        }

        snapshot
            .record
            .referrers
            .insert(referrer.to_string(), whitelisted);
        let snapshot = persist(self, snapshot.record);
        if !snapshot.is_degraded() {
            debug!(referrer = %referrer, whitelisted, "Updated referrer");
        }
        snapshot
    }

    /// Flip the global whitelist switch.
    fn set_whitelist_enabled(&self, enabled: bool) -> Snapshot {
        let mut snapshot = self.read();
        if snapshot.is_degraded() {
            return snapshot;
        }

        snapshot.record.whitelist_enabled = enabled;
        let snapshot = persist(self, snapshot.record);
        if !snapshot.is_degraded() {
            info!(enabled, "Whitelist protection changed");
        }
        snapshot
    }
}

fn persist<S: ConfigStore + ?Sized>(store: &S, record: ConfigRecord) -> Snapshot {
    match store.write(&record) {
        Ok(()) => Snapshot {
            changed: true,
            ..Snapshot::healthy(record)
        },
        Err(err) => {
            error!(error = %err, "Failed to persist configuration record");
            Snapshot::degraded(record, &err)
        }
    }
}

/// Record stored as a pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist.
    fn load(&self) -> StoreResult<Option<ConfigRecord>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Write to a sibling temp file, fsync, then rename over the target.
    fn save(&self, record: &ConfigRecord) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(record).map_err(StoreError::Serialize)?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StoreError::Io { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
                debug!(dir = %parent.display(), "Created data directory");
            }
        }

        let tmp_path = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp_path).map_err(io_err(&tmp_path))?;
            file.write_all(json.as_bytes())
                .map_err(io_err(&tmp_path))?;
            file.sync_all().map_err(io_err(&tmp_path))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Unique per write so concurrent writers never share a temp file.
    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("config.json");
        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.path
            .with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
    }
}

impl ConfigStore for FileStore {
    fn read(&self) -> Snapshot {
        match self.load() {
            Ok(Some(record)) => Snapshot::healthy(record),
            Ok(None) => {
                let record = ConfigRecord::default();
                match self.save(&record) {
                    Ok(()) => {
                        info!(path = %self.path.display(), "Created default config file");
                        Snapshot {
                            record,
                            health: StoreHealth::Created,
                            changed: false,
                        }
                    }
                    Err(err) => {
                        error!(error = %err, "Failed to create default config file");
                        Snapshot::degraded(record, &err)
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "Falling back to transient default configuration");
                Snapshot::degraded(ConfigRecord::default(), &err)
            }
        }
    }

    fn write(&self, record: &ConfigRecord) -> StoreResult<()> {
        self.save(record)
    }
}

/// In-process store, with switchable failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<ConfigRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: ConfigRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            ..Self::default()
        }
    }

    /// Make every subsequent read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The stored record, without creating a default one.
    pub fn current(&self) -> Option<ConfigRecord> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ConfigStore for MemoryStore {
    fn read(&self) -> Snapshot {
        if self.fail_reads.load(Ordering::SeqCst) {
            let err = StoreError::Unavailable("reads disabled".to_string());
            return Snapshot::degraded(ConfigRecord::default(), &err);
        }

        if let Some(record) = self.current() {
            return Snapshot::healthy(record);
        }

        let record = ConfigRecord::default();
        match self.write(&record) {
            Ok(()) => Snapshot {
                record,
                health: StoreHealth::Created,
                changed: false,
            },
            Err(err) => Snapshot::degraded(record, &err),
        }
    }

    fn write(&self, record: &ConfigRecord) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
