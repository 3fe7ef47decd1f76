// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for sync state (upsert by natural key) and activity
//! (append-only).
//!
//! [`MemoryStore`] keeps everything in process. [`FileStore`] mirrors it to
//! `<state_dir>/sync_state.json` (rewritten atomically on each upsert) and
//! `<state_dir>/activity.jsonl` (appended, never rewritten).

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::{ActivityRecord, AttemptKey, SubjectKey, SyncAttempt};

/// Upsert-by-key storage for [`SyncAttempt`] rows.
pub trait SyncStore: Send + Sync {
    fn get(&self, key: &AttemptKey) -> anyhow::Result<Option<SyncAttempt>>;
    /// Insert or replace the row for `attempt.key()`.
    fn upsert(&self, attempt: &SyncAttempt) -> anyhow::Result<()>;
    /// Drop the row for `key`, if any.
    fn remove(&self, key: &AttemptKey) -> anyhow::Result<()>;
    fn list_subject(&self, subject: &SubjectKey) -> anyhow::Result<Vec<SyncAttempt>>;
    fn list_owner(&self, owner_id: &str) -> anyhow::Result<Vec<SyncAttempt>>;
}

/// Append-only storage for [`ActivityRecord`]s.
pub trait ActivityStore: Send + Sync {
    fn append(&self, record: &ActivityRecord) -> anyhow::Result<()>;
    fn list_subject(&self, subject: &SubjectKey) -> anyhow::Result<Vec<ActivityRecord>>;
    fn list_owner(&self, owner_id: &str) -> anyhow::Result<Vec<ActivityRecord>>;
}

// -- Memory -------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    attempts: HashMap<AttemptKey, SyncAttempt>,
    activity: Vec<ActivityRecord>,
}

impl Tables {
    fn attempts_where(&self, pred: impl Fn(&SyncAttempt) -> bool) -> Vec<SyncAttempt> {
        let mut rows: Vec<SyncAttempt> = self.attempts.values().filter(|a| pred(a)).cloned().collect();
        rows.sort_by(|a, b| a.key().cmp(&b.key()));
        rows
    }

    fn activity_where(&self, pred: impl Fn(&ActivityRecord) -> bool) -> Vec<ActivityRecord> {
        let mut rows: Vec<ActivityRecord> = self.activity.iter().filter(|r| pred(r)).cloned().collect();
        // Stable: records with equal timestamps keep append order.
        rows.sort_by_key(|r| r.recorded_at);
        rows
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncStore for MemoryStore {
    fn get(&self, key: &AttemptKey) -> anyhow::Result<Option<SyncAttempt>> {
        Ok(self.tables.lock().attempts.get(key).cloned())
    }

    fn upsert(&self, attempt: &SyncAttempt) -> anyhow::Result<()> {
        self.tables.lock().attempts.insert(attempt.key(), attempt.clone());
        Ok(())
    }

    fn remove(&self, key: &AttemptKey) -> anyhow::Result<()> {
        self.tables.lock().attempts.remove(key);
        Ok(())
    }

    fn list_subject(&self, subject: &SubjectKey) -> anyhow::Result<Vec<SyncAttempt>> {
        Ok(self.tables.lock().attempts_where(|a| &a.subject == subject))
    }

    fn list_owner(&self, owner_id: &str) -> anyhow::Result<Vec<SyncAttempt>> {
        Ok(self.tables.lock().attempts_where(|a| a.owner_id == owner_id))
    }
}

impl ActivityStore for MemoryStore {
    fn append(&self, record: &ActivityRecord) -> anyhow::Result<()> {
        self.tables.lock().activity.push(record.clone());
        Ok(())
    }

    fn list_subject(&self, subject: &SubjectKey) -> anyhow::Result<Vec<ActivityRecord>> {
        Ok(self.tables.lock().activity_where(|r| r.subject.as_ref() == Some(subject)))
    }

    fn list_owner(&self, owner_id: &str) -> anyhow::Result<Vec<ActivityRecord>> {
        Ok(self.tables.lock().activity_where(|r| r.owner_id == owner_id))
    }
}

// -- File ---------------------------------------------------------------------

/// Snapshot document for sync state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SyncSnapshot {
    attempts: Vec<SyncAttempt>,
}

/// JSON-file backed store. Reads are served from memory.
pub struct FileStore {
    memory: MemoryStore,
    sync_path: PathBuf,
    activity_path: PathBuf,
    /// Serializes snapshot writes so an older snapshot never lands last.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or create) a store rooted at `dir`, loading existing state.
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let sync_path = dir.join("sync_state.json");
        let activity_path = dir.join("activity.jsonl");
        let memory = MemoryStore::new();

        if sync_path.exists() {
            let contents = std::fs::read_to_string(&sync_path)?;
            let snapshot: SyncSnapshot = serde_json::from_str(&contents)?;
            let mut tables = memory.tables.lock();
            for attempt in snapshot.attempts {
                tables.attempts.insert(attempt.key(), attempt);
            }
        }

        if activity_path.exists() {
            let contents = std::fs::read_to_string(&activity_path)?;
            let mut tables = memory.tables.lock();
            let mut skipped = 0usize;
            for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<ActivityRecord>(line) {
                    Ok(record) => tables.activity.push(record),
                    Err(_) => skipped += 1,
                }
            }
            if skipped > 0 {
                tracing::warn!(path = %activity_path.display(), skipped, "skipped unreadable activity lines");
            }
        }

        Ok(Self { memory, sync_path, activity_path, write_lock: Mutex::new(()) })
    }

    /// Persist the table as it would look after `change`, then apply the
    /// change in memory. A failed write leaves memory untouched.
    fn write_through(&self, change: impl Fn(&mut HashMap<AttemptKey, SyncAttempt>)) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock();
        let mut next = self.memory.tables.lock().attempts.clone();
        change(&mut next);
        let mut attempts: Vec<SyncAttempt> = next.values().cloned().collect();
        attempts.sort_by(|a, b| a.key().cmp(&b.key()));
        save_atomic(&self.sync_path, &SyncSnapshot { attempts })?;
        change(&mut self.memory.tables.lock().attempts);
        Ok(())
    }
}

/// Write JSON to `path` atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent saves never
/// share a `.tmp` file.
fn save_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(value)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

impl SyncStore for FileStore {
    fn get(&self, key: &AttemptKey) -> anyhow::Result<Option<SyncAttempt>> {
        SyncStore::get(&self.memory, key)
    }

    fn upsert(&self, attempt: &SyncAttempt) -> anyhow::Result<()> {
        self.write_through(|rows| {
            rows.insert(attempt.key(), attempt.clone());
        })
    }

    fn remove(&self, key: &AttemptKey) -> anyhow::Result<()> {
        self.write_through(|rows| {
            rows.remove(key);
        })
    }

    fn list_subject(&self, subject: &SubjectKey) -> anyhow::Result<Vec<SyncAttempt>> {
        SyncStore::list_subject(&self.memory, subject)
    }

    fn list_owner(&self, owner_id: &str) -> anyhow::Result<Vec<SyncAttempt>> {
        SyncStore::list_owner(&self.memory, owner_id)
    }
}

impl ActivityStore for FileStore {
    fn append(&self, record: &ActivityRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        {
            let _guard = self.write_lock.lock();
            let mut file =
                std::fs::OpenOptions::new().create(true).append(true).open(&self.activity_path)?;
            file.write_all(line.as_bytes())?;
        }
        ActivityStore::append(&self.memory, record)
    }

    fn list_subject(&self, subject: &SubjectKey) -> anyhow::Result<Vec<ActivityRecord>> {
        ActivityStore::list_subject(&self.memory, subject)
    }

    fn list_owner(&self, owner_id: &str) -> anyhow::Result<Vec<ActivityRecord>> {
        ActivityStore::list_owner(&self.memory, owner_id)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
