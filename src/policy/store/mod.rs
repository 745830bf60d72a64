use crate::utils::{atomic_write, to_pretty_json};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// An allow/deny pattern pair, persisted as `{"allow":[…],"deny":[…]}`.
/// Used for both shell-command patterns and domain entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternPolicy {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

impl PatternPolicy {
    /// Append to the allow list, preserving insertion order. Returns false if
    /// the pattern was already present.
    pub fn insert_allow(&mut self, pattern: impl Into<String>) -> bool {
        let pattern = pattern.into();
        if self.allow.contains(&pattern) {
            return false;
        }
        self.allow.push(pattern);
        true
    }

    pub fn insert_deny(&mut self, pattern: impl Into<String>) -> bool {
        let pattern = pattern.into();
        if self.deny.contains(&pattern) {
            return false;
        }
        self.deny.push(pattern);
        true
    }
}

/// One authorized user on an external channel. Membership is keyed on
/// `(id, channel)` with the channel compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: String,
    pub channel: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAllowlist {
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl UserAllowlist {
    pub fn contains(&self, id: &str, channel: &str) -> bool {
        self.users
            .iter()
            .any(|u| u.id == id && u.channel.eq_ignore_ascii_case(channel))
    }

    /// Add a user; no-op when `(id, channel)` is already present.
    pub fn insert(&mut self, entry: UserEntry) -> bool {
        if self.contains(&entry.id, &entry.channel) {
            return false;
        }
        self.users.push(entry);
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CacheEntry {
    Policy(PatternPolicy),
    Users(UserAllowlist),
}

/// Cached, atomically persisted policy files.
///
/// The first load for a path reads disk (missing file → empty value) and keeps
/// a snapshot; later loads clone the snapshot. Saves replace the snapshot and
/// rewrite the file via tempfile + rename. [`PolicyStore::flush_all`] rewrites
/// every cached path from the snapshot unconditionally — a subprocess run via
/// `run_command` may have tampered with policy files on disk, and the flush
/// restores authority from the pre-execution in-memory state.
pub struct PolicyStore {
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
    write_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn normalize_path(path: &Path) -> PathBuf {
        std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
    }

    fn write_lock_for(&self, path: &PathBuf) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().expect("write lock map poisoned");
        locks.entry(path.clone()).or_default().clone()
    }

    fn read_json<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
        if !path.exists() {
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse policy JSON in {}", path.display()))
    }

    fn write_entry(&self, path: &PathBuf, entry: &CacheEntry) -> Result<()> {
        let content = match entry {
            CacheEntry::Policy(p) => to_pretty_json(p)?,
            CacheEntry::Users(u) => to_pretty_json(u)?,
        };
        let lock = self.write_lock_for(path);
        let _guard = lock.lock().expect("per-path write lock poisoned");
        atomic_write(path, &content)
    }

    fn load_policy(&self, path: &Path) -> Result<PatternPolicy> {
        let key = Self::normalize_path(path);
        let mut cache = self.cache.lock().expect("policy cache poisoned");
        if let Some(CacheEntry::Policy(policy)) = cache.get(&key) {
            return Ok(policy.clone());
        }
        let policy: PatternPolicy = Self::read_json(path)?;
        cache.insert(key, CacheEntry::Policy(policy.clone()));
        Ok(policy)
    }

    fn save_policy(&self, path: &Path, policy: &PatternPolicy) -> Result<()> {
        let key = Self::normalize_path(path);
        let entry = CacheEntry::Policy(policy.clone());
        {
            let mut cache = self.cache.lock().expect("policy cache poisoned");
            cache.insert(key.clone(), entry.clone());
        }
        self.write_entry(&key, &entry)
    }

    pub fn load_command_policy(&self, path: &Path) -> Result<PatternPolicy> {
        self.load_policy(path)
    }

    pub fn save_command_policy(&self, path: &Path, policy: &PatternPolicy) -> Result<()> {
        self.save_policy(path, policy)
    }

    pub fn load_domain_policy(&self, path: &Path) -> Result<PatternPolicy> {
        self.load_policy(path)
    }

    pub fn save_domain_policy(&self, path: &Path, policy: &PatternPolicy) -> Result<()> {
        self.save_policy(path, policy)
    }

    pub fn load_users(&self, path: &Path) -> Result<UserAllowlist> {
        let key = Self::normalize_path(path);
        let mut cache = self.cache.lock().expect("policy cache poisoned");
        if let Some(CacheEntry::Users(users)) = cache.get(&key) {
            return Ok(users.clone());
        }
        let users: UserAllowlist = Self::read_json(path)?;
        cache.insert(key, CacheEntry::Users(users.clone()));
        Ok(users)
    }

    pub fn save_users(&self, path: &Path, users: &UserAllowlist) -> Result<()> {
        let key = Self::normalize_path(path);
        let entry = CacheEntry::Users(users.clone());
        {
            let mut cache = self.cache.lock().expect("policy cache poisoned");
            cache.insert(key.clone(), entry.clone());
        }
        self.write_entry(&key, &entry)
    }

    /// Rewrite every cached path from the in-memory snapshot, whether or not
    /// the on-disk content changed in the interim.
    pub fn flush_all(&self) -> Result<()> {
        let entries: Vec<(PathBuf, CacheEntry)> = {
            let cache = self.cache.lock().expect("policy cache poisoned");
            cache.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        for (path, entry) in entries {
            self.write_entry(&path, &entry)?;
            debug!("flushed policy file {}", path.display());
        }
        Ok(())
    }

    /// Drop all cached snapshots; the next load re-reads disk.
    pub fn reset_cache(&self) {
        self.cache.lock().expect("policy cache poisoned").clear();
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
