//! Per-issue watermarks
//!
//! A watermark is the effective time of the newest change already reported
//! for an issue. Anything at or before it is old news. The store is a plain
//! state container owned by the caller and handed to each processing pass;
//! it does no locking of its own.
//!
//! An issue that has never been observed reads as the launch time, but the
//! store also remembers *whether* it has been observed, so that callers can
//! tell "never seen" apart from "seen, nothing new since launch".

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// Observation state of one issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkState {
    /// Never observed by this process (or any persisted predecessor)
    Unseen,
    /// Observed; changes at or before this time have been handled
    Seen(DateTime<Utc>),
}

impl WatermarkState {
    pub fn is_seen(&self) -> bool {
        matches!(self, WatermarkState::Seen(_))
    }
}

/// Mapping from issue key to watermark
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    launch_time: DateTime<Utc>,
    marks: HashMap<String, DateTime<Utc>>,
}

/// On-disk layout of a persisted store
#[derive(Debug, Serialize, Deserialize)]
struct WatermarkFile {
    version: u32,
    watermarks: HashMap<String, DateTime<Utc>>,
}

const FILE_VERSION: u32 = 1;

impl WatermarkStore {
    /// Create an empty store; unseen issues read as `launch_time`
    pub fn new(launch_time: DateTime<Utc>) -> Self {
        Self {
            launch_time,
            marks: HashMap::new(),
        }
    }

    pub fn launch_time(&self) -> DateTime<Utc> {
        self.launch_time
    }

    /// Stored watermark, or the launch time if the issue was never observed
    pub fn get(&self, key: &str) -> DateTime<Utc> {
        self.marks.get(key).copied().unwrap_or(self.launch_time)
    }

    pub fn state(&self, key: &str) -> WatermarkState {
        match self.marks.get(key) {
            Some(t) => WatermarkState::Seen(*t),
            None => WatermarkState::Unseen,
        }
    }

    /// Overwrite the watermark for `key`. Callers keep it monotonic.
    pub fn set(&mut self, key: impl Into<String>, at: DateTime<Utc>) {
        self.marks.insert(key.into(), at);
    }

    /// Record an unseen issue as observed at the launch time. No-op for
    /// issues that already have a watermark.
    pub fn mark_seen(&mut self, key: &str) {
        if !self.marks.contains_key(key) {
            self.marks.insert(key.to_string(), self.launch_time);
        }
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DateTime<Utc>)> {
        self.marks.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Load a persisted store. A missing file yields an empty store.
    pub fn load(path: impl AsRef<Path>, launch_time: DateTime<Utc>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No watermark file yet, starting empty");
            return Ok(Self::new(launch_time));
        }

        let content = std::fs::read_to_string(path)?;
        let file: WatermarkFile = serde_json::from_str(&content)?;
        if file.version != FILE_VERSION {
            return Err(crate::BridgeError::Parse(format!(
                "Unsupported watermark file version {} in {}",
                file.version,
                path.display()
            )));
        }

        tracing::info!(
            path = %path.display(),
            issues = file.watermarks.len(),
            "Loaded watermarks"
        );

        Ok(Self {
            launch_time,
            marks: file.watermarks,
        })
    }

    /// Persist the store atomically (temp file in the same directory, then rename)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let file = WatermarkFile {
            version: FILE_VERSION,
            watermarks: self.marks.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| crate::BridgeError::Io(e.error))?;

        tracing::debug!(path = %path.display(), issues = self.marks.len(), "Saved watermarks");
        Ok(())
    }
}
