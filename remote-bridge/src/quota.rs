/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Persisted per-month upload accounting and the optional monthly ceiling.
//!
//! The stats file is YAML:
//!
//! ```yaml
//! total:
//!   bytes: 1024
//!   count: 2
//! months:
//!   2026-10:
//!     bytes: 1024
//!     count: 2
//! ```
//!
//! The check and the increment are separate critical sections. Uploads admitted
//! concurrently may all pass the check, so the ceiling is a soft limit that can be
//! overshot by at most `workers * largest file`.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error(
        "upload of {requested} bytes exceeds the data limit of month {month} \
         ({used} of {limit} bytes used), uploads resume next month"
    )]
    Exceeded {
        month: String,
        used: u64,
        requested: u64,
        limit: u64,
    },
    #[error("failed to access stats file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse stats file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to serialize stats: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub bytes: i64,
    #[serde(default)]
    pub count: i64,
}

impl Item {
    fn add(&mut self, bytes: u64) {
        self.bytes = self.bytes.saturating_add(saturating_i64(bytes));
        self.count = self.count.saturating_add(1);
    }

    fn used_bytes(&self) -> u64 {
        u64::try_from(self.bytes).unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub total: Item,
    #[serde(default)]
    pub months: BTreeMap<String, Item>,
}

/// `YYYY-MM` key of the month containing `at`.
pub fn month_key<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y-%m").to_string()
}

/// Month key of the current local time.
pub fn current_month() -> String {
    month_key(&Local::now())
}

/// Reads the stats file, creating it (and its parent directories) empty when absent.
pub fn load_stats(path: &Path) -> Result<Stats, QuotaError> {
    let io_err = |source| QuotaError::Io {
        path: path.to_path_buf(),
        source,
    };
    if !path.exists() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::File::create(path).map_err(io_err)?;
        return Ok(Stats::default());
    }

    let text = fs::read_to_string(path).map_err(io_err)?;
    if text.trim().is_empty() {
        return Ok(Stats::default());
    }
    serde_yaml::from_str(&text).map_err(|source| QuotaError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Replaces the stats file with `stats`. Readers see either the old or the new document.
pub fn dump_stats(path: &Path, stats: &Stats) -> Result<(), QuotaError> {
    let text = serde_yaml::to_string(stats).map_err(QuotaError::Serialize)?;
    replace_file(path, |file| file.write_all(text.as_bytes())).map_err(|source| QuotaError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a sibling temp file through `write`, syncs it and renames it over `path`.
///
/// On error the temp file is removed and `path` is left untouched.
fn replace_file<W>(path: &Path, write: W) -> io::Result<()>
where
    W: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    write(temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    // The rename itself is durable only once the directory entry is flushed.
    #[cfg(unix)]
    File::open(dir)?.sync_all()?;
    Ok(())
}

/// Monthly ceiling backed by a YAML stats file.
pub struct QuotaTracker {
    path: PathBuf,
    limit: u64,
    stats: Mutex<Stats>,
}

impl QuotaTracker {
    pub fn load(path: impl Into<PathBuf>, limit: u64) -> Result<Self, QuotaError> {
        let path = path.into();
        let stats = load_stats(&path)?;
        Ok(Self {
            path,
            limit,
            stats: Mutex::new(stats),
        })
    }

    /// Rejects when `used(month) + size > limit`. A month without entries counts as zero.
    pub fn check(&self, month: &str, size: u64) -> Result<(), QuotaError> {
        let used = self
            .lock()
            .months
            .get(month)
            .map(Item::used_bytes)
            .unwrap_or(0);
        if used.saturating_add(size) > self.limit {
            return Err(QuotaError::Exceeded {
                month: month.to_string(),
                used,
                requested: size,
                limit: self.limit,
            });
        }
        Ok(())
    }

    /// Adds one upload of `size` bytes to `month` and the total, then persists.
    ///
    /// The in-memory increment is kept even when persisting fails.
    pub fn record(&self, month: &str, size: u64) -> Result<Item, QuotaError> {
        let mut stats = self.lock();
        stats.total.add(size);
        let item = stats.months.entry(month.to_string()).or_default();
        item.add(size);
        let item = *item;
        dump_stats(&self.path, &stats)?;
        Ok(item)
    }

    pub fn month_usage(&self, month: &str) -> Item {
        self.lock().months.get(month).copied().unwrap_or_default()
    }

    pub fn snapshot(&self) -> Stats {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Stats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
