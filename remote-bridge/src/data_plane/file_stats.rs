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

//! Process-lifetime outcome counters and their periodic reporter.

use crate::observability::events;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

const COMPONENT: &str = "file_stats";

#[derive(Debug, Default)]
pub struct FileStats {
    success: AtomicU64,
    fail: AtomicU64,
    quota_rejected: AtomicU64,
    not_found: AtomicU64,
}

/// Point-in-time copy of [`FileStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileStatsSnapshot {
    pub success: u64,
    pub fail: u64,
    pub quota_rejected: u64,
    pub not_found: u64,
}

impl FileStats {
    pub(crate) fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fail(&self) {
        self.fail.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_quota_rejected(&self) {
        self.quota_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FileStatsSnapshot {
        FileStatsSnapshot {
            success: self.success.load(Ordering::Relaxed),
            fail: self.fail.load(Ordering::Relaxed),
            quota_rejected: self.quota_rejected.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
        }
    }
}

/// Logs a client's counters on a fixed interval until stopped.
pub(crate) struct StatsReporter {
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StatsReporter {
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(client: &str, stats: Arc<FileStats>, interval: Duration) -> Self {
        let (shutdown, mut stopped) = watch::channel(false);
        let client = client.to_string();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = stats.snapshot();
                        info!(
                            event = events::STATS_REPORT,
                            component = COMPONENT,
                            client = client.as_str(),
                            success = snapshot.success,
                            fail = snapshot.fail,
                            quota_rejected = snapshot.quota_rejected,
                            not_found = snapshot.not_found,
                            "[Recording]"
                        );
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        Self {
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stops the reporter and waits for it to exit. Idempotent.
    pub(crate) async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(
                    component = COMPONENT,
                    err = %err,
                    "stats reporter ended abnormally"
                );
            }
        }
    }
}
