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

//! Object storage sink: staging, skip-if-unchanged, quota and the upload call.

use crate::config::SinkConfig;
use crate::data_plane::file_stats::{FileStats, FileStatsSnapshot, StatsReporter};
use crate::data_plane::sink_client::{dispatch, CompletionHandler, TaskExecutor};
use crate::data_plane::worker_pool::WorkerPool;
use crate::error::{ClientBuildError, DeliveryError};
use crate::event::{EventKind, EventMessage, UploadEvent};
use crate::object_store::file_size_and_md5;
use crate::observability::{events, fields};
use crate::quota::{self, QuotaTracker};
use crate::staging::{ArchivalStaging, StagedArtifact};
use crate::transport::ObjectStorage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "storage_client";

struct PreparedUpload {
    artifact: StagedArtifact,
    size: u64,
    md5: String,
}

pub(crate) struct StorageWorker {
    name: String,
    bucket: String,
    work_dir: PathBuf,
    timeout: Duration,
    backend: Arc<dyn ObjectStorage>,
    staging: ArchivalStaging,
    quota: Option<QuotaTracker>,
    stats: Arc<FileStats>,
}

pub struct StorageClient {
    worker: Arc<StorageWorker>,
    pool: WorkerPool,
    reporter: StatsReporter,
}

impl StorageClient {
    /// Resolves upload paths against the current working directory.
    pub fn new(config: &SinkConfig, backend: Arc<dyn ObjectStorage>) -> Result<Self, ClientBuildError> {
        let work_dir = std::env::current_dir().map_err(ClientBuildError::WorkingDir)?;
        Self::with_work_dir(config, backend, work_dir)
    }

    /// Must be called within a Tokio runtime.
    pub fn with_work_dir(
        config: &SinkConfig,
        backend: Arc<dyn ObjectStorage>,
        work_dir: impl Into<PathBuf>,
    ) -> Result<Self, ClientBuildError> {
        config.validate()?;
        let staging =
            ArchivalStaging::new(&config.temppath).map_err(|source| ClientBuildError::TempPath {
                path: config.temppath.clone(),
                source,
            })?;
        let quota = if config.limit.enable {
            let tracker = QuotaTracker::load(&config.limit.path, config.limit.data.bytes())
                .map_err(|source| ClientBuildError::Quota {
                    client: config.name.clone(),
                    source,
                })?;
            Some(tracker)
        } else {
            None
        };

        let stats = Arc::new(FileStats::default());
        let worker = Arc::new(StorageWorker {
            name: config.name.clone(),
            bucket: config.bucket.clone(),
            work_dir: work_dir.into(),
            timeout: config.timeout,
            backend,
            staging,
            quota,
            stats: stats.clone(),
        });
        info!(
            event = events::SINK_CREATE_OK,
            component = COMPONENT,
            client = config.name.as_str(),
            kind = %config.kind,
            bucket = config.bucket.as_str(),
            workers = config.pool.worker,
            quota_enabled = config.limit.enable,
            "created storage client"
        );
        Ok(Self {
            worker,
            pool: WorkerPool::new(&config.name, config.pool.worker),
            reporter: StatsReporter::spawn(&config.name, stats, config.report.interval),
        })
    }

    pub fn name(&self) -> &str {
        &self.worker.name
    }

    pub async fn call_async(&self, message: EventMessage, on_complete: Arc<dyn CompletionHandler>) {
        dispatch(&self.pool, &self.worker.name, &self.worker, message, on_complete).await;
    }

    pub fn file_stats(&self) -> FileStatsSnapshot {
        self.worker.stats.snapshot()
    }

    /// Persisted usage of `month`, when a quota is enabled.
    pub fn month_usage(&self, month: &str) -> Option<crate::quota::Item> {
        self.worker.quota.as_ref().map(|quota| quota.month_usage(month))
    }

    pub async fn close(&self) {
        info!(
            event = events::SINK_CLOSE_START,
            component = COMPONENT,
            client = self.worker.name.as_str(),
            "closing storage client"
        );
        self.pool.close().await;
        self.reporter.stop().await;
        info!(
            event = events::SINK_CLOSE_OK,
            component = COMPONENT,
            client = self.worker.name.as_str(),
            "storage client closed"
        );
    }
}

#[async_trait]
impl TaskExecutor for StorageWorker {
    async fn execute(&self, message: &EventMessage) -> Result<(), DeliveryError> {
        match &message.event.kind {
            EventKind::Upload(upload) => self.handle_upload(upload).await,
            other => Err(DeliveryError::UnsupportedEvent {
                client: self.name.clone(),
                kind: other.name(),
            }),
        }
    }
}

impl StorageWorker {
    async fn handle_upload(&self, upload: &UploadEvent) -> Result<(), DeliveryError> {
        if upload.has_parent_traversal() {
            warn!(
                event = events::UPLOAD_PATH_REJECTED,
                component = COMPONENT,
                client = self.name.as_str(),
                local_path = upload.local_path.as_str(),
                "rejecting local path with parent-directory segment"
            );
            return Err(DeliveryError::PathTraversal(upload.local_path.clone()));
        }

        // Absolute paths are still anchored at the working directory.
        let joined = self
            .work_dir
            .join(upload.local_path.trim_start_matches(['/', '\\']));
        let staging = self.staging.clone();
        let zip = upload.zip;
        let prepared = tokio::task::spawn_blocking(move || prepare(&staging, &joined, zip))
            .await
            .map_err(|err| DeliveryError::TaskPanicked(err.to_string()))?;
        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                if let DeliveryError::PathNotFound { path, reason } = &err {
                    self.stats.record_not_found();
                    warn!(
                        event = events::UPLOAD_PATH_NOT_FOUND,
                        component = COMPONENT,
                        client = self.name.as_str(),
                        local_path = %path.display(),
                        reason = reason.as_str(),
                        "failed to find path"
                    );
                }
                return Err(err);
            }
        };

        // `artifact` is removed when it goes out of scope, whatever the upload outcome.
        let PreparedUpload {
            artifact,
            size,
            md5,
        } = prepared;
        self.upload(artifact.path(), &upload.remote_path, &upload.meta, size, &md5)
            .await
    }

    async fn upload(
        &self,
        local: &Path,
        remote: &str,
        meta: &HashMap<String, String>,
        size: u64,
        md5: &str,
    ) -> Result<(), DeliveryError> {
        let saved = self
            .bounded(self.backend.object_exists(&self.bucket, remote, md5))
            .await?;
        if saved {
            debug!(
                event = events::UPLOAD_SKIPPED_UNCHANGED,
                component = COMPONENT,
                client = self.name.as_str(),
                remote_path = remote,
                reason = fields::REASON_CHECKSUM_MATCH,
                "object already saved, skipping upload"
            );
            return Ok(());
        }

        let month = quota::current_month();
        if let Some(quota) = &self.quota {
            if let Err(err) = quota.check(&month, size) {
                self.stats.record_quota_rejected();
                warn!(
                    event = events::QUOTA_EXCEEDED,
                    component = COMPONENT,
                    client = self.name.as_str(),
                    remote_path = remote,
                    month = month.as_str(),
                    bytes = size,
                    err = %err,
                    "monthly data limit reached, rejecting upload"
                );
                return Err(err.into());
            }
        }

        self.put_object_with_stats(local, remote, meta, size).await?;

        if let Some(quota) = &self.quota {
            if let Err(err) = quota.record(&month, size) {
                error!(
                    event = events::QUOTA_PERSIST_FAILED,
                    component = COMPONENT,
                    client = self.name.as_str(),
                    month = month.as_str(),
                    err = %err,
                    "failed to persist upload stats"
                );
                return Err(err.into());
            }
        }
        Ok(())
    }

    async fn put_object_with_stats(
        &self,
        local: &Path,
        remote: &str,
        meta: &HashMap<String, String>,
        size: u64,
    ) -> Result<(), DeliveryError> {
        let result = self
            .bounded(
                self.backend
                    .put_object_from_file(&self.bucket, remote, local, meta),
            )
            .await;
        match &result {
            Ok(()) => {
                self.stats.record_success();
                info!(
                    event = events::UPLOAD_OK,
                    component = COMPONENT,
                    client = self.name.as_str(),
                    remote_path = remote,
                    bytes = size,
                    meta = fields::format_meta_keys(meta.keys()),
                    "uploaded object"
                );
            }
            Err(err) => {
                self.stats.record_fail();
                error!(
                    event = events::UPLOAD_FAILED,
                    component = COMPONENT,
                    client = self.name.as_str(),
                    remote_path = remote,
                    err = %err,
                    "failed to upload object"
                );
            }
        }
        result
    }

    /// Applies the client timeout to one transport call.
    async fn bounded<T, F>(&self, call: F) -> Result<T, DeliveryError>
    where
        F: Future<Output = Result<T, crate::transport::TransportError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(DeliveryError::from),
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        }
    }
}

/// Blocking part of an upload: resolve, stage and checksum.
fn prepare(staging: &ArchivalStaging, joined: &Path, zip: bool) -> Result<PreparedUpload, DeliveryError> {
    let resolved = joined
        .canonicalize()
        .map_err(|err| DeliveryError::PathNotFound {
            path: joined.to_path_buf(),
            reason: err.to_string(),
        })?;
    let artifact = staging.stage(&resolved, zip)?;
    let (size, md5) =
        file_size_and_md5(artifact.path()).map_err(|source| DeliveryError::Checksum {
            path: artifact.path().to_path_buf(),
            source,
        })?;
    Ok(PreparedUpload {
        artifact,
        size,
        md5,
    })
}
