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

//! Queue sink: forwards raw payloads keyed by their source topic.

use crate::config::SinkConfig;
use crate::data_plane::file_stats::{FileStats, FileStatsSnapshot, StatsReporter};
use crate::data_plane::sink_client::{dispatch, CompletionHandler, TaskExecutor};
use crate::data_plane::worker_pool::WorkerPool;
use crate::error::{ClientBuildError, DeliveryError};
use crate::event::{EventKind, EventMessage};
use crate::observability::events;
use crate::transport::QueueProducer;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const COMPONENT: &str = "queue_client";

pub(crate) struct QueueWorker {
    name: String,
    topic: String,
    timeout: Duration,
    producer: Arc<dyn QueueProducer>,
    stats: Arc<FileStats>,
}

pub struct QueueClient {
    worker: Arc<QueueWorker>,
    pool: WorkerPool,
    reporter: StatsReporter,
}

impl QueueClient {
    /// Must be called within a Tokio runtime.
    pub fn new(config: &SinkConfig, producer: Arc<dyn QueueProducer>) -> Result<Self, ClientBuildError> {
        config.validate()?;
        let stats = Arc::new(FileStats::default());
        let worker = Arc::new(QueueWorker {
            name: config.name.clone(),
            topic: config.topic.clone(),
            timeout: config.timeout,
            producer,
            stats: stats.clone(),
        });
        info!(
            event = events::SINK_CREATE_OK,
            component = COMPONENT,
            client = config.name.as_str(),
            kind = %config.kind,
            topic = config.topic.as_str(),
            workers = config.pool.worker,
            "created queue client"
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

    pub async fn close(&self) {
        info!(
            event = events::SINK_CLOSE_START,
            component = COMPONENT,
            client = self.worker.name.as_str(),
            "closing queue client"
        );
        self.pool.close().await;
        self.reporter.stop().await;
        info!(
            event = events::SINK_CLOSE_OK,
            component = COMPONENT,
            client = self.worker.name.as_str(),
            "queue client closed"
        );
    }
}

#[async_trait]
impl TaskExecutor for QueueWorker {
    async fn execute(&self, message: &EventMessage) -> Result<(), DeliveryError> {
        let EventKind::Publish(payload) = &message.event.kind else {
            return Err(DeliveryError::UnsupportedEvent {
                client: self.name.clone(),
                kind: message.event.kind.name(),
            });
        };

        let sent = tokio::time::timeout(
            self.timeout,
            self.producer.send(message.topic.as_bytes(), payload),
        )
        .await;
        let result = match sent {
            Ok(result) => result.map_err(DeliveryError::from),
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        };
        match &result {
            Ok(()) => {
                self.stats.record_success();
                debug!(
                    event = events::PRODUCE_OK,
                    component = COMPONENT,
                    client = self.name.as_str(),
                    topic = self.topic.as_str(),
                    key = message.topic.as_str(),
                    bytes = payload.len(),
                    "produced message"
                );
            }
            Err(err) => {
                self.stats.record_fail();
                error!(
                    event = events::PRODUCE_FAILED,
                    component = COMPONENT,
                    client = self.name.as_str(),
                    topic = self.topic.as_str(),
                    key = message.topic.as_str(),
                    err = %err,
                    "failed to produce message"
                );
            }
        }
        result
    }
}
