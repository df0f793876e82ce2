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

//! The closed set of sinks and the asynchronous submission path they share.

use crate::config::SinkConfig;
use crate::data_plane::file_stats::FileStatsSnapshot;
use crate::data_plane::queue_client::QueueClient;
use crate::data_plane::storage_client::StorageClient;
use crate::data_plane::worker_pool::{catch_panic, AdmissionError, WorkerPool};
use crate::error::{ClientBuildError, DeliveryError};
use crate::event::EventMessage;
use crate::observability::{events, fields};
use crate::transport::SinkConnector;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "sink_client";

/// Receives the terminal outcome of a submitted message, exactly once.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn on_complete(&self, message: EventMessage, result: Result<(), DeliveryError>);
}

/// How a rule turns source payloads into events for a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngressMode {
    /// Decode `{"type": ..., "content": ...}` events.
    DecodeEvent,
    /// Forward the raw payload untouched.
    Passthrough,
}

pub enum SinkClient {
    Storage(StorageClient),
    Queue(QueueClient),
}

impl SinkClient {
    /// Builds the client selected by `config.kind`. Must be called within a Tokio runtime.
    pub fn new(config: &SinkConfig, connector: &dyn SinkConnector) -> Result<Self, ClientBuildError> {
        config.validate()?;
        let client = if config.kind.is_object_storage() {
            let backend = connector.object_storage(config).map_err(|source| {
                ClientBuildError::Connector {
                    client: config.name.clone(),
                    source,
                }
            })?;
            SinkClient::Storage(StorageClient::new(config, backend)?)
        } else {
            let producer = connector.queue_producer(config).map_err(|source| {
                ClientBuildError::Connector {
                    client: config.name.clone(),
                    source,
                }
            })?;
            SinkClient::Queue(QueueClient::new(config, producer)?)
        };
        Ok(client)
    }

    pub fn name(&self) -> &str {
        match self {
            SinkClient::Storage(client) => client.name(),
            SinkClient::Queue(client) => client.name(),
        }
    }

    pub fn ingress_mode(&self) -> IngressMode {
        match self {
            SinkClient::Storage(_) => IngressMode::DecodeEvent,
            SinkClient::Queue(_) => IngressMode::Passthrough,
        }
    }

    /// Submits `message` without waiting for it to execute.
    ///
    /// When no worker is free, or the client is closed, `on_complete` is invoked with
    /// the rejection before this returns.
    pub async fn call_async(&self, message: EventMessage, on_complete: Arc<dyn CompletionHandler>) {
        match self {
            SinkClient::Storage(client) => client.call_async(message, on_complete).await,
            SinkClient::Queue(client) => client.call_async(message, on_complete).await,
        }
    }

    pub fn file_stats(&self) -> FileStatsSnapshot {
        match self {
            SinkClient::Storage(client) => client.file_stats(),
            SinkClient::Queue(client) => client.file_stats(),
        }
    }

    /// Stops accepting work and waits for running workers. Idempotent.
    pub async fn close(&self) {
        match self {
            SinkClient::Storage(client) => client.close().await,
            SinkClient::Queue(client) => client.close().await,
        }
    }
}

/// The per-message body a worker runs.
#[async_trait]
pub(crate) trait TaskExecutor: Send + Sync + 'static {
    async fn execute(&self, message: &EventMessage) -> Result<(), DeliveryError>;
}

/// Admission plus hand-off shared by every sink.
pub(crate) async fn dispatch<E: TaskExecutor>(
    pool: &WorkerPool,
    client: &str,
    executor: &Arc<E>,
    message: EventMessage,
    on_complete: Arc<dyn CompletionHandler>,
) {
    let slot = match pool.try_admit() {
        Ok(slot) => slot,
        Err(rejection) => {
            let err = match rejection {
                AdmissionError::Saturated => {
                    warn!(
                        event = events::POOL_REJECT_SATURATED,
                        component = COMPONENT,
                        client,
                        msg_id = message.id,
                        workers = pool.capacity(),
                        "no worker available, rejecting message"
                    );
                    DeliveryError::PoolSaturated(pool.running())
                }
                AdmissionError::Closed => {
                    debug!(
                        event = events::POOL_REJECT_CLOSED,
                        component = COMPONENT,
                        client,
                        msg_id = message.id,
                        "client closed, rejecting message"
                    );
                    DeliveryError::ClientClosed(client.to_string())
                }
            };
            on_complete.on_complete(message, Err(err)).await;
            return;
        }
    };

    debug!(
        component = COMPONENT,
        client,
        msg_id = message.id,
        event_kind = fields::format_event_kind(&message),
        "dispatching message to worker"
    );
    let executor = executor.clone();
    let pool_name = client.to_string();
    pool.spawn(slot, async move {
        let result = catch_panic(&pool_name, executor.execute(&message))
            .await
            .unwrap_or_else(|reason| Err(DeliveryError::TaskPanicked(reason)));
        on_complete.on_complete(message, result).await;
    });
}
