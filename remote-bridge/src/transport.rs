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

//! Seams to the external systems: the message source, object storage and the queue.
//!
//! Wire protocols live behind these traits. The core never speaks MQTT, S3 or Kafka
//! itself; it is handed implementations at construction time.

use crate::config::SinkConfig;
use crate::event::Qos;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Opaque failure reported by an external transport.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One message handed over by the source transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub id: u64,
    pub qos: Qos,
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Receives deliveries for one subscription.
#[async_trait]
pub trait SourceListener: Send + Sync {
    async fn on_receive(&self, delivery: Delivery);

    async fn on_error(&self, err: TransportError);
}

/// A connected source (one per rule).
#[async_trait]
pub trait SourceTransport: Send + Sync {
    async fn subscribe(
        &self,
        topic: &str,
        qos: Qos,
        listener: Arc<dyn SourceListener>,
    ) -> Result<(), TransportError>;

    /// Acknowledges a QoS 1 delivery by its id.
    async fn acknowledge(&self, id: u64) -> Result<(), TransportError>;

    /// Stops delivering and releases the connection. Must tolerate repeated calls.
    async fn unsubscribe(&self) -> Result<(), TransportError>;
}

/// Opens source connections with a caller-chosen client identity.
pub trait SourceConnector: Send + Sync {
    fn connect(&self, client_id: &str) -> Result<Arc<dyn SourceTransport>, TransportError>;
}

/// Object storage capabilities used by the storage sink.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object_from_file(
        &self,
        bucket: &str,
        remote_path: &str,
        local_path: &Path,
        meta: &HashMap<String, String>,
    ) -> Result<(), TransportError>;

    /// `content_md5` is the base64 encoded MD5 digest of the local file.
    async fn object_exists(
        &self,
        bucket: &str,
        remote_path: &str,
        content_md5: &str,
    ) -> Result<bool, TransportError>;
}

/// Keyed message producer used by the queue sink.
#[async_trait]
pub trait QueueProducer: Send + Sync {
    async fn send(&self, key: &[u8], value: &[u8]) -> Result<(), TransportError>;
}

/// Builds the wire clients behind each configured sink.
pub trait SinkConnector: Send + Sync {
    fn object_storage(&self, config: &SinkConfig)
        -> Result<Arc<dyn ObjectStorage>, TransportError>;

    fn queue_producer(&self, config: &SinkConfig) -> Result<Arc<dyn QueueProducer>, TransportError>;
}
