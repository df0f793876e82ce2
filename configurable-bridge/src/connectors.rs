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

use remote_bridge::config::{SinkConfig, SinkKind};
use remote_bridge::object_store::LocalObjectStorage;
use remote_bridge::transport::{ObjectStorage, QueueProducer, SinkConnector, TransportError};
use std::sync::Arc;

const DEFAULT_LOCAL_ROOT: &str = "var/lib/remote-bridge/objects";

/// Sink backends linked into this binary.
///
/// `LOCAL` stores objects under the client's `endpoint` directory. Remote
/// object stores and queues need a backend crate that is not linked here.
pub(crate) struct BuiltinConnectors;

impl SinkConnector for BuiltinConnectors {
    fn object_storage(&self, config: &SinkConfig) -> Result<Arc<dyn ObjectStorage>, TransportError> {
        match config.kind {
            SinkKind::Local => {
                let root = if config.endpoint.is_empty() {
                    DEFAULT_LOCAL_ROOT
                } else {
                    config.endpoint.as_str()
                };
                Ok(Arc::new(LocalObjectStorage::new(root)))
            }
            kind => Err(not_linked(kind, config)),
        }
    }

    fn queue_producer(&self, config: &SinkConfig) -> Result<Arc<dyn QueueProducer>, TransportError> {
        Err(not_linked(config.kind, config))
    }
}

fn not_linked(kind: SinkKind, config: &SinkConfig) -> TransportError {
    TransportError::new(format!(
        "no {kind} backend is linked for client `{}`",
        config.name
    ))
}
