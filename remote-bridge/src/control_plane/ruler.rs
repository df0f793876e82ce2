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

//! Ruler lifecycle: bind one source subscription to one sink client.

use crate::config::RuleInfo;
use crate::control_plane::sink_registry::SinkRegistry;
use crate::data_plane::ingress_listener::{RuleCompletion, RuleListener};
use crate::error::RulerError;
use crate::observability::events;
use crate::transport::{SourceConnector, SourceTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const COMPONENT: &str = "ruler";
const UNSUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Source client identity of a rule.
pub fn rule_client_id(service: &str, rule: &str) -> String {
    format!("{service}-rule-{rule}")
}

pub struct Ruler {
    name: String,
    source: Arc<dyn SourceTransport>,
    completion: Arc<RuleCompletion>,
    closed: AtomicBool,
}

impl Ruler {
    /// Resolves the rule's target and subscribes to its topic.
    ///
    /// A failed subscription is logged and the ruler is still returned.
    pub async fn new(
        service: &str,
        rule: &RuleInfo,
        sinks: &SinkRegistry,
        connector: &dyn SourceConnector,
    ) -> Result<Self, RulerError> {
        rule.validate()?;
        let target = sinks
            .get(&rule.target.client)
            .ok_or_else(|| RulerError::TargetNotFound(rule.target.client.clone()))?;

        let client_id = rule_client_id(service, &rule.name);
        let source = connector
            .connect(&client_id)
            .map_err(|source| RulerError::Source {
                rule: rule.name.clone(),
                source,
            })?;

        let completion = Arc::new(RuleCompletion::new(&rule.name, source.clone()));
        let listener = Arc::new(RuleListener::new(&rule.name, target, completion.clone()));
        match source
            .subscribe(&rule.source.topic, rule.source.qos, listener)
            .await
        {
            Ok(()) => info!(
                event = events::RULE_START,
                component = COMPONENT,
                rule = rule.name.as_str(),
                client_id = client_id.as_str(),
                topic = rule.source.topic.as_str(),
                target = rule.target.client.as_str(),
                "rule started"
            ),
            Err(err) => error!(
                event = events::RULE_SUBSCRIBE_FAILED,
                component = COMPONENT,
                rule = rule.name.as_str(),
                topic = rule.source.topic.as_str(),
                err = %err,
                "failed to subscribe rule source"
            ),
        }

        Ok(Self {
            name: rule.name.clone(),
            source,
            completion,
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// QoS 1 messages dispatched and not yet completed.
    pub async fn in_flight_count(&self) -> usize {
        self.completion.in_flight_count().await
    }

    /// Stops the subscription. Idempotent and bounded in time.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        match tokio::time::timeout(UNSUBSCRIBE_TIMEOUT, self.source.unsubscribe()).await {
            Ok(Ok(())) => info!(
                event = events::RULE_CLOSE_OK,
                component = COMPONENT,
                rule = self.name.as_str(),
                "rule closed"
            ),
            Ok(Err(err)) => warn!(
                event = events::RULE_CLOSE_FAILED,
                component = COMPONENT,
                rule = self.name.as_str(),
                err = %err,
                "failed to unsubscribe rule source"
            ),
            Err(_) => warn!(
                event = events::RULE_CLOSE_FAILED,
                component = COMPONENT,
                rule = self.name.as_str(),
                timeout = ?UNSUBSCRIBE_TIMEOUT,
                "timed out unsubscribing rule source"
            ),
        }
    }
}
