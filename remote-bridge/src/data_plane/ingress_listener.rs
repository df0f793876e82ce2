//! Rule listener: decode, deduplicate and hand messages to the target sink, then
//! acknowledge once the sink reports success.

use crate::data_plane::in_flight::InFlightSet;
use crate::data_plane::sink_client::{CompletionHandler, IngressMode, SinkClient};
use crate::error::DeliveryError;
use crate::event::{DecodeError, Event, EventKind, EventMessage, Qos};
use crate::observability::{events, fields};
use crate::transport::{Delivery, SourceListener, SourceTransport, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "ingress_listener";

/// Completion side of a rule. Owns the rule's in-flight set.
pub(crate) struct RuleCompletion {
    rule: String,
    source: Arc<dyn SourceTransport>,
    in_flight: InFlightSet,
}

impl RuleCompletion {
    pub(crate) fn new(rule: &str, source: Arc<dyn SourceTransport>) -> Self {
        Self {
            rule: rule.to_string(),
            source,
            in_flight: InFlightSet::new(),
        }
    }

    pub(crate) async fn in_flight_count(&self) -> usize {
        self.in_flight.len().await
    }
}

#[async_trait]
impl CompletionHandler for RuleCompletion {
    async fn on_complete(&self, message: EventMessage, result: Result<(), DeliveryError>) {
        let rule = self.rule.as_str();
        if message.qos == Qos::AtLeastOnce {
            if result.is_ok() {
                match self.source.acknowledge(message.id).await {
                    Ok(()) => debug!(
                        event = events::ACK_SENT,
                        component = COMPONENT,
                        rule,
                        msg_id = message.id,
                        "acknowledged message"
                    ),
                    Err(err) => error!(
                        event = events::ACK_FAILED,
                        component = COMPONENT,
                        rule,
                        msg_id = message.id,
                        err = %err,
                        "failed to acknowledge message"
                    ),
                }
            }
            self.in_flight.remove(message.id).await;
        }

        match result {
            Ok(()) => debug!(
                event = events::DELIVERY_OK,
                component = COMPONENT,
                rule,
                msg_id = message.id,
                qos = fields::format_qos(message.qos),
                "message delivered"
            ),
            Err(err) => error!(
                event = events::DELIVERY_FAILED,
                component = COMPONENT,
                rule,
                msg_id = message.id,
                qos = fields::format_qos(message.qos),
                topic = message.topic.as_str(),
                err = %err,
                "failed to process message"
            ),
        }
    }
}

/// Receiving side of a rule.
pub(crate) struct RuleListener {
    rule: String,
    target: Arc<SinkClient>,
    completion: Arc<RuleCompletion>,
}

impl RuleListener {
    pub(crate) fn new(rule: &str, target: Arc<SinkClient>, completion: Arc<RuleCompletion>) -> Self {
        Self {
            rule: rule.to_string(),
            target,
            completion,
        }
    }

    fn build_message(&self, delivery: Delivery) -> Result<EventMessage, (Delivery, DecodeError)> {
        let event = match self.target.ingress_mode() {
            IngressMode::Passthrough => Event::new(EventKind::Publish(delivery.payload)),
            IngressMode::DecodeEvent => match Event::decode(&delivery.payload) {
                Ok(event) => event,
                Err(err) => return Err((delivery, err)),
            },
        };
        Ok(EventMessage {
            id: delivery.id,
            qos: delivery.qos,
            topic: delivery.topic,
            event,
        })
    }
}

#[async_trait]
impl SourceListener for RuleListener {
    async fn on_receive(&self, delivery: Delivery) {
        let rule = self.rule.as_str();
        debug!(
            event = events::INGRESS_RECEIVE,
            component = COMPONENT,
            rule,
            msg_id = delivery.id,
            qos = fields::format_qos(delivery.qos),
            topic = delivery.topic.as_str(),
            bytes = delivery.payload.len(),
            "received message"
        );

        let message = match self.build_message(delivery) {
            Ok(message) => message,
            Err((delivery, err)) => {
                warn!(
                    event = events::INGRESS_DECODE_FAILED,
                    component = COMPONENT,
                    rule,
                    msg_id = delivery.id,
                    topic = delivery.topic.as_str(),
                    err = %err,
                    "dropping undecodable message"
                );
                return;
            }
        };

        if message.qos == Qos::AtLeastOnce && !self.completion.in_flight.insert(message.id).await {
            debug!(
                event = events::INGRESS_DUPLICATE_DROPPED,
                component = COMPONENT,
                rule,
                msg_id = message.id,
                reason = fields::REASON_ALREADY_IN_FLIGHT,
                "dropping redelivery of in-flight message"
            );
            return;
        }

        self.target
            .call_async(message, self.completion.clone())
            .await;
    }

    async fn on_error(&self, err: TransportError) {
        info!(
            event = events::INGRESS_SOURCE_ERROR,
            component = COMPONENT,
            rule = self.rule.as_str(),
            err = %err,
            "source reported an error"
        );
    }
}
