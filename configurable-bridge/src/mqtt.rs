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

//! MQTT source built on rumqttc with manual acknowledgements.

use crate::config::BrokerConfig;
use async_trait::async_trait;
use remote_bridge::transport::{
    Delivery, SourceConnector, SourceListener, SourceTransport, TransportError,
};
use remote_bridge::Qos;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "mqtt_source";
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);
const MIN_KEEPALIVE: Duration = Duration::from_secs(5);

/// Opens one MQTT session per rule.
pub(crate) struct MqttConnector {
    broker: BrokerConfig,
}

impl MqttConnector {
    pub(crate) fn new(broker: BrokerConfig) -> Self {
        Self { broker }
    }

    fn options(&self, client_id: &str) -> Result<MqttOptions, TransportError> {
        let (host, port) = self
            .broker
            .endpoint()
            .map_err(|e| TransportError::new(e.to_string()))?;
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(self.broker.keepalive.max(MIN_KEEPALIVE));
        options.set_clean_session(self.broker.clean_session);
        options.set_manual_acks(true);
        if let Some(username) = &self.broker.username {
            options.set_credentials(
                username.as_str(),
                self.broker.password.as_deref().unwrap_or(""),
            );
        }
        Ok(options)
    }
}

impl SourceConnector for MqttConnector {
    fn connect(&self, client_id: &str) -> Result<Arc<dyn SourceTransport>, TransportError> {
        let options = self.options(client_id)?;
        let (client, event_loop) = AsyncClient::new(options, self.broker.capacity);
        Ok(Arc::new(MqttSource::new(client_id, client, event_loop)))
    }
}

type Pending = Arc<Mutex<HashMap<u16, Publish>>>;

/// One MQTT session. The event loop is polled by a task started on subscribe.
pub(crate) struct MqttSource {
    client_id: String,
    client: AsyncClient,
    event_loop: Mutex<Option<EventLoop>>,
    pending: Pending,
    shutdown: watch::Sender<bool>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl MqttSource {
    fn new(client_id: &str, client: AsyncClient, event_loop: EventLoop) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            client_id: client_id.to_string(),
            client,
            event_loop: Mutex::new(Some(event_loop)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            shutdown,
            poller: Mutex::new(None),
        }
    }
}

fn to_mqtt_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
    }
}

#[async_trait]
impl SourceTransport for MqttSource {
    async fn subscribe(
        &self,
        topic: &str,
        qos: Qos,
        listener: Arc<dyn SourceListener>,
    ) -> Result<(), TransportError> {
        let event_loop = self
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                TransportError::new(format!("client {} is already subscribed", self.client_id))
            })?;

        self.client
            .subscribe(topic, to_mqtt_qos(qos))
            .await
            .map_err(|e| TransportError::new(format!("failed to subscribe to `{topic}`: {e}")))?;

        let poll = PollLoop {
            client_id: self.client_id.clone(),
            client: self.client.clone(),
            topic: topic.to_string(),
            qos: to_mqtt_qos(qos),
            pending: self.pending.clone(),
            listener,
        };
        let handle = tokio::spawn(poll.run(event_loop, self.shutdown.subscribe()));
        *self.poller.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    async fn acknowledge(&self, id: u64) -> Result<(), TransportError> {
        let publish = u16::try_from(id)
            .ok()
            .and_then(|pkid| {
                self.pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&pkid)
            })
            .ok_or_else(|| TransportError::new(format!("no pending message with id {id}")))?;
        self.client
            .ack(&publish)
            .await
            .map_err(|e| TransportError::new(format!("failed to ack message {id}: {e}")))
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        let _ = self.shutdown.send(true);
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| TransportError::new(format!("source poller failed: {e}")))?;
        }
        Ok(())
    }
}

struct PollLoop {
    client_id: String,
    client: AsyncClient,
    topic: String,
    qos: QoS,
    pending: Pending,
    listener: Arc<dyn SourceListener>,
}

impl PollLoop {
    async fn run(self, mut event_loop: EventLoop, mut shutdown: watch::Receiver<bool>) {
        let mut connected_once = false;
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = self.client.try_disconnect();
                    let _ = tokio::time::timeout(DISCONNECT_GRACE, event_loop.poll()).await;
                    info!(component = COMPONENT, client_id = self.client_id.as_str(), "source disconnected");
                    break;
                }
                polled = event_loop.poll() => match polled {
                    Ok(Event::Incoming(Packet::Publish(publish))) => self.forward(publish).await,
                    Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                        debug!(
                            component = COMPONENT,
                            client_id = self.client_id.as_str(),
                            session_present = connack.session_present,
                            "source connected"
                        );
                        // A fresh session after a reconnect has lost the subscription.
                        if connected_once && !connack.session_present {
                            if let Err(err) = self.client.try_subscribe(self.topic.as_str(), self.qos) {
                                warn!(
                                    component = COMPONENT,
                                    client_id = self.client_id.as_str(),
                                    err = %err,
                                    "failed to resubscribe after reconnect"
                                );
                            }
                        }
                        connected_once = true;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        self.listener
                            .on_error(TransportError::new(format!("connection error: {err}")))
                            .await;
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                },
            }
        }
    }

    async fn forward(&self, publish: Publish) {
        let qos = match publish.qos {
            QoS::AtMostOnce => Qos::AtMostOnce,
            QoS::AtLeastOnce | QoS::ExactlyOnce => Qos::AtLeastOnce,
        };
        if qos == Qos::AtLeastOnce {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(publish.pkid, publish.clone());
        }
        let delivery = Delivery {
            id: u64::from(publish.pkid),
            qos,
            topic: publish.topic.clone(),
            payload: publish.payload.to_vec(),
        };
        self.listener.on_receive(delivery).await;
    }
}
