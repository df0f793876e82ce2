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

//! Event model carried from the source transport to a sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Wire tag of the only decodable event kind.
pub const UPLOAD: &str = "UPLOAD";

/// Delivery guarantee requested for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("qos {0} is not supported, expected 0 or 1")]
pub struct UnsupportedQos(pub u8);

impl TryFrom<u8> for Qos {
    type Error = UnsupportedQos;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            other => Err(UnsupportedQos(other)),
        }
    }
}

impl From<Qos> for u8 {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => 1,
        }
    }
}

impl Serialize for Qos {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*self))
    }
}

impl<'de> Deserialize<'de> for Qos {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let level = u8::deserialize(deserializer)?;
        Qos::try_from(level).map_err(serde::de::Error::custom)
    }
}

/// Content of an `UPLOAD` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    pub local_path: String,
    pub remote_path: String,
    #[serde(default)]
    pub zip: bool,
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

impl UploadEvent {
    /// Returns `true` when `local_path` contains a `..` segment.
    pub fn has_parent_traversal(&self) -> bool {
        self.local_path
            .split(['/', '\\'])
            .any(|segment| segment == "..")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Upload(UploadEvent),
    /// Raw payload forwarded untouched to a queue sink. Never decoded from the wire.
    Publish(Vec<u8>),
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Upload(_) => UPLOAD,
            EventKind::Publish(_) => "PUBLISH",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("event invalid: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("event invalid: event type `{0}` unexpected")]
    UnsupportedKind(String),
    #[error("event invalid: event type `{0}` has no content")]
    MissingContent(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<serde_json::Value>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            time: Utc::now(),
            kind,
        }
    }

    /// Decodes `{"type": "...", "content": {...}}`. Only `UPLOAD` is accepted.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_slice(payload)?;
        if envelope.kind != UPLOAD {
            return Err(DecodeError::UnsupportedKind(envelope.kind));
        }
        let content = match envelope.content {
            Some(serde_json::Value::Null) | None => {
                return Err(DecodeError::MissingContent(envelope.kind))
            }
            Some(content) => content,
        };
        let upload: UploadEvent = serde_json::from_value(content)?;
        Ok(Event::new(EventKind::Upload(upload)))
    }
}

/// A decoded event together with the source delivery it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventMessage {
    pub id: u64,
    pub qos: Qos,
    pub topic: String,
    pub event: Event,
}

impl Display for EventMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} message {} on `{}` (qos {})",
            self.event.kind.name(),
            self.id,
            self.topic,
            u8::from(self.qos)
        )
    }
}
