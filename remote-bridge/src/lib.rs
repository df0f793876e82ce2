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

//! # remote-bridge
//!
//! `remote-bridge` forwards messages from a local publish/subscribe source to
//! remote sinks: object storage (upload events) or a message queue (raw payloads).
//!
//! A [`Ruler`] owns one source subscription. It decodes each delivery, drops QoS 1
//! redeliveries that are still in flight, and hands the message to a
//! [`SinkClient`] without waiting. The client admits it into a fixed-size worker
//! pool or rejects it immediately when every worker is busy. For object storage a
//! worker resolves and stages the local path, skips objects that are already
//! stored with the same checksum, applies the monthly quota and uploads. The
//! outcome returns to the ruler, which acknowledges QoS 1 messages on success.
//!
//! Wire protocols stay outside the crate behind the traits in [`transport`].
//!
//! ## Upload events
//!
//! ```
//! use remote_bridge::{Event, EventKind};
//!
//! let payload = br#"{"type":"UPLOAD","content":{"localPath":"var/log/app","remotePath":"logs/app.zip","zip":true}}"#;
//! let event = Event::decode(payload).unwrap();
//! let EventKind::Upload(upload) = event.kind else { unreachable!() };
//! assert_eq!(upload.remote_path, "logs/app.zip");
//!
//! assert!(Event::decode(br#"{"type":"DELETE","content":{}}"#).is_err());
//! ```
//!
//! ## Sizes and durations
//!
//! ```
//! use remote_bridge::config::{parse_duration, ByteSize};
//! use std::time::Duration;
//!
//! assert_eq!("9g".parse::<ByteSize>().unwrap().bytes(), 9 * 1024 * 1024 * 1024);
//! assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
//! assert_eq!("10a".parse::<ByteSize>().unwrap_err().to_string(), "invalid size: '10a'");
//! ```
//!
//! ## Observability
//!
//! Every log line carries an `event` field from [`observability::events`] and a
//! `component` field naming the emitting module. The crate never installs a
//! subscriber; binaries choose one.

pub mod config;
mod control_plane;
mod data_plane;
mod error;
mod event;
pub mod object_store;
pub mod observability;
pub mod quota;
pub mod staging;
pub mod transport;

pub use control_plane::ruler::{rule_client_id, Ruler};
pub use control_plane::sink_registry::SinkRegistry;
pub use data_plane::file_stats::{FileStats, FileStatsSnapshot};
pub use data_plane::queue_client::QueueClient;
pub use data_plane::sink_client::{CompletionHandler, IngressMode, SinkClient};
pub use data_plane::storage_client::StorageClient;
pub use error::{ClientBuildError, DeliveryError, RulerError};
pub use event::{
    DecodeError, Event, EventKind, EventMessage, Qos, UnsupportedQos, UploadEvent, UPLOAD,
};
