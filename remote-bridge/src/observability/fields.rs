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

//! Canonical structured field keys and value-format helpers.

use crate::event::{EventMessage, Qos};

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const RULE: &str = "rule";
pub const CLIENT: &str = "client";

pub const MSG_ID: &str = "msg_id";
pub const QOS: &str = "qos";
pub const TOPIC: &str = "topic";
pub const EVENT_KIND: &str = "event_kind";

pub const LOCAL_PATH: &str = "local_path";
pub const REMOTE_PATH: &str = "remote_path";
pub const BYTES: &str = "bytes";
pub const MONTH: &str = "month";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const REASON_ALREADY_IN_FLIGHT: &str = "already_in_flight";
pub const REASON_CHECKSUM_MATCH: &str = "checksum_match";

pub fn format_qos(qos: Qos) -> &'static str {
    match qos {
        Qos::AtMostOnce => "0",
        Qos::AtLeastOnce => "1",
    }
}

pub fn format_event_kind(message: &EventMessage) -> &'static str {
    message.event.kind.name()
}

pub fn format_meta_keys<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    let mut keys: Vec<&str> = keys.map(String::as_str).collect();
    if keys.is_empty() {
        return NONE.to_string();
    }
    keys.sort_unstable();
    keys.join(",")
}
