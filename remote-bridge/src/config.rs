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

//! Rule and sink configuration, with human readable sizes and durations.

use crate::event::Qos;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid size: '{0}'")]
    InvalidSize(String),
    #[error("invalid duration: '{0}'")]
    InvalidDuration(String),
    #[error("client `{client}`: {reason}")]
    InvalidClient { client: String, reason: String },
    #[error("rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },
    #[error("client name `{0}` is configured more than once")]
    DuplicateClient(String),
}

/// Routes one source topic to one named sink.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuleInfo {
    pub name: String,
    pub source: RuleSource,
    pub target: RuleTarget,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuleSource {
    pub topic: String,
    #[serde(default)]
    pub qos: Qos,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuleTarget {
    pub client: String,
}

impl RuleInfo {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidRule {
            rule: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.source.topic.is_empty() {
            return Err(invalid("source topic must not be empty"));
        }
        if self.target.client.is_empty() {
            return Err(invalid("target client must not be empty"));
        }
        Ok(())
    }
}

/// Sink flavors. Every kind but `kafka` is an object storage.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[serde(alias = "BOS")]
    Bos,
    #[serde(alias = "CEPH")]
    Ceph,
    #[serde(alias = "S3")]
    S3,
    #[serde(alias = "LOCAL")]
    Local,
    #[serde(alias = "KAFKA")]
    Kafka,
}

impl SinkKind {
    pub fn is_object_storage(self) -> bool {
        !matches!(self, SinkKind::Kafka)
    }
}

impl Display for SinkKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SinkKind::Bos => "BOS",
            SinkKind::Ceph => "CEPH",
            SinkKind::S3 => "S3",
            SinkKind::Local => "LOCAL",
            SinkKind::Kafka => "KAFKA",
        };
        f.write_str(name)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    pub name: String,
    pub kind: SinkKind,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub ak: String,
    #[serde(default)]
    pub sk: String,
    #[serde(default)]
    pub bucket: String,
    /// Destination topic of a queue sink.
    #[serde(default)]
    pub topic: String,
    /// Broker addresses of a queue sink.
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default = "default_temp_path")]
    pub temppath: PathBuf,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default = "default_timeout", with = "duration_format")]
    pub timeout: Duration,
    #[serde(default)]
    pub limit: LimitConfig,
    #[serde(default)]
    pub multipart: MultipartConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    #[serde(default = "default_worker")]
    pub worker: u32,
    /// Kept for configuration compatibility. Workers are spawned per task, so nothing idles.
    #[serde(default = "default_idletime", with = "duration_format")]
    pub idletime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker: default_worker(),
            idletime: default_idletime(),
        }
    }
}

/// Monthly upload ceiling.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LimitConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_limit_data")]
    pub data: ByteSize,
    #[serde(default = "default_limit_path")]
    pub path: PathBuf,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            enable: false,
            data: default_limit_data(),
            path: default_limit_path(),
        }
    }
}

/// Passed through to object storage connectors that upload in parts.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MultipartConfig {
    #[serde(default = "default_part_size")]
    pub partsize: ByteSize,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            partsize: default_part_size(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default = "default_report_interval", with = "duration_format")]
    pub interval: Duration,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval: default_report_interval(),
        }
    }
}

impl SinkConfig {
    /// A config with every optional field at its default.
    pub fn new(name: impl Into<String>, kind: SinkKind) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoint: String::new(),
            region: default_region(),
            ak: String::new(),
            sk: String::new(),
            bucket: String::new(),
            topic: String::new(),
            address: Vec::new(),
            temppath: default_temp_path(),
            pool: PoolConfig::default(),
            timeout: default_timeout(),
            limit: LimitConfig::default(),
            multipart: MultipartConfig::default(),
            report: ReportConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidClient {
            client: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.pool.worker == 0 {
            return Err(invalid("pool worker must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout must be greater than zero"));
        }
        if self.report.interval.is_zero() {
            return Err(invalid("report interval must be greater than zero"));
        }
        if self.kind.is_object_storage() {
            if self.bucket.is_empty() {
                return Err(invalid("bucket must not be empty"));
            }
            if self.limit.enable && self.limit.data.bytes() == 0 {
                return Err(invalid("limit data must be greater than zero when enabled"));
            }
            if self.multipart.partsize.bytes() == 0 || self.multipart.concurrency == 0 {
                return Err(invalid("multipart partsize and concurrency must be positive"));
            }
        } else if self.topic.is_empty() {
            return Err(invalid("topic must not be empty"));
        }
        Ok(())
    }
}

/// Checks every client and rejects duplicate names.
pub fn validate_sinks(configs: &[SinkConfig]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for config in configs {
        config.validate()?;
        if !seen.insert(config.name.as_str()) {
            return Err(ConfigError::DuplicateClient(config.name.clone()));
        }
    }
    Ok(())
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_temp_path() -> PathBuf {
    PathBuf::from("var/lib/remote-bridge/tmp")
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_worker() -> u32 {
    1000
}

fn default_idletime() -> Duration {
    Duration::from_secs(30)
}

fn default_limit_data() -> ByteSize {
    ByteSize(1 << 30)
}

fn default_limit_path() -> PathBuf {
    PathBuf::from("var/lib/remote-bridge/data/stats.yml")
}

fn default_part_size() -> ByteSize {
    ByteSize(100 << 20)
}

fn default_concurrency() -> u32 {
    10
}

fn default_report_interval() -> Duration {
    Duration::from_secs(60)
}

/// Byte count written as `"512k"`, `"100m"`, `"9g"` (1024 based) or a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidSize(text.to_string());
        let lower = text.trim().to_ascii_lowercase();
        let unit_start = lower
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(lower.len());
        let (digits, unit) = lower.split_at(unit_start);
        if digits.is_empty() {
            return Err(invalid());
        }
        let unit = unit.strip_suffix('b').unwrap_or(unit);
        let shift = match unit {
            "" => 0,
            "k" => 10,
            "m" => 20,
            "g" => 30,
            "t" => 40,
            "p" => 50,
            _ => return Err(invalid()),
        };
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        value
            .checked_mul(1u64 << shift)
            .map(ByteSize)
            .ok_or_else(invalid)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(bytes) => Ok(ByteSize(bytes)),
            NumberOrText::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

/// Parses `"500ms"`, `"30s"`, `"1m"`, `"2h"`, compounds like `"1m30s"`, or bare seconds.
pub fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(text.to_string());
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let unit_start = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (digits, tail) = rest.split_at(unit_start);
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let part = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60).ok_or_else(invalid)?),
            "h" => Duration::from_secs(value.checked_mul(3600).ok_or_else(invalid)?),
            _ => return Err(invalid()),
        };
        total = total.checked_add(part).ok_or_else(invalid)?;
        rest = next;
    }
    Ok(total)
}

/// Serde adapter for durations written as seconds or unit text (`"30s"`, `"1m30s"`).
pub mod duration_format {
    use super::{parse_duration, NumberOrText};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(seconds) => Ok(Duration::from_secs(seconds)),
            NumberOrText::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }

    pub fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }
}
