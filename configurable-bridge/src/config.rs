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

use anyhow::{anyhow, bail, Context};
use remote_bridge::config::{duration_format, validate_sinks, RuleInfo, SinkConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_service_name")]
    pub(crate) service_name: String,
    #[serde(default)]
    pub(crate) logger: LoggerConfig,
    #[serde(default)]
    pub(crate) broker: BrokerConfig,
    pub(crate) clients: Vec<SinkConfig>,
    pub(crate) rules: Vec<RuleInfo>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    #[serde(default = "default_level")]
    pub(crate) level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_address")]
    pub(crate) address: String,
    #[serde(default)]
    pub(crate) username: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default = "default_keepalive", with = "duration_format")]
    pub(crate) keepalive: Duration,
    #[serde(default)]
    pub(crate) clean_session: bool,
    /// Capacity of the request channel between a source client and its event loop.
    #[serde(default = "default_channel_capacity")]
    pub(crate) capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: default_broker_address(),
            username: None,
            password: None,
            keepalive: default_keepalive(),
            clean_session: false,
            capacity: default_channel_capacity(),
        }
    }
}

impl BrokerConfig {
    /// Splits `tcp://host:port`, `mqtt://host:port` or `host:port` into host and port.
    pub(crate) fn endpoint(&self) -> anyhow::Result<(String, u16)> {
        let address = self.address.trim();
        let rest = match address.split_once("://") {
            Some(("tcp" | "mqtt", rest)) => rest,
            Some((scheme, _)) => bail!("unsupported broker scheme `{scheme}` in `{address}`"),
            None => address,
        };
        let rest = rest.trim_end_matches('/');
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| anyhow!("invalid broker port in `{address}`: {e}"))?;
                (host, port)
            }
            None => (rest, DEFAULT_MQTT_PORT),
        };
        if host.is_empty() {
            bail!("broker address `{address}` has no host");
        }
        Ok((host.to_string(), port))
    }
}

impl Config {
    pub(crate) fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        let config: Config = json5::from_str(&contents)
            .with_context(|| format!("Unable to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if self.service_name.is_empty() {
            bail!("service_name must not be empty");
        }
        if self.broker.capacity == 0 {
            bail!("broker capacity must be greater than zero");
        }
        self.broker.endpoint()?;
        validate_sinks(&self.clients)?;
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }
}

fn default_service_name() -> String {
    "remote-bridge".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_broker_address() -> String {
    format!("tcp://127.0.0.1:{DEFAULT_MQTT_PORT}")
}

fn default_keepalive() -> Duration {
    Duration::from_secs(60)
}

fn default_channel_capacity() -> usize {
    10
}
