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

mod config;
mod connectors;
mod mqtt;

use crate::config::Config;
use crate::connectors::BuiltinConnectors;
use crate::mqtt::MqttConnector;
use anyhow::Context;
use clap::Parser;
use remote_bridge::{Ruler, SinkRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command()]
struct BridgeArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = BridgeArgs::parse();
    let config = Config::load(&args.config)?;

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logger.level))
        .context("Invalid logger level")?;
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    info!("Started configurable-bridge");

    let sinks = SinkRegistry::build(&config.clients, &BuiltinConnectors)
        .await
        .context("Unable to create clients")?;

    let source = MqttConnector::new(config.broker.clone());
    let mut rulers = Vec::with_capacity(config.rules.len());
    for rule in &config.rules {
        match Ruler::new(&config.service_name, rule, &sinks, &source).await {
            Ok(ruler) => rulers.push(ruler),
            Err(err) => {
                shutdown(&rulers, &sinks).await;
                return Err(err).with_context(|| format!("Unable to start rule {}", rule.name));
            }
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("Unable to listen for the shutdown signal")?;
    info!("Shutting down configurable-bridge");
    shutdown(&rulers, &sinks).await;
    Ok(())
}

/// Stops ingress first, then drains the sinks.
async fn shutdown(rulers: &[Ruler], sinks: &SinkRegistry) {
    for ruler in rulers {
        ruler.close().await;
    }
    sinks.close().await;
}
