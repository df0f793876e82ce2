//! Named sink clients, built once from configuration.

use crate::config::{validate_sinks, SinkConfig};
use crate::data_plane::sink_client::SinkClient;
use crate::error::ClientBuildError;
use crate::transport::SinkConnector;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct SinkRegistry {
    clients: HashMap<String, Arc<SinkClient>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every configured client. On failure the clients already built are closed.
    pub async fn build(
        configs: &[SinkConfig],
        connector: &dyn SinkConnector,
    ) -> Result<Self, ClientBuildError> {
        validate_sinks(configs)?;
        let mut registry = Self::new();
        for config in configs {
            match SinkClient::new(config, connector) {
                Ok(client) => registry.insert(Arc::new(client)),
                Err(err) => {
                    registry.close().await;
                    return Err(err);
                }
            }
        }
        Ok(registry)
    }

    /// Adds `client` under its own name, replacing any client with that name.
    pub fn insert(&mut self, client: Arc<SinkClient>) {
        self.clients.insert(client.name().to_string(), client);
    }

    pub fn get(&self, name: &str) -> Option<Arc<SinkClient>> {
        self.clients.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Closes every client, draining in-flight work.
    pub async fn close(&self) {
        for client in self.clients.values() {
            client.close().await;
        }
    }
}
