//! Tile map provider initialization.

use simple_agent_config::{AgentConfig, ApiKey};
use tracing::info;

pub struct TileMapClient {
    api_key: Option<ApiKey>,
}

impl TileMapClient {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            api_key: config.tile_map_api_key().cloned(),
        }
    }

    /// One-shot provider API key configuration.
    ///
    /// Invoked once at startup before other launch work. The key value
    /// stays out of logs.
    pub fn provide_api_key(&self) {
        if self.api_key.is_some() {
            info!("Tile map provider API key configured");
        } else {
            info!("Tile map support disabled");
        }
    }

    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }
}
