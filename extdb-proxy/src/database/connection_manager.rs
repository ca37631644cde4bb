use std::sync::Arc;

use anyhow::{Context, Result};
use extdb_core::{EngineDriver, Gateway};
use extdb_rpc::{ConnectionConfig, EngineType};

use super::mongo_adapter::MongoAdapter;
use super::mysql_adapter::MySqlAdapter;

/// Builds the adapter matching a connection config.
pub struct ConnectionManager {
    config: ConnectionConfig,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Connect to the configured engine.
    pub async fn connect(&self) -> Result<Arc<dyn EngineDriver>> {
        tracing::info!(
            "[ConnectionManager] Connecting to {} at {}:{}",
            self.config.engine,
            self.config.host,
            self.config.port
        );
        let driver: Arc<dyn EngineDriver> = match self.config.engine {
            EngineType::MySql => Arc::new(
                MySqlAdapter::connect(&self.config)
                    .await
                    .context("Failed to connect to MySQL")?,
            ),
            EngineType::MongoDB => Arc::new(
                MongoAdapter::connect(&self.config)
                    .await
                    .context("Failed to connect to MongoDB")?,
            ),
        };
        Ok(driver)
    }

    /// Connect and wrap the driver in a [`Gateway`].
    pub async fn gateway(&self) -> Result<Gateway> {
        Ok(Gateway::new(self.connect().await?))
    }

    /// Open a throwaway connection and ping the engine.
    pub async fn test_connection(&self) -> Result<bool> {
        match self.config.engine {
            EngineType::MySql => {
                let adapter = MySqlAdapter::connect(&self.config).await?;
                adapter.ping().await?;
                adapter.close().await;
            }
            EngineType::MongoDB => {
                let adapter = MongoAdapter::connect(&self.config).await?;
                adapter.ping().await?;
            }
        }
        Ok(true)
    }
}
