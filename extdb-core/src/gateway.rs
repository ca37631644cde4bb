use std::sync::Arc;

use crate::data_service::DataService;
use crate::engine::EngineDriver;
use crate::schema_cache::SchemaCache;
use crate::schema_service::SchemaService;

/// Schema and data services over one engine, sharing one schema cache.
pub struct Gateway {
    pub schema: SchemaService,
    pub data: DataService,
    cache: Arc<SchemaCache>,
    driver: Arc<dyn EngineDriver>,
}

impl Gateway {
    pub fn new(driver: Arc<dyn EngineDriver>) -> Self {
        let cache = Arc::new(SchemaCache::new(driver.clone()));
        Self {
            schema: SchemaService::new(driver.clone(), cache.clone()),
            data: DataService::new(driver.clone(), cache.clone()),
            cache,
            driver,
        }
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn engine_name(&self) -> &str {
        self.driver.engine_name()
    }
}
