use std::collections::HashMap;
use std::sync::Arc;

use extdb_rpc::Field;
use parking_lot::RwLock;

use crate::engine::EngineDriver;
use crate::error::Result;

type Entries = Arc<HashMap<String, Arc<Vec<Field>>>>;

struct CacheState {
    /// Bumped by every refresh; a populate started under an older
    /// generation must not write its result.
    generation: u64,
    entries: Entries,
}

/// Last known field list per collection.
///
/// The entry map is never mutated in place: writers build a new map and
/// swap it in, so readers see either the old or the new state as a whole.
pub struct SchemaCache {
    driver: Arc<dyn EngineDriver>,
    state: RwLock<CacheState>,
}

impl SchemaCache {
    pub fn new(driver: Arc<dyn EngineDriver>) -> Self {
        Self {
            driver,
            state: RwLock::new(CacheState {
                generation: 0,
                entries: Arc::new(HashMap::new()),
            }),
        }
    }

    /// Fields of a collection, described through the engine on a miss.
    pub async fn schema_fields_for(&self, collection_id: &str) -> Result<Arc<Vec<Field>>> {
        let generation = {
            let state = self.state.read();
            if let Some(fields) = state.entries.get(collection_id) {
                return Ok(fields.clone());
            }
            state.generation
        };

        let fields = Arc::new(self.driver.describe_collection(collection_id).await?);

        let mut state = self.state.write();
        if state.generation == generation {
            let mut entries = HashMap::clone(&state.entries);
            entries.insert(collection_id.to_string(), fields.clone());
            state.entries = Arc::new(entries);
        } else {
            tracing::debug!(
                "[SchemaCache] Refreshed while describing {}, not caching",
                collection_id
            );
        }
        Ok(fields)
    }

    /// Drop every entry; the next read repopulates from the engine.
    pub fn refresh(&self) {
        let mut state = self.state.write();
        state.generation += 1;
        state.entries = Arc::new(HashMap::new());
        tracing::debug!("[SchemaCache] Refreshed (generation {})", state.generation);
    }

    /// Number of refreshes so far.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn is_cached(&self, collection_id: &str) -> bool {
        self.state.read().entries.contains_key(collection_id)
    }
}
