use std::sync::Arc;

use extdb_rpc::schema::{ID_FIELD, is_system_field};
use extdb_rpc::{Aggregation, DataOperation, Filter, FindQuery, Row};

use crate::capability_gate::CapabilityGate;
use crate::engine::EngineDriver;
use crate::error::{GatewayError, Result};
use crate::schema_cache::SchemaCache;

/// Row-level operations. Filters and sorts are checked against the cached
/// schema and the engine's column capabilities before the engine sees them.
pub struct DataService {
    driver: Arc<dyn EngineDriver>,
    cache: Arc<SchemaCache>,
    gate: CapabilityGate,
}

impl DataService {
    pub fn new(driver: Arc<dyn EngineDriver>, cache: Arc<SchemaCache>) -> Self {
        let gate = CapabilityGate::for_driver(driver.as_ref());
        Self {
            driver,
            cache,
            gate,
        }
    }

    pub async fn find(&self, collection_id: &str, query: &FindQuery) -> Result<Vec<Row>> {
        self.gate.require_data(DataOperation::Query)?;
        let fields = self.cache.schema_fields_for(collection_id).await?;
        self.gate.validate_filter(collection_id, &query.filter, &fields)?;
        self.gate.validate_sort(collection_id, &query.sort, &fields)?;
        // Some engines read a zero limit as unlimited.
        if query.limit == 0 {
            return Ok(Vec::new());
        }
        self.driver
            .find(collection_id, query)
            .await
            .map_err(|e| e.in_collection(collection_id))
    }

    pub async fn count(&self, collection_id: &str, filter: &Filter) -> Result<u64> {
        self.gate.require_data(DataOperation::Count)?;
        let fields = self.cache.schema_fields_for(collection_id).await?;
        self.gate.validate_filter(collection_id, filter, &fields)?;
        self.driver
            .count(collection_id, filter)
            .await
            .map_err(|e| e.in_collection(collection_id))
    }

    pub async fn insert(&self, collection_id: &str, rows: &[Row]) -> Result<u64> {
        self.gate.require_data(DataOperation::Insert)?;
        if rows.is_empty() {
            return Ok(0);
        }
        self.driver
            .insert(collection_id, rows)
            .await
            .map_err(|e| e.in_collection(collection_id))
    }

    /// Update rows by `_id`. The columns set are the first row's keys
    /// minus the system fields; when none remain this is a no-op that
    /// returns 0 without reaching the engine.
    pub async fn update(&self, collection_id: &str, rows: &[Row]) -> Result<u64> {
        self.gate.require_data(DataOperation::Update)?;
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        if let Some(position) = rows.iter().position(|row| !has_identity(row)) {
            return Err(GatewayError::InvalidQuery(format!(
                "row {position} of update on {collection_id} has no {ID_FIELD}"
            )));
        }

        let columns = updatable_columns(first);
        if columns.is_empty() {
            tracing::debug!("[DataService] Nothing to update in {}", collection_id);
            return Ok(0);
        }
        self.driver
            .update(collection_id, rows, &columns)
            .await
            .map_err(|e| e.in_collection(collection_id))
    }

    pub async fn delete(&self, collection_id: &str, ids: &[String]) -> Result<u64> {
        self.gate.require_data(DataOperation::Remove)?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.driver
            .delete(collection_id, ids)
            .await
            .map_err(|e| e.in_collection(collection_id))
    }

    pub async fn aggregate(
        &self,
        collection_id: &str,
        filter: &Filter,
        aggregation: &Aggregation,
    ) -> Result<Vec<Row>> {
        self.gate.require_data(DataOperation::Aggregate)?;
        let fields = self.cache.schema_fields_for(collection_id).await?;
        self.gate.validate_filter(collection_id, filter, &fields)?;
        self.gate.validate_aggregation(collection_id, aggregation, &fields)?;
        self.driver
            .aggregate(collection_id, filter, aggregation)
            .await
            .map_err(|e| e.in_collection(collection_id))
    }

    /// Remove every row, keeping the schema.
    pub async fn truncate(&self, collection_id: &str) -> Result<()> {
        self.gate.require_data(DataOperation::Truncate)?;
        self.driver
            .truncate(collection_id)
            .await
            .map_err(|e| e.in_collection(collection_id))
    }
}

fn has_identity(row: &Row) -> bool {
    matches!(row.get(ID_FIELD), Some(v) if !v.is_null())
}

/// Columns an update may set: the row's keys without system fields.
pub fn updatable_columns(row: &Row) -> Vec<String> {
    row.keys()
        .filter(|key| !is_system_field(key))
        .cloned()
        .collect()
}
