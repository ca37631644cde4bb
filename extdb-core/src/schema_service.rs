use std::sync::Arc;

use extdb_rpc::schema::system_fields;
use extdb_rpc::{
    Collection, CollectionCapabilitiesResponse, CollectionOperation, CollectionResponse,
    DeleteCollectionResponse, Field,
};
use futures_util::future::{join_all, try_join_all};
use indexmap::IndexSet;

use crate::capability_gate::CapabilityGate;
use crate::engine::EngineDriver;
use crate::error::{GatewayError, Result};
use crate::reconciler::{SchemaDiff, reconcile_with};
use crate::schema_cache::SchemaCache;

/// Collection-level operations: list, create, update, delete.
///
/// Every mutating call runs gate -> diff -> apply -> refresh. The cache is
/// only refreshed when every engine call of the request succeeded.
pub struct SchemaService {
    driver: Arc<dyn EngineDriver>,
    cache: Arc<SchemaCache>,
    gate: CapabilityGate,
}

impl SchemaService {
    pub fn new(driver: Arc<dyn EngineDriver>, cache: Arc<SchemaCache>) -> Self {
        let gate = CapabilityGate::for_driver(driver.as_ref());
        Self {
            driver,
            cache,
            gate,
        }
    }

    /// Empty `collection_ids` lists the whole catalog; otherwise each id is
    /// read through the schema cache.
    pub async fn list(&self, collection_ids: &[String]) -> Result<Vec<CollectionResponse>> {
        let collections: Vec<Collection> = if collection_ids.is_empty() {
            self.driver.list().await?
        } else {
            try_join_all(collection_ids.iter().map(|id| async move {
                let fields = self.cache.schema_fields_for(id).await?;
                Ok::<_, GatewayError>(Collection::new(id, fields.as_ref().clone()))
            }))
            .await?
        };

        let capabilities = CollectionCapabilitiesResponse::from(self.gate.capabilities());
        Ok(collections
            .into_iter()
            .map(|collection| CollectionResponse {
                fields: self.gate.annotate(&collection.fields),
                id: collection.id,
                capabilities: capabilities.clone(),
            })
            .collect())
    }

    /// Create a collection. System fields are always added.
    pub async fn create(&self, collection: Collection) -> Result<Collection> {
        self.gate.require(CollectionOperation::Create)?;
        let requested = self.requested_columns(&collection, "create")?;
        self.validate_types(&requested)?;

        let mut fields = system_fields();
        fields.extend(requested);

        tracing::info!(
            "[SchemaService] Creating {} with {} fields",
            collection.id,
            fields.len()
        );
        self.driver.create(&collection.id, &fields).await?;
        self.cache.refresh();
        Ok(collection)
    }

    /// Reconcile the live schema of a collection with the requested one.
    pub async fn update(&self, collection: Collection) -> Result<Collection> {
        self.gate.require(CollectionOperation::Create)?;
        let requested = self.requested_columns(&collection, "update")?;

        let live = self.driver.describe_collection(&collection.id).await?;
        let mapping = self.driver.type_mapping();
        let diff = reconcile_with(&live, &requested, |f| mapping.normalize(f));
        tracing::debug!("[SchemaService] Diff for {}: {:?}", collection.id, diff);

        if diff.is_empty() {
            return Ok(collection);
        }

        if !diff.columns_to_add.is_empty() {
            self.gate.require(CollectionOperation::AddColumn)?;
        }
        if !diff.columns_to_remove.is_empty() {
            self.gate.require(CollectionOperation::RemoveColumn)?;
        }
        if !diff.columns_to_change_type.is_empty() {
            self.gate.require(CollectionOperation::ChangeColumnType)?;
        }
        self.validate_types(diff.columns_to_add.iter().chain(&diff.columns_to_change_type))?;

        self.apply(&collection.id, &diff).await?;
        self.cache.refresh();
        Ok(collection)
    }

    /// Drop a collection, returning the fields it had.
    pub async fn delete(&self, collection_id: &str) -> Result<DeleteCollectionResponse> {
        self.gate.require(CollectionOperation::Drop)?;
        let fields = self.driver.describe_collection(collection_id).await?;
        self.driver.drop_collection(collection_id).await?;
        self.cache.refresh();
        tracing::info!("[SchemaService] Dropped {}", collection_id);
        Ok(DeleteCollectionResponse {
            id: collection_id.to_string(),
            fields,
        })
    }

    /// Adds, then removes, then retypes. Columns of one category are
    /// independent and go out concurrently; each category waits for all
    /// of its calls before the next starts.
    async fn apply(&self, collection_id: &str, diff: &SchemaDiff) -> Result<()> {
        let mut applied = 0;

        let adds = join_all(
            diff.columns_to_add
                .iter()
                .map(|field| self.driver.add_column(collection_id, field)),
        )
        .await;
        applied += self.settle(collection_id, "addColumn", applied, adds)?;

        let removes = join_all(
            diff.columns_to_remove
                .iter()
                .map(|name| self.driver.remove_column(collection_id, name)),
        )
        .await;
        applied += self.settle(collection_id, "removeColumn", applied, removes)?;

        let changes = join_all(
            diff.columns_to_change_type
                .iter()
                .map(|field| self.driver.change_column_type(collection_id, field)),
        )
        .await;
        self.settle(collection_id, "changeColumnType", applied, changes)?;
        Ok(())
    }

    /// Count the successes of one batch, or surface its first failure.
    fn settle(
        &self,
        collection_id: &str,
        category: &str,
        applied_before: usize,
        results: Vec<Result<()>>,
    ) -> Result<usize> {
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        match results.into_iter().find_map(|r| r.err()) {
            None => Ok(succeeded),
            Some(err) => {
                tracing::warn!(
                    stale_cache_risk = true,
                    "[SchemaService] {} failed on {} after {} applied changes, schema cache not refreshed: {}",
                    category,
                    collection_id,
                    applied_before + succeeded,
                    err
                );
                Err(err.in_collection(collection_id))
            }
        }
    }

    /// Non-system fields of a request. Duplicate names are rejected, and a
    /// system field may only appear with its canonical type.
    fn requested_columns(&self, collection: &Collection, operation: &str) -> Result<Vec<Field>> {
        let mut seen = IndexSet::new();
        for field in &collection.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(GatewayError::DuplicateField {
                    collection: collection.id.clone(),
                    field: field.name.clone(),
                });
            }
        }

        let system = system_fields();
        let mut requested = Vec::new();
        for field in &collection.fields {
            match system.iter().find(|s| s.name == field.name) {
                Some(canonical) => {
                    let subtype_ok = field.subtype.is_none() || field.subtype == canonical.subtype;
                    if field.field_type != canonical.field_type || !subtype_ok {
                        return Err(GatewayError::SystemFieldViolation {
                            field: field.name.clone(),
                            operation: operation.to_string(),
                        });
                    }
                }
                None => requested.push(field.clone()),
            }
        }
        Ok(requested)
    }

    /// Fail before touching the engine if a field can't be rendered.
    fn validate_types<'a>(&self, fields: impl IntoIterator<Item = &'a Field> + Clone) -> Result<()> {
        self.gate.require_field_types(fields.clone())?;
        let mapping = self.driver.type_mapping();
        for field in fields {
            mapping.native_type_for(field)?;
        }
        Ok(())
    }
}
