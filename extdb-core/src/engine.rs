use async_trait::async_trait;
use extdb_rpc::{
    Aggregation, Collection, CollectionOperation, ColumnCapabilities, EngineCapabilities, Field,
    FieldType, Filter, FindQuery, Row,
};

use crate::error::Result;
use crate::type_translator::TypeMapping;

/// Abstraction over one storage backend.
///
/// Adapters translate native driver errors into [`crate::GatewayError`]
/// before returning; the core never looks at native error codes. Schema
/// methods receive canonical fields and render them through
/// [`EngineDriver::type_mapping`].
#[async_trait]
pub trait EngineDriver: Send + Sync {
    /// Display name used in error messages, e.g. "MySQL".
    fn engine_name(&self) -> &str;

    /// Static capability declaration of this engine.
    fn capabilities(&self) -> EngineCapabilities;

    fn type_mapping(&self) -> &'static TypeMapping;

    fn supported_operations(&self) -> &'static [CollectionOperation] {
        self.capabilities().collection_operations
    }

    fn column_capabilities_for(&self, field_type: FieldType) -> ColumnCapabilities {
        self.capabilities().column_capabilities_for(field_type)
    }

    // ── Schema ───────────────────────────────────────────────────

    /// Every collection in the catalog with its fields.
    async fn list(&self) -> Result<Vec<Collection>>;

    /// Live fields of one collection, read from the engine catalog.
    async fn describe_collection(&self, collection_id: &str) -> Result<Vec<Field>>;

    /// Create a collection. `fields` already include the system fields.
    async fn create(&self, collection_id: &str, fields: &[Field]) -> Result<()>;

    async fn drop_collection(&self, collection_id: &str) -> Result<()>;

    async fn add_column(&self, collection_id: &str, field: &Field) -> Result<()>;

    async fn remove_column(&self, collection_id: &str, column_name: &str) -> Result<()>;

    async fn change_column_type(&self, collection_id: &str, field: &Field) -> Result<()>;

    // ── Data ─────────────────────────────────────────────────────

    async fn find(&self, collection_id: &str, query: &FindQuery) -> Result<Vec<Row>>;

    async fn count(&self, collection_id: &str, filter: &Filter) -> Result<u64>;

    /// Insert rows; returns the affected count.
    async fn insert(&self, collection_id: &str, rows: &[Row]) -> Result<u64>;

    /// Update rows by `_id`, setting only `columns`. Returns the affected count.
    async fn update(&self, collection_id: &str, rows: &[Row], columns: &[String]) -> Result<u64>;

    async fn delete(&self, collection_id: &str, ids: &[String]) -> Result<u64>;

    async fn aggregate(
        &self,
        collection_id: &str,
        filter: &Filter,
        aggregation: &Aggregation,
    ) -> Result<Vec<Row>>;

    async fn truncate(&self, collection_id: &str) -> Result<()>;
}
