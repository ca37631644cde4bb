pub mod capability;
pub mod db;
pub mod query;
pub mod schema;

pub use capability::{
    AggregateFunction, CollectionOperation, ColumnCapabilities, ColumnCapabilityRule,
    DataOperation, EngineCapabilities, QueryOperator,
};
pub use db::{ConnectionConfig, EngineType};
pub use query::{
    Aggregation, Filter, FindQuery, Projection, Row, Sort, SortDirection, SortField,
};
pub use schema::{
    Collection, CollectionCapabilitiesResponse, CollectionResponse,
    DeleteCollectionResponse, Field, FieldResponse, FieldSubtype, FieldType,
};
