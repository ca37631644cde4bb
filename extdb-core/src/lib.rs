pub mod capability_gate;
pub mod data_service;
pub mod engine;
pub mod error;
pub mod filter_translator;
pub mod gateway;
pub mod reconciler;
pub mod schema_cache;
pub mod schema_service;
pub mod type_translator;

pub use capability_gate::CapabilityGate;
pub use data_service::DataService;
pub use engine::EngineDriver;
pub use error::{EngineErrorKind, GatewayError, Result};
pub use filter_translator::{AggregationFragment, FilterTranslator, SqlDialect, SqlFragment};
pub use gateway::Gateway;
pub use reconciler::{SchemaDiff, reconcile, reconcile_with};
pub use schema_cache::SchemaCache;
pub use schema_service::SchemaService;
pub use type_translator::{MONGO_TYPES, MYSQL_TYPES, TypeMapping};
