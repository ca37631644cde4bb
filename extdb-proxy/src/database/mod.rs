//! Engine adapters. Each adapter implements [`extdb_core::EngineDriver`]
//! over one native driver and translates its errors into
//! [`extdb_core::GatewayError`] before they leave the adapter.

pub mod connection_manager;
pub mod mongo_adapter;
pub mod mysql_adapter;

pub use connection_manager::ConnectionManager;
pub use mongo_adapter::MongoAdapter;
pub use mysql_adapter::MySqlAdapter;
