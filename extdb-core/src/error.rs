use extdb_rpc::{AggregateFunction, FieldType};
use strum_macros::Display;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway-level classification of a native engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EngineErrorKind {
    NotFound,
    Conflict,
    /// Worth retrying by whoever owns the connection pool
    Transient,
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{engine} doesn't support {operation} operation")]
    UnsupportedOperation { operation: String, engine: String },

    #[error("unsupported type combination: {field_type}_{subtype}")]
    UnsupportedTypeCombination { field_type: String, subtype: String },

    #[error("{engine} doesn't support field type {field_type}")]
    UnsupportedFieldType { engine: String, field_type: FieldType },

    #[error("operator {operator} is not allowed on field {field}")]
    UnsupportedOperator { field: String, operator: String },

    #[error("{engine} doesn't support aggregate function {function}")]
    UnsupportedAggregation {
        engine: String,
        function: AggregateFunction,
    },

    #[error("cannot {operation} system field {field}")]
    SystemFieldViolation { field: String, operation: String },

    #[error("field {field} is declared more than once in collection {collection}")]
    DuplicateField { collection: String, field: String },

    #[error("field {field} does not exist in collection {collection}")]
    FieldDoesNotExist { collection: String, field: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("{kind}: {message}")]
    Engine {
        kind: EngineErrorKind,
        collection: Option<String>,
        message: String,
    },
}

impl GatewayError {
    pub fn engine(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        GatewayError::Engine {
            kind,
            collection: None,
            message: message.into(),
        }
    }

    /// Attach the collection id to an engine error that lacks one.
    pub fn in_collection(self, collection_id: &str) -> Self {
        match self {
            GatewayError::Engine {
                kind,
                collection: None,
                message,
            } => GatewayError::Engine {
                kind,
                collection: Some(collection_id.to_string()),
                message,
            },
            other => other,
        }
    }

    pub fn engine_kind(&self) -> Option<EngineErrorKind> {
        match self {
            GatewayError::Engine { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.engine_kind() == Some(EngineErrorKind::Transient)
    }
}
