use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::schema::FieldType;

/// Structural operations an engine may support on a collection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum CollectionOperation {
    Create,
    AddColumn,
    RemoveColumn,
    ChangeColumnType,
    Drop,
}

/// Row-level operations an engine may support.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum DataOperation {
    Query,
    Count,
    Aggregate,
    Insert,
    Update,
    Remove,
    Truncate,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum QueryOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    StartsWith,
    EndsWith,
    HasSome,
    And,
    Or,
    Not,
}

impl QueryOperator {
    pub const LOGICAL: [QueryOperator; 3] = [QueryOperator::And, QueryOperator::Or, QueryOperator::Not];

    pub fn is_logical(self) -> bool {
        Self::LOGICAL.contains(&self)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum AggregateFunction {
    Avg,
    Max,
    Min,
    Sum,
    Count,
}

/// What callers may do with a column of a given type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnCapabilities {
    pub sortable: bool,
    pub query_operators: Vec<QueryOperator>,
}

impl ColumnCapabilities {
    pub fn allows(&self, operator: QueryOperator) -> bool {
        self.query_operators.contains(&operator)
    }
}

/// Static per-type row of an engine's column capability table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ColumnCapabilityRule {
    pub field_type: FieldType,
    pub sortable: bool,
    pub operators: &'static [QueryOperator],
}

/// Everything an engine declares about itself, fixed at construction.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineCapabilities {
    pub collection_operations: &'static [CollectionOperation],
    pub data_operations: &'static [DataOperation],
    pub field_types: &'static [FieldType],
    pub aggregate_functions: &'static [AggregateFunction],
    pub columns: &'static [ColumnCapabilityRule],
}

impl EngineCapabilities {
    pub fn supports_collection_operation(&self, op: CollectionOperation) -> bool {
        self.collection_operations.contains(&op)
    }

    pub fn supports_data_operation(&self, op: DataOperation) -> bool {
        self.data_operations.contains(&op)
    }

    pub fn supports_field_type(&self, field_type: FieldType) -> bool {
        self.field_types.contains(&field_type)
    }

    pub fn supports_aggregate(&self, function: AggregateFunction) -> bool {
        self.aggregate_functions.contains(&function)
    }

    /// Column capabilities for a type. Logical operators are always
    /// included; a type missing from the table gets nothing else.
    pub fn column_capabilities_for(&self, field_type: FieldType) -> ColumnCapabilities {
        let rule = self.columns.iter().find(|r| r.field_type == field_type);
        let mut query_operators: Vec<QueryOperator> =
            rule.map(|r| r.operators.to_vec()).unwrap_or_default();
        query_operators.extend(QueryOperator::LOGICAL);
        ColumnCapabilities {
            sortable: rule.is_some_and(|r| r.sortable),
            query_operators,
        }
    }
}
