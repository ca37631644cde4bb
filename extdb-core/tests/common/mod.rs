#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use extdb_core::type_translator::MYSQL_TYPES;
use extdb_core::{EngineDriver, EngineErrorKind, GatewayError, Result, TypeMapping};
use extdb_rpc::{
    AggregateFunction, Aggregation, Collection, CollectionOperation, ColumnCapabilityRule,
    DataOperation, EngineCapabilities, Field, FieldSubtype, FieldType, Filter, FindQuery,
    QueryOperator, Row,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Value, json};

pub const ALL_COLLECTION_OPERATIONS: &[CollectionOperation] = &[
    CollectionOperation::Create,
    CollectionOperation::AddColumn,
    CollectionOperation::RemoveColumn,
    CollectionOperation::ChangeColumnType,
    CollectionOperation::Drop,
];

pub const NO_RETYPE: &[CollectionOperation] = &[
    CollectionOperation::Create,
    CollectionOperation::AddColumn,
    CollectionOperation::RemoveColumn,
    CollectionOperation::Drop,
];

pub const NO_ADD: &[CollectionOperation] = &[
    CollectionOperation::Create,
    CollectionOperation::RemoveColumn,
    CollectionOperation::ChangeColumnType,
    CollectionOperation::Drop,
];

pub const READ_ONLY: &[CollectionOperation] = &[];

const COMPARE: &[QueryOperator] = &[
    QueryOperator::Eq,
    QueryOperator::Ne,
    QueryOperator::Lt,
    QueryOperator::Lte,
    QueryOperator::Gt,
    QueryOperator::Gte,
    QueryOperator::HasSome,
];

const TEXT: &[QueryOperator] = &[
    QueryOperator::Eq,
    QueryOperator::Ne,
    QueryOperator::StartsWith,
    QueryOperator::EndsWith,
    QueryOperator::HasSome,
];

pub fn capabilities(operations: &'static [CollectionOperation]) -> EngineCapabilities {
    EngineCapabilities {
        collection_operations: operations,
        data_operations: &[
            DataOperation::Query,
            DataOperation::Count,
            DataOperation::Aggregate,
            DataOperation::Insert,
            DataOperation::Update,
            DataOperation::Remove,
            DataOperation::Truncate,
        ],
        field_types: &[
            FieldType::Number,
            FieldType::Text,
            FieldType::LongText,
            FieldType::Datetime,
            FieldType::Boolean,
            FieldType::Object,
        ],
        aggregate_functions: &[AggregateFunction::Sum, AggregateFunction::Count],
        columns: &[
            ColumnCapabilityRule {
                field_type: FieldType::Number,
                sortable: true,
                operators: COMPARE,
            },
            ColumnCapabilityRule {
                field_type: FieldType::Datetime,
                sortable: true,
                operators: COMPARE,
            },
            ColumnCapabilityRule {
                field_type: FieldType::Text,
                sortable: true,
                operators: TEXT,
            },
        ],
    }
}

#[derive(Default)]
struct Table {
    fields: Vec<Field>,
    rows: Vec<Row>,
}

/// In-memory engine that records every call it receives.
pub struct MemoryDriver {
    capabilities: EngineCapabilities,
    tables: Mutex<IndexMap<String, Table>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, EngineErrorKind>>,
}

impl MemoryDriver {
    pub fn new(operations: &'static [CollectionOperation]) -> Self {
        Self {
            capabilities: capabilities(operations),
            tables: Mutex::new(IndexMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn full() -> Self {
        Self::new(ALL_COLLECTION_OPERATIONS)
    }

    /// Seed a table directly, bypassing the call log.
    pub fn with_table(self, id: &str, fields: Vec<Field>) -> Self {
        let mut all = extdb_rpc::schema::system_fields();
        all.extend(fields);
        let fields = all.iter().map(|f| MYSQL_TYPES.normalize(f)).collect();
        self.tables.lock().insert(id.to_string(), Table { fields, rows: Vec::new() });
        self
    }

    pub fn seed_rows(&self, id: &str, rows: Vec<Row>) {
        if let Some(table) = self.tables.lock().get_mut(id) {
            table.rows.extend(rows);
        }
    }

    /// Make every call whose log entry starts with `prefix` fail.
    pub fn fail_on(&self, prefix: &str, kind: EngineErrorKind) {
        self.failures.lock().insert(prefix.to_string(), kind);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Calls other than catalog reads.
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("describe:") && !c.starts_with("list"))
            .collect()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn live_fields(&self, id: &str) -> Vec<Field> {
        self.tables
            .lock()
            .get(id)
            .map(|t| t.fields.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: String) -> Result<()> {
        let failure = self
            .failures
            .lock()
            .iter()
            .find(|(prefix, _)| call.starts_with(prefix.as_str()))
            .map(|(_, kind)| *kind);
        self.calls.lock().push(call.clone());
        match failure {
            Some(kind) => Err(GatewayError::engine(kind, format!("injected failure on {call}"))),
            None => Ok(()),
        }
    }

    fn with_table_mut<T>(&self, id: &str, f: impl FnOnce(&mut Table) -> T) -> Result<T> {
        let mut tables = self.tables.lock();
        let table = tables.get_mut(id).ok_or_else(|| {
            GatewayError::engine(EngineErrorKind::NotFound, format!("collection {id} does not exist"))
        })?;
        Ok(f(table))
    }
}

fn matches(filter: &Filter, row: &Row) -> bool {
    match filter {
        Filter::Empty => true,
        Filter::And(children) => children.iter().all(|c| matches(c, row)),
        Filter::Or(children) => children.is_empty() || children.iter().any(|c| matches(c, row)),
        Filter::Not(inner) => !matches(inner, row),
        Filter::Condition {
            field,
            operator,
            value,
        } => {
            let current = row.get(field).unwrap_or(&Value::Null);
            match operator {
                QueryOperator::Eq => current == value,
                QueryOperator::Ne => current != value,
                QueryOperator::Gt => current.as_f64() > value.as_f64(),
                QueryOperator::Lt => current.as_f64() < value.as_f64(),
                _ => true,
            }
        }
    }
}

#[async_trait]
impl EngineDriver for MemoryDriver {
    fn engine_name(&self) -> &str {
        "Memory"
    }

    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    fn type_mapping(&self) -> &'static TypeMapping {
        &MYSQL_TYPES
    }

    async fn list(&self) -> Result<Vec<Collection>> {
        self.record("list".to_string())?;
        Ok(self
            .tables
            .lock()
            .iter()
            .map(|(id, table)| Collection::new(id, table.fields.clone()))
            .collect())
    }

    async fn describe_collection(&self, collection_id: &str) -> Result<Vec<Field>> {
        self.record(format!("describe:{collection_id}"))?;
        self.with_table_mut(collection_id, |t| t.fields.clone())
    }

    async fn create(&self, collection_id: &str, fields: &[Field]) -> Result<()> {
        self.record(format!("create:{collection_id}"))?;
        let fields = fields.iter().map(|f| MYSQL_TYPES.normalize(f)).collect();
        self.tables
            .lock()
            .entry(collection_id.to_string())
            .or_insert(Table {
                fields,
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn drop_collection(&self, collection_id: &str) -> Result<()> {
        self.record(format!("drop:{collection_id}"))?;
        self.tables.lock().shift_remove(collection_id);
        Ok(())
    }

    async fn add_column(&self, collection_id: &str, field: &Field) -> Result<()> {
        self.record(format!("add_column:{collection_id}.{}", field.name))?;
        let field = MYSQL_TYPES.normalize(field);
        self.with_table_mut(collection_id, |t| t.fields.push(field))
    }

    async fn remove_column(&self, collection_id: &str, column_name: &str) -> Result<()> {
        self.record(format!("remove_column:{collection_id}.{column_name}"))?;
        self.with_table_mut(collection_id, |t| t.fields.retain(|f| f.name != column_name))
    }

    async fn change_column_type(&self, collection_id: &str, field: &Field) -> Result<()> {
        self.record(format!("change_column_type:{collection_id}.{}", field.name))?;
        let field = MYSQL_TYPES.normalize(field);
        self.with_table_mut(collection_id, |t| {
            if let Some(existing) = t.fields.iter_mut().find(|f| f.name == field.name) {
                *existing = field;
            }
        })
    }

    async fn find(&self, collection_id: &str, query: &FindQuery) -> Result<Vec<Row>> {
        self.record(format!("find:{collection_id}"))?;
        self.with_table_mut(collection_id, |t| {
            t.rows
                .iter()
                .filter(|r| matches(&query.filter, r))
                .skip(query.skip as usize)
                .take(query.limit as usize)
                .cloned()
                .collect()
        })
    }

    async fn count(&self, collection_id: &str, filter: &Filter) -> Result<u64> {
        self.record(format!("count:{collection_id}"))?;
        self.with_table_mut(collection_id, |t| {
            t.rows.iter().filter(|r| matches(filter, r)).count() as u64
        })
    }

    async fn insert(&self, collection_id: &str, rows: &[Row]) -> Result<u64> {
        self.record(format!("insert:{collection_id}"))?;
        self.with_table_mut(collection_id, |t| {
            for row in rows {
                if t.rows.iter().any(|r| r.get("_id") == row.get("_id")) {
                    return Err(GatewayError::engine(
                        EngineErrorKind::Conflict,
                        "item already exists",
                    ));
                }
            }
            t.rows.extend(rows.iter().cloned());
            Ok(rows.len() as u64)
        })?
    }

    async fn update(&self, collection_id: &str, rows: &[Row], columns: &[String]) -> Result<u64> {
        self.record(format!("update:{collection_id}"))?;
        self.with_table_mut(collection_id, |t| {
            let mut affected = 0;
            for row in rows {
                if let Some(existing) = t.rows.iter_mut().find(|r| r.get("_id") == row.get("_id")) {
                    for column in columns {
                        existing.insert(column.clone(), row.get(column).cloned().unwrap_or(Value::Null));
                    }
                    affected += 1;
                }
            }
            affected
        })
    }

    async fn delete(&self, collection_id: &str, ids: &[String]) -> Result<u64> {
        self.record(format!("delete:{collection_id}"))?;
        self.with_table_mut(collection_id, |t| {
            let before = t.rows.len();
            t.rows
                .retain(|r| !ids.iter().any(|id| r.get("_id") == Some(&json!(id))));
            (before - t.rows.len()) as u64
        })
    }

    async fn aggregate(
        &self,
        collection_id: &str,
        _filter: &Filter,
        _aggregation: &Aggregation,
    ) -> Result<Vec<Row>> {
        self.record(format!("aggregate:{collection_id}"))?;
        Ok(Vec::new())
    }

    async fn truncate(&self, collection_id: &str) -> Result<()> {
        self.record(format!("truncate:{collection_id}"))?;
        self.with_table_mut(collection_id, |t| t.rows.clear())
    }
}

pub fn int(name: &str) -> Field {
    Field::new(name, FieldType::Number).with_subtype(FieldSubtype::Int)
}

pub fn float(name: &str) -> Field {
    Field::new(name, FieldType::Number).with_subtype(FieldSubtype::Float)
}

pub fn text(name: &str) -> Field {
    Field::new(name, FieldType::Text).with_subtype(FieldSubtype::String)
}

pub fn datetime(name: &str) -> Field {
    Field::new(name, FieldType::Datetime).with_subtype(FieldSubtype::Datetime)
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

pub fn names(fields: &[Field]) -> Vec<&str> {
    fields.iter().map(|f| f.name.as_str()).collect()
}
