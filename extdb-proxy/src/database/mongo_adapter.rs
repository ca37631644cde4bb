use std::collections::BTreeSet;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection as MongoCollection, Database};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use extdb_core::{EngineDriver, EngineErrorKind, GatewayError, MONGO_TYPES, Result, TypeMapping};
use extdb_rpc::schema::ID_FIELD;
use extdb_rpc::{
    AggregateFunction, Aggregation, Collection, CollectionOperation, ColumnCapabilityRule,
    ConnectionConfig, DataOperation, EngineCapabilities, Field, FieldType, Filter, FindQuery,
    QueryOperator, Row, Sort, SortDirection,
};

/// Collection holding one descriptor document per managed collection.
pub const SCHEMA_COLLECTION: &str = "_extdb_schema";

const COMPARABLE: &[QueryOperator] = &[
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
    QueryOperator::Lt,
    QueryOperator::Lte,
    QueryOperator::Gt,
    QueryOperator::Gte,
    QueryOperator::HasSome,
    QueryOperator::StartsWith,
    QueryOperator::EndsWith,
];

const LONG_TEXT: &[QueryOperator] = &[
    QueryOperator::Eq,
    QueryOperator::Ne,
    QueryOperator::StartsWith,
    QueryOperator::EndsWith,
];

const EQUALITY: &[QueryOperator] = &[QueryOperator::Eq, QueryOperator::Ne];

pub const MONGO_CAPABILITIES: EngineCapabilities = EngineCapabilities {
    collection_operations: &[
        CollectionOperation::Create,
        CollectionOperation::AddColumn,
        CollectionOperation::RemoveColumn,
        CollectionOperation::Drop,
    ],
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
    aggregate_functions: &[
        AggregateFunction::Avg,
        AggregateFunction::Max,
        AggregateFunction::Min,
        AggregateFunction::Sum,
        AggregateFunction::Count,
    ],
    columns: &[
        ColumnCapabilityRule {
            field_type: FieldType::Number,
            sortable: true,
            operators: COMPARABLE,
        },
        ColumnCapabilityRule {
            field_type: FieldType::Datetime,
            sortable: true,
            operators: COMPARABLE,
        },
        ColumnCapabilityRule {
            field_type: FieldType::Text,
            sortable: true,
            operators: TEXT,
        },
        ColumnCapabilityRule {
            field_type: FieldType::LongText,
            sortable: true,
            operators: LONG_TEXT,
        },
        ColumnCapabilityRule {
            field_type: FieldType::Boolean,
            sortable: true,
            operators: EQUALITY,
        },
        ColumnCapabilityRule {
            field_type: FieldType::Object,
            sortable: false,
            operators: EQUALITY,
        },
    ],
};

/// Stored schema of one collection. Fields are kept as the type mapping
/// reports them back, so diffs against a request are stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaDescriptor {
    #[serde(rename = "_id")]
    id: String,
    fields: Vec<Field>,
}

/// Documents sampled to infer the fields of a collection with no descriptor.
const SAMPLE_SIZE: i64 = 100;

pub struct MongoAdapter {
    database: Database,
}

impl MongoAdapter {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(config.connection_url())
            .await
            .map_err(translate_error)?;
        options.max_pool_size = Some(config.max_connections);
        let client = Client::with_options(options).map_err(translate_error)?;
        let database = client.database(&config.database);
        Ok(Self { database })
    }

    pub async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(translate_error)?;
        Ok(())
    }

    fn descriptors(&self) -> MongoCollection<SchemaDescriptor> {
        self.database.collection(SCHEMA_COLLECTION)
    }

    fn documents(&self, collection_id: &str) -> MongoCollection<Document> {
        self.database.collection(collection_id)
    }

    /// Apply `update` to the descriptor of `collection_id`.
    async fn update_descriptor(&self, collection_id: &str, update: Document) -> Result<()> {
        let result = self
            .descriptors()
            .update_one(doc! { "_id": collection_id }, update)
            .await
            .map_err(translate_error)?;
        if result.matched_count == 0 {
            return Err(not_found(collection_id));
        }
        Ok(())
    }
}

#[async_trait]
impl EngineDriver for MongoAdapter {
    fn engine_name(&self) -> &str {
        "MongoDB"
    }

    fn capabilities(&self) -> EngineCapabilities {
        MONGO_CAPABILITIES
    }

    fn type_mapping(&self) -> &'static TypeMapping {
        &MONGO_TYPES
    }

    async fn list(&self) -> Result<Vec<Collection>> {
        let descriptors: Vec<SchemaDescriptor> = self
            .descriptors()
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .map_err(translate_error)?
            .try_collect()
            .await
            .map_err(translate_error)?;
        Ok(descriptors
            .into_iter()
            .map(|d| Collection {
                id: d.id,
                fields: d.fields,
            })
            .collect())
    }

    async fn describe_collection(&self, collection_id: &str) -> Result<Vec<Field>> {
        let descriptor = self
            .descriptors()
            .find_one(doc! { "_id": collection_id })
            .await
            .map_err(translate_error)?;
        if let Some(descriptor) = descriptor {
            return Ok(descriptor.fields);
        }

        // Collections created outside the gateway have no descriptor.
        let names = self
            .database
            .list_collection_names()
            .await
            .map_err(translate_error)?;
        if !names.iter().any(|n| n == collection_id) {
            return Err(not_found(collection_id));
        }
        tracing::info!("[MongoAdapter] No descriptor for {}, sampling documents", collection_id);
        let sample: Vec<Document> = self
            .documents(collection_id)
            .find(doc! {})
            .limit(SAMPLE_SIZE)
            .await
            .map_err(translate_error)?
            .try_collect()
            .await
            .map_err(translate_error)?;
        Ok(infer_fields(&sample))
    }

    async fn create(&self, collection_id: &str, fields: &[Field]) -> Result<()> {
        match self.database.create_collection(collection_id).await {
            Ok(()) => {}
            Err(err) if error_code(&err) == Some(NAMESPACE_EXISTS) => {
                tracing::debug!("[MongoAdapter] {} already exists", collection_id);
            }
            Err(err) => return Err(translate_error(err)),
        }

        let descriptor = SchemaDescriptor {
            id: collection_id.to_string(),
            fields: fields.iter().map(|f| MONGO_TYPES.normalize(f)).collect(),
        };
        let written = self
            .descriptors()
            .insert_one(descriptor)
            .await
            .map(|_| ())
            .map_err(translate_error);
        keep_existing_descriptor(collection_id, written)
    }

    async fn drop_collection(&self, collection_id: &str) -> Result<()> {
        self.documents(collection_id)
            .drop()
            .await
            .map_err(translate_error)?;
        self.descriptors()
            .delete_one(doc! { "_id": collection_id })
            .await
            .map_err(translate_error)?;
        Ok(())
    }

    async fn add_column(&self, collection_id: &str, field: &Field) -> Result<()> {
        MONGO_TYPES.native_type_for(field)?;
        let field = bson::to_bson(&MONGO_TYPES.normalize(field))
            .map_err(|e| GatewayError::engine(EngineErrorKind::Fatal, e.to_string()))?;
        self.update_descriptor(collection_id, doc! { "$push": { "fields": field } })
            .await
    }

    async fn remove_column(&self, collection_id: &str, column_name: &str) -> Result<()> {
        self.update_descriptor(
            collection_id,
            doc! { "$pull": { "fields": { "name": column_name } } },
        )
        .await?;
        self.documents(collection_id)
            .update_many(doc! {}, doc! { "$unset": { column_name: "" } })
            .await
            .map_err(translate_error)?;
        Ok(())
    }

    async fn change_column_type(&self, _collection_id: &str, _field: &Field) -> Result<()> {
        Err(GatewayError::UnsupportedOperation {
            operation: CollectionOperation::ChangeColumnType.to_string(),
            engine: self.engine_name().to_string(),
        })
    }

    async fn find(&self, collection_id: &str, query: &FindQuery) -> Result<Vec<Row>> {
        let documents: Vec<Document> = self
            .documents(collection_id)
            .find(translate_filter(&query.filter)?)
            .sort(translate_sort(&query.sort))
            .skip(query.skip)
            .limit(i64::try_from(query.limit).unwrap_or(i64::MAX))
            .await
            .map_err(translate_error)?
            .try_collect()
            .await
            .map_err(translate_error)?;
        Ok(documents.iter().map(document_to_row).collect())
    }

    async fn count(&self, collection_id: &str, filter: &Filter) -> Result<u64> {
        self.documents(collection_id)
            .count_documents(translate_filter(filter)?)
            .await
            .map_err(translate_error)
    }

    async fn insert(&self, collection_id: &str, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let documents: Vec<Document> = rows.iter().map(row_to_document).collect();
        let result = self
            .documents(collection_id)
            .insert_many(documents)
            .await
            .map_err(translate_error)?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn update(&self, collection_id: &str, rows: &[Row], columns: &[String]) -> Result<u64> {
        let collection = self.documents(collection_id);
        let mut affected = 0;
        for row in rows {
            let id = row.get(ID_FIELD).map(json_to_bson).unwrap_or(Bson::Null);
            let set: Document = columns
                .iter()
                .map(|c| (c.clone(), row.get(c).map(json_to_bson).unwrap_or(Bson::Null)))
                .collect();
            let result = collection
                .update_one(doc! { ID_FIELD: id }, doc! { "$set": set })
                .await
                .map_err(translate_error)?;
            affected += result.matched_count;
        }
        Ok(affected)
    }

    async fn delete(&self, collection_id: &str, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = self
            .documents(collection_id)
            .delete_many(doc! { ID_FIELD: { "$in": ids } })
            .await
            .map_err(translate_error)?;
        Ok(result.deleted_count)
    }

    async fn aggregate(
        &self,
        collection_id: &str,
        filter: &Filter,
        aggregation: &Aggregation,
    ) -> Result<Vec<Row>> {
        let pipeline = aggregation_pipeline(filter, aggregation)?;
        tracing::debug!("[MongoAdapter] Aggregating {}: {:?}", collection_id, pipeline);
        let documents: Vec<Document> = self
            .documents(collection_id)
            .aggregate(pipeline)
            .await
            .map_err(translate_error)?
            .try_collect()
            .await
            .map_err(translate_error)?;
        Ok(documents.iter().map(document_to_row).collect())
    }

    async fn truncate(&self, collection_id: &str) -> Result<()> {
        self.documents(collection_id)
            .delete_many(doc! {})
            .await
            .map_err(translate_error)?;
        Ok(())
    }
}

fn not_found(collection_id: &str) -> GatewayError {
    GatewayError::engine(
        EngineErrorKind::NotFound,
        format!("collection {collection_id} does not exist"),
    )
}

/// A second `create` leaves the stored descriptor untouched.
fn keep_existing_descriptor(collection_id: &str, written: Result<()>) -> Result<()> {
    match written {
        Err(err) if err.engine_kind() == Some(EngineErrorKind::Conflict) => {
            tracing::debug!("[MongoAdapter] Keeping existing descriptor for {}", collection_id);
            Ok(())
        }
        other => other,
    }
}

/// Translate a filter into a query document. An empty filter matches
/// everything and `not` of an empty filter matches nothing.
pub fn translate_filter(filter: &Filter) -> Result<Document> {
    match filter {
        Filter::Empty => Ok(Document::new()),
        Filter::And(children) => combine("$and", children),
        Filter::Or(children) => combine("$or", children),
        Filter::Not(inner) => Ok(doc! { "$nor": [translate_filter(inner)?] }),
        Filter::Condition {
            field,
            operator,
            value,
        } => condition(field, *operator, value),
    }
}

fn combine(operator: &str, children: &[Filter]) -> Result<Document> {
    let mut translated = Vec::new();
    for child in children.iter().filter(|c| !c.is_empty()) {
        translated.push(Bson::Document(translate_filter(child)?));
    }
    // An always-true branch makes the whole disjunction always true.
    if operator == "$or" && children.iter().any(Filter::is_empty) {
        return Ok(Document::new());
    }
    Ok(match translated.len() {
        0 => Document::new(),
        1 => match translated.pop() {
            Some(Bson::Document(only)) => only,
            _ => Document::new(),
        },
        _ => doc! { operator: translated },
    })
}

fn condition(field: &str, operator: QueryOperator, value: &Value) -> Result<Document> {
    let comparison = match operator {
        QueryOperator::Eq => "$eq",
        QueryOperator::Ne => "$ne",
        QueryOperator::Lt => "$lt",
        QueryOperator::Lte => "$lte",
        QueryOperator::Gt => "$gt",
        QueryOperator::Gte => "$gte",
        QueryOperator::StartsWith | QueryOperator::EndsWith => {
            let text = value.as_str().ok_or_else(|| {
                GatewayError::InvalidQuery(format!("{operator} on {field} needs a string value"))
            })?;
            let pattern = if operator == QueryOperator::StartsWith {
                format!("^{}", regex::escape(text))
            } else {
                format!("{}$", regex::escape(text))
            };
            return Ok(doc! { field: { "$regex": pattern } });
        }
        QueryOperator::HasSome => {
            let values = match value.as_array() {
                Some(values) if !values.is_empty() => values,
                _ => {
                    return Err(GatewayError::InvalidQuery(format!(
                        "hasSome on {field} needs a non-empty list"
                    )));
                }
            };
            let values: Vec<Bson> = values.iter().map(json_to_bson).collect();
            return Ok(doc! { field: { "$in": values } });
        }
        QueryOperator::And | QueryOperator::Or | QueryOperator::Not => {
            return Err(GatewayError::InvalidQuery(format!(
                "{operator} can't be used as a condition on {field}"
            )));
        }
    };
    Ok(doc! { field: { comparison: json_to_bson(value) } })
}

pub fn translate_sort(sort: &Sort) -> Document {
    sort.iter()
        .map(|key| {
            let direction = match key.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            };
            (key.field.clone(), Bson::Int32(direction))
        })
        .collect()
}

/// `$match` on the filter, `$group` on the group fields, `$project` to
/// flatten the group key, then `$match` on the having clause.
pub fn aggregation_pipeline(filter: &Filter, aggregation: &Aggregation) -> Result<Vec<Document>> {
    if aggregation.group_by.is_empty() && aggregation.projections.is_empty() {
        return Err(GatewayError::InvalidQuery(
            "aggregation needs a group field or a projection".to_string(),
        ));
    }

    let group_key: Document = aggregation
        .group_by
        .iter()
        .map(|g| (g.clone(), Bson::String(format!("${g}"))))
        .collect();
    let mut group = doc! { "_id": group_key };
    let mut project = doc! { "_id": 0 };
    for g in &aggregation.group_by {
        project.insert(g.clone(), format!("$_id.{g}"));
    }
    for projection in &aggregation.projections {
        let accumulator = match projection.function {
            AggregateFunction::Avg => doc! { "$avg": format!("${}", projection.field) },
            AggregateFunction::Max => doc! { "$max": format!("${}", projection.field) },
            AggregateFunction::Min => doc! { "$min": format!("${}", projection.field) },
            AggregateFunction::Sum => doc! { "$sum": format!("${}", projection.field) },
            AggregateFunction::Count => doc! { "$sum": 1 },
        };
        group.insert(projection.alias.clone(), accumulator);
        project.insert(projection.alias.clone(), 1);
    }

    let mut pipeline = Vec::new();
    if !filter.is_empty() {
        pipeline.push(doc! { "$match": translate_filter(filter)? });
    }
    pipeline.push(doc! { "$group": group });
    pipeline.push(doc! { "$project": project });
    if !aggregation.having.is_empty() {
        pipeline.push(doc! { "$match": translate_filter(&aggregation.having)? });
    }
    Ok(pipeline)
}

const NAMESPACE_NOT_FOUND: i32 = 26;
const NAMESPACE_EXISTS: i32 = 48;

/// Server error codes, see the MongoDB error code reference.
pub fn kind_for_error_code(code: i32) -> EngineErrorKind {
    match code {
        NAMESPACE_NOT_FOUND => EngineErrorKind::NotFound,
        // DuplicateKey, DuplicateKeyValue
        11000 | 11001 | NAMESPACE_EXISTS => EngineErrorKind::Conflict,
        // HostUnreachable, HostNotFound, NetworkTimeout, ShutdownInProgress,
        // PrimarySteppedDown, SocketException, NotWritablePrimary
        6 | 7 | 89 | 91 | 189 | 9001 | 10107 => EngineErrorKind::Transient,
        _ => EngineErrorKind::Fatal,
    }
}

fn error_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(e) => Some(e.code),
        ErrorKind::Write(WriteFailure::WriteError(e)) => Some(e.code),
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|e| e.code),
        _ => None,
    }
}

pub fn translate_error(err: mongodb::error::Error) -> GatewayError {
    let message = err.to_string();
    let kind = match (error_code(&err), err.kind.as_ref()) {
        (Some(code), _) => kind_for_error_code(code),
        (None, ErrorKind::Io(_) | ErrorKind::ServerSelection { .. }) => EngineErrorKind::Transient,
        (None, _) => EngineErrorKind::Fatal,
    };
    // Older servers report duplicate keys only in the message.
    let kind = if kind == EngineErrorKind::Fatal && message.contains("E11000") {
        EngineErrorKind::Conflict
    } else {
        kind
    };
    if kind == EngineErrorKind::Fatal {
        tracing::error!("[MongoAdapter] {}", message);
    }
    GatewayError::engine(kind, message)
}

fn row_to_document(row: &Row) -> Document {
    row.iter()
        .map(|(k, v)| (k.clone(), json_to_bson(v)))
        .collect()
}

fn document_to_row(doc: &Document) -> Row {
    doc.iter().map(|(k, v)| (k.clone(), bson_to_json(v))).collect()
}

/// RFC 3339 strings are stored as BSON dates.
fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => match i32::try_from(i) {
                Ok(small) => Bson::Int32(small),
                Err(_) => Bson::Int64(i),
            },
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => match bson::DateTime::parse_rfc3339_str(s) {
            Ok(dt) => Bson::DateTime(dt),
            Err(_) => Bson::String(s.clone()),
        },
        Value::Array(values) => Bson::Array(values.iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(row_to_document(map)),
    }
}

fn bson_to_json(bson: &Bson) -> Value {
    match bson {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::Decimal128(d) => d
            .to_string()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or(Value::Null),
        Bson::Array(values) => Value::Array(values.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => Value::Object(document_to_row(doc)),
        Bson::Timestamp(ts) => Value::from(ts.time),
        other => Value::String(other.to_string()),
    }
}

/// BSON type names as the type mapping spells them. Used to infer the
/// fields of collections that have no descriptor.
pub fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Double(_) => "double",
        Bson::Decimal128(_) => "decimal",
        Bson::DateTime(_) => "date",
        Bson::Timestamp(_) => "timestamp",
        Bson::String(_) => "string",
        Bson::ObjectId(_) => "objectId",
        Bson::Boolean(_) => "bool",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        _ => "unknown",
    }
}

/// Infer fields from sample documents. A key seen with more than one BSON
/// type is reported as text.
pub fn infer_fields(documents: &[Document]) -> Vec<Field> {
    let mut seen: indexmap::IndexMap<String, BTreeSet<&'static str>> = indexmap::IndexMap::new();
    for doc in documents {
        for (key, value) in doc {
            if !matches!(value, Bson::Null) {
                seen.entry(key.clone()).or_default().insert(bson_type_name(value));
            }
        }
    }
    seen.into_iter()
        .map(|(name, types)| {
            let native = match types.len() {
                1 => types.into_iter().next().unwrap_or("string"),
                _ => "string",
            };
            let canonical = MONGO_TYPES.native_to_canonical(native);
            Field {
                is_primary: name == ID_FIELD,
                name,
                field_type: canonical.field_type,
                subtype: canonical.subtype,
                precision: canonical.precision,
            }
        })
        .collect()
}
