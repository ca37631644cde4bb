use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use extdb_core::{EngineDriver, EngineErrorKind, FilterTranslator, GatewayError, MYSQL_TYPES, Result, TypeMapping};
use extdb_rpc::schema::ID_FIELD;
use extdb_rpc::{
    AggregateFunction, Aggregation, Collection, CollectionOperation, ColumnCapabilityRule,
    DataOperation, EngineCapabilities, Field, FieldType, Filter, FindQuery, QueryOperator, Row,
};

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

pub const MYSQL_CAPABILITIES: EngineCapabilities = EngineCapabilities {
    collection_operations: &[
        CollectionOperation::Create,
        CollectionOperation::AddColumn,
        CollectionOperation::RemoveColumn,
        CollectionOperation::ChangeColumnType,
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
            sortable: false,
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
            operators: &[],
        },
    ],
};

/// `information_schema` columns are VARBINARY on some server versions;
/// the casts keep them decodable as strings.
const CATALOG_QUERY: &str = r#"
    SELECT
        CAST(TABLE_NAME AS CHAR)  AS table_name,
        CAST(COLUMN_NAME AS CHAR) AS column_name,
        CAST(COLUMN_TYPE AS CHAR) AS column_type,
        CAST(COLUMN_KEY AS CHAR)  AS column_key
    FROM information_schema.columns
    WHERE TABLE_SCHEMA = DATABASE()
"#;

const CATALOG_ORDER: &str = "ORDER BY TABLE_NAME, ORDINAL_POSITION";

static NULL: Value = Value::Null;

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

pub struct MySqlAdapter {
    pool: MySqlPool,
    translator: FilterTranslator,
}

impl MySqlAdapter {
    pub async fn connect(config: &extdb_rpc::ConnectionConfig) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_url())
            .await
            .map_err(translate_error)?;
        Ok(Self::with_pool(pool))
    }

    pub fn with_pool(pool: MySqlPool) -> Self {
        Self {
            pool,
            translator: FilterTranslator::mysql(),
        }
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(translate_error)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn table(&self, collection_id: &str) -> String {
        self.translator.escape_id(collection_id)
    }

    fn column_definition(&self, field: &Field) -> Result<String> {
        Ok(format!(
            "{} {}",
            self.translator.escape_id(&field.name),
            MYSQL_TYPES.native_type_for(field)?
        ))
    }

    async fn catalog(&self, collection_id: Option<&str>) -> Result<IndexMap<String, Vec<Field>>> {
        let rows = match collection_id {
            Some(id) => {
                let sql = format!("{CATALOG_QUERY} AND TABLE_NAME = ? {CATALOG_ORDER}");
                sqlx::query(&sql).bind(id).fetch_all(&self.pool).await
            }
            None => {
                let sql = format!("{CATALOG_QUERY} {CATALOG_ORDER}");
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(translate_error)?;

        let mut tables: IndexMap<String, Vec<Field>> = IndexMap::new();
        for row in &rows {
            let table: String = row.try_get("table_name").map_err(translate_error)?;
            let name: String = row.try_get("column_name").map_err(translate_error)?;
            let column_type: String = row.try_get("column_type").map_err(translate_error)?;
            let key: String = row.try_get("column_key").unwrap_or_default();

            let canonical = MYSQL_TYPES.native_to_canonical(&column_type);
            tables.entry(table).or_default().push(Field {
                name,
                field_type: canonical.field_type,
                subtype: canonical.subtype,
                precision: canonical.precision,
                is_primary: key == "PRI",
            });
        }
        Ok(tables)
    }

    /// Names of the `DATETIME` columns, looked up only when some value
    /// could need rewriting.
    async fn datetime_columns<'v>(
        &self,
        collection_id: &str,
        values: impl IntoIterator<Item = &'v Value>,
    ) -> Result<HashSet<String>> {
        if !values.into_iter().any(holds_timestamp) {
            return Ok(HashSet::new());
        }
        Ok(self
            .describe_collection(collection_id)
            .await?
            .into_iter()
            .filter(|f| f.field_type == FieldType::Datetime)
            .map(|f| f.name)
            .collect())
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        tracing::debug!("[MySqlAdapter] {}", sql);
        let result = sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(translate_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl EngineDriver for MySqlAdapter {
    fn engine_name(&self) -> &str {
        "MySQL"
    }

    fn capabilities(&self) -> EngineCapabilities {
        MYSQL_CAPABILITIES
    }

    fn type_mapping(&self) -> &'static TypeMapping {
        &MYSQL_TYPES
    }

    async fn list(&self) -> Result<Vec<Collection>> {
        Ok(self
            .catalog(None)
            .await?
            .into_iter()
            .map(|(id, fields)| Collection { id, fields })
            .collect())
    }

    async fn describe_collection(&self, collection_id: &str) -> Result<Vec<Field>> {
        self.catalog(Some(collection_id))
            .await?
            .shift_remove(collection_id)
            .ok_or_else(|| {
                GatewayError::engine(
                    EngineErrorKind::NotFound,
                    format!("Table '{collection_id}' doesn't exist"),
                )
            })
    }

    async fn create(&self, collection_id: &str, fields: &[Field]) -> Result<()> {
        let mut columns = fields
            .iter()
            .map(|f| self.column_definition(f))
            .collect::<Result<Vec<_>>>()?;
        let keys: Vec<String> = fields
            .iter()
            .filter(|f| f.is_primary)
            .map(|f| self.translator.escape_id(&f.name))
            .collect();
        if !keys.is_empty() {
            columns.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table(collection_id),
            columns.join(", ")
        );
        self.execute(&sql).await?;
        Ok(())
    }

    async fn drop_collection(&self, collection_id: &str) -> Result<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {}", self.table(collection_id)))
            .await?;
        Ok(())
    }

    async fn add_column(&self, collection_id: &str, field: &Field) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} ADD {}",
            self.table(collection_id),
            self.column_definition(field)?
        );
        self.execute(&sql).await?;
        Ok(())
    }

    async fn remove_column(&self, collection_id: &str, column_name: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.table(collection_id),
            self.translator.escape_id(column_name)
        );
        self.execute(&sql).await?;
        Ok(())
    }

    async fn change_column_type(&self, collection_id: &str, field: &Field) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} MODIFY {}",
            self.table(collection_id),
            self.column_definition(field)?
        );
        self.execute(&sql).await?;
        Ok(())
    }

    async fn find(&self, collection_id: &str, query: &FindQuery) -> Result<Vec<Row>> {
        let start = Instant::now();
        let datetimes = self
            .datetime_columns(collection_id, query.filter.conditions().into_iter().map(|c| c.2))
            .await?;
        let filter = self
            .translator
            .translate(&normalize_filter(&query.filter, &datetimes))?;
        let page = self.translator.pagination(query.skip, query.limit);
        let sql = format!(
            "SELECT * FROM {} {} {} {}",
            self.table(collection_id),
            filter.where_clause(),
            self.translator.translate_sort(&query.sort),
            page.sql
        );

        let rows = bind_all(sqlx::query(&sql), filter.params.iter().chain(&page.params))
            .fetch_all(&self.pool)
            .await
            .map_err(translate_error)?;
        tracing::debug!(
            "[MySqlAdapter] {} rows from {} in {}ms",
            rows.len(),
            collection_id,
            start.elapsed().as_millis()
        );
        Ok(rows.iter().map(mysql_row_to_json).collect())
    }

    async fn count(&self, collection_id: &str, filter: &Filter) -> Result<u64> {
        let datetimes = self
            .datetime_columns(collection_id, filter.conditions().into_iter().map(|c| c.2))
            .await?;
        let filter = self.translator.translate(&normalize_filter(filter, &datetimes))?;
        let sql = format!(
            "SELECT COUNT(*) AS num FROM {} {}",
            self.table(collection_id),
            filter.where_clause()
        );
        let row = bind_all(sqlx::query(&sql), &filter.params)
            .fetch_one(&self.pool)
            .await
            .map_err(translate_error)?;
        let num: i64 = row.try_get("num").map_err(translate_error)?;
        Ok(num.max(0) as u64)
    }

    async fn insert(&self, collection_id: &str, rows: &[Row]) -> Result<u64> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        let columns: Vec<&String> = first.keys().collect();
        let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table(collection_id),
            columns
                .iter()
                .map(|c| self.translator.escape_id(c))
                .collect::<Vec<_>>()
                .join(", "),
            vec![placeholders; rows.len()].join(", ")
        );

        let datetimes = self
            .datetime_columns(collection_id, rows.iter().flat_map(|r| r.values()))
            .await?;
        let rows: Vec<Row> = rows.iter().map(|r| normalize_row(r, &datetimes)).collect();
        let values = rows
            .iter()
            .flat_map(|row| columns.iter().map(move |c| row.get(*c).unwrap_or(&NULL)));
        let result = bind_all(sqlx::query(&sql), values)
            .execute(&self.pool)
            .await
            .map_err(translate_error)?;
        Ok(result.rows_affected())
    }

    async fn update(&self, collection_id: &str, rows: &[Row], columns: &[String]) -> Result<u64> {
        let assignments = columns
            .iter()
            .map(|c| format!("{} = ?", self.translator.escape_id(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table(collection_id),
            assignments,
            self.translator.escape_id(ID_FIELD)
        );

        let datetimes = self
            .datetime_columns(collection_id, rows.iter().flat_map(|r| r.values()))
            .await?;
        let rows: Vec<Row> = rows.iter().map(|r| normalize_row(r, &datetimes)).collect();

        let mut tx = self.pool.begin().await.map_err(translate_error)?;
        let mut affected = 0;
        for row in &rows {
            let values = columns
                .iter()
                .map(|c| row.get(c).unwrap_or(&NULL))
                .chain(std::iter::once(row.get(ID_FIELD).unwrap_or(&NULL)));
            let result = bind_all(sqlx::query(&sql), values)
                .execute(&mut *tx)
                .await
                .map_err(translate_error)?;
            affected += result.rows_affected();
        }
        tx.commit().await.map_err(translate_error)?;
        Ok(affected)
    }

    async fn delete(&self, collection_id: &str, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            self.table(collection_id),
            self.translator.escape_id(ID_FIELD),
            vec!["?"; ids.len()].join(", ")
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.as_str());
        }
        let result = query.execute(&self.pool).await.map_err(translate_error)?;
        Ok(result.rows_affected())
    }

    async fn aggregate(
        &self,
        collection_id: &str,
        filter: &Filter,
        aggregation: &Aggregation,
    ) -> Result<Vec<Row>> {
        let datetimes = self
            .datetime_columns(collection_id, filter.conditions().into_iter().map(|c| c.2))
            .await?;
        let filter = self.translator.translate(&normalize_filter(filter, &datetimes))?;
        let aggregation = self.translator.translate_aggregation(aggregation)?;
        let group_by = if aggregation.group_by.is_empty() {
            String::new()
        } else {
            format!("GROUP BY {}", aggregation.group_by.join(", "))
        };
        let sql = format!(
            "SELECT {} FROM {} {} {} {}",
            aggregation.select,
            self.table(collection_id),
            filter.where_clause(),
            group_by,
            aggregation.having
        );

        let rows = bind_all(
            sqlx::query(&sql),
            filter.params.iter().chain(&aggregation.params),
        )
        .fetch_all(&self.pool)
        .await
        .map_err(translate_error)?;
        Ok(rows.iter().map(mysql_row_to_json).collect())
    }

    async fn truncate(&self, collection_id: &str) -> Result<()> {
        self.execute(&format!("TRUNCATE TABLE {}", self.table(collection_id)))
            .await?;
        Ok(())
    }
}

fn bind_all<'q, 'v>(
    query: MySqlQuery<'q>,
    values: impl IntoIterator<Item = &'v Value>,
) -> MySqlQuery<'q> {
    values.into_iter().fold(query, bind_value)
}

fn bind_value<'q>(query: MySqlQuery<'q>, value: &Value) -> MySqlQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(sqlx::types::Json(other.clone())),
    }
}

fn holds_timestamp(value: &Value) -> bool {
    match value {
        Value::String(s) => normalize_datetime(s).is_some(),
        Value::Array(items) => items.iter().any(holds_timestamp),
        _ => false,
    }
}

fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => normalize_datetime(s).map_or_else(|| value.clone(), Value::String),
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        other => other.clone(),
    }
}

/// Rewrite timestamps bound for `DATETIME` columns; other columns keep
/// their strings verbatim.
fn normalize_row(row: &Row, datetimes: &HashSet<String>) -> Row {
    row.iter()
        .map(|(column, value)| {
            let value = if datetimes.contains(column) {
                normalize_value(value)
            } else {
                value.clone()
            };
            (column.clone(), value)
        })
        .collect()
}

fn normalize_filter(filter: &Filter, datetimes: &HashSet<String>) -> Filter {
    if datetimes.is_empty() {
        return filter.clone();
    }
    match filter {
        Filter::Empty => Filter::Empty,
        Filter::And(children) => {
            Filter::And(children.iter().map(|c| normalize_filter(c, datetimes)).collect())
        }
        Filter::Or(children) => {
            Filter::Or(children.iter().map(|c| normalize_filter(c, datetimes)).collect())
        }
        Filter::Not(inner) => Filter::Not(Box::new(normalize_filter(inner, datetimes))),
        Filter::Condition {
            field,
            operator,
            value,
        } => Filter::Condition {
            field: field.clone(),
            operator: *operator,
            value: if datetimes.contains(field) {
                normalize_value(value)
            } else {
                value.clone()
            },
        },
    }
}

/// ISO-8601 timestamps become MySQL `DATETIME` literals in UTC; anything
/// else is left alone.
pub fn normalize_datetime(value: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Error numbers from the MySQL server error reference.
pub fn kind_for_error_number(number: u16) -> EngineErrorKind {
    match number {
        // ER_NO_SUCH_TABLE, ER_BAD_TABLE_ERROR, ER_BAD_FIELD_ERROR, ER_CANT_DROP_FIELD_OR_KEY
        1146 | 1051 | 1054 | 1091 => EngineErrorKind::NotFound,
        // ER_DUP_ENTRY, ER_TABLE_EXISTS_ERROR, ER_DUP_FIELDNAME
        1062 | 1050 | 1060 => EngineErrorKind::Conflict,
        // ER_LOCK_WAIT_TIMEOUT, ER_LOCK_DEADLOCK, ER_CON_COUNT_ERROR
        1205 | 1213 | 1040 => EngineErrorKind::Transient,
        _ => EngineErrorKind::Fatal,
    }
}

pub fn translate_error(err: sqlx::Error) -> GatewayError {
    let kind = match &err {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|e| kind_for_error_number(e.number()))
            .unwrap_or(EngineErrorKind::Fatal),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => EngineErrorKind::Transient,
        sqlx::Error::RowNotFound => EngineErrorKind::NotFound,
        _ => EngineErrorKind::Fatal,
    };
    if kind == EngineErrorKind::Fatal {
        tracing::error!("[MySqlAdapter] {}", err);
    }
    let message = match &err {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    };
    GatewayError::engine(kind, message)
}

/// Convert a MySQL row into a JSON object keyed by column name.
fn mysql_row_to_json(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|col| {
            let i = col.ordinal();
            let is_null = row.try_get_raw(i).map(|v| v.is_null()).unwrap_or(true);
            let value = if is_null {
                Value::Null
            } else {
                column_to_json(row, i, col.type_info().name())
            };
            (col.name().to_string(), value)
        })
        .collect()
}

fn column_to_json(row: &MySqlRow, i: usize, type_name: &str) -> Value {
    match type_name {
        "BOOLEAN" => row.try_get::<bool, _>(i).ok().map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(i).ok().map(Value::from)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row.try_get::<u64, _>(i).ok().map(Value::from),
        "YEAR" => row.try_get_unchecked::<u16, _>(i).ok().map(Value::from),
        "FLOAT" => row
            .try_get::<f32, _>(i)
            .ok()
            .and_then(|v| serde_json::Number::from_f64(v as f64))
            .map(Value::Number),
        "DOUBLE" => row
            .try_get::<f64, _>(i)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "DECIMAL" => row
            .try_get_unchecked::<String, _>(i)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "DATETIME" => row
            .try_get::<NaiveDateTime, _>(i)
            .ok()
            .map(|dt| Value::String(dt.and_utc().to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<DateTime<Utc>, _>(i)
            .ok()
            .map(|dt| Value::String(dt.to_rfc3339())),
        "DATE" => row
            .try_get::<NaiveDate, _>(i)
            .ok()
            .map(|d| Value::String(d.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(i)
            .ok()
            .map(|t| Value::String(t.to_string())),
        "JSON" => row.try_get::<Value, _>(i).ok(),
        _ => row
            .try_get_unchecked::<String, _>(i)
            .ok()
            .map(Value::String),
    }
    .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_numbers() {
        assert_eq!(kind_for_error_number(1146), EngineErrorKind::NotFound);
        assert_eq!(kind_for_error_number(1091), EngineErrorKind::NotFound);
        assert_eq!(kind_for_error_number(1062), EngineErrorKind::Conflict);
        assert_eq!(kind_for_error_number(1050), EngineErrorKind::Conflict);
        assert_eq!(kind_for_error_number(1213), EngineErrorKind::Transient);
        assert_eq!(kind_for_error_number(1064), EngineErrorKind::Fatal);
    }

    #[test]
    fn test_translate_driver_errors() {
        let err = translate_error(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        let err = translate_error(sqlx::Error::RowNotFound);
        assert_eq!(err.engine_kind(), Some(EngineErrorKind::NotFound));
        let err = translate_error(sqlx::Error::Protocol("bad packet".into()));
        assert_eq!(err.engine_kind(), Some(EngineErrorKind::Fatal));
    }

    #[test]
    fn test_normalize_datetime() {
        assert_eq!(
            normalize_datetime("2024-03-05T10:20:30.123Z").as_deref(),
            Some("2024-03-05 10:20:30")
        );
        assert_eq!(
            normalize_datetime("2024-03-05T10:20:30+02:00").as_deref(),
            Some("2024-03-05 08:20:30")
        );
        assert_eq!(normalize_datetime("2024-03-05"), None);
        assert_eq!(normalize_datetime("hello"), None);
    }

    #[test]
    fn test_only_datetime_columns_are_rewritten() {
        let datetimes: HashSet<String> = ["shipped".to_string()].into();
        let row: Row = serde_json::from_value(json!({
            "shipped": "2024-03-05T10:20:30.123Z",
            "note": "2024-03-05T10:20:30.123Z",
        }))
        .unwrap();
        let row = normalize_row(&row, &datetimes);
        assert_eq!(row["shipped"], json!("2024-03-05 10:20:30"));
        assert_eq!(row["note"], json!("2024-03-05T10:20:30.123Z"));

        let filter = Filter::Or(vec![
            Filter::condition("shipped", QueryOperator::Gt, "2024-03-05T10:20:30+02:00"),
            Filter::eq("note", "2024-03-05T10:20:30+02:00"),
        ]);
        assert_eq!(
            normalize_filter(&filter, &datetimes),
            Filter::Or(vec![
                Filter::condition("shipped", QueryOperator::Gt, "2024-03-05 08:20:30"),
                Filter::eq("note", "2024-03-05T10:20:30+02:00"),
            ])
        );
    }

    #[test]
    fn test_timestamp_detection() {
        assert!(holds_timestamp(&json!("2024-03-05T10:20:30Z")));
        assert!(holds_timestamp(&json!(["x", "2024-03-05T10:20:30Z"])));
        assert!(!holds_timestamp(&json!("2024-03-05")));
        assert!(!holds_timestamp(&json!(20240305)));
    }

    #[test]
    fn test_capabilities() {
        let caps = MYSQL_CAPABILITIES;
        assert!(caps.supports_collection_operation(CollectionOperation::ChangeColumnType));
        assert!(caps.column_capabilities_for(FieldType::Text).allows(QueryOperator::StartsWith));
        assert!(!caps.column_capabilities_for(FieldType::LongText).sortable);
        let object = caps.column_capabilities_for(FieldType::Object);
        assert!(!object.allows(QueryOperator::Eq));
        assert!(object.allows(QueryOperator::Or));
    }
}
