//! Filter, sort and aggregation AST -> SQL fragments with bound parameters.
//!
//! Literal values never reach the SQL text: every value becomes a `?`
//! placeholder and is returned in the parameter list, in order.

use extdb_rpc::{AggregateFunction, Aggregation, Filter, QueryOperator, Sort, SortDirection};
use serde_json::Value;

use crate::error::{GatewayError, Result};

/// Identifier quoting rules of a SQL engine.
#[derive(Debug, Clone, Copy)]
pub struct SqlDialect {
    pub identifier_quote: char,
}

impl SqlDialect {
    pub const MYSQL: SqlDialect = SqlDialect {
        identifier_quote: '`',
    };
}

/// A piece of SQL and the values bound to its placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlFragment {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// `WHERE <sql>`, or nothing for an empty filter.
    pub fn where_clause(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.sql)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationFragment {
    /// Select list: group columns followed by aliased aggregates
    pub select: String,
    /// Quoted group columns
    pub group_by: Vec<String>,
    /// `HAVING ...` or empty
    pub having: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterTranslator {
    dialect: SqlDialect,
}

impl FilterTranslator {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn mysql() -> Self {
        Self::new(SqlDialect::MYSQL)
    }

    /// Quote an identifier, doubling any embedded quote character.
    pub fn escape_id(&self, name: &str) -> String {
        let q = self.dialect.identifier_quote;
        let doubled = format!("{q}{q}");
        format!("{q}{}{q}", name.replace(q, &doubled))
    }

    pub fn translate(&self, filter: &Filter) -> Result<SqlFragment> {
        let mut params = Vec::new();
        let sql = self.translate_node(filter, &mut params)?;
        Ok(SqlFragment { sql, params })
    }

    fn translate_node(&self, filter: &Filter, params: &mut Vec<Value>) -> Result<String> {
        match filter {
            Filter::Empty => Ok(String::new()),
            Filter::And(children) => self.join_children(children, "AND", params),
            Filter::Or(children) => self.join_children(children, "OR", params),
            Filter::Not(inner) => {
                let sql = self.translate_node(inner, params)?;
                if sql.is_empty() {
                    // negation of "always true"
                    Ok("FALSE".to_string())
                } else {
                    Ok(format!("NOT ({sql})"))
                }
            }
            Filter::Condition {
                field,
                operator,
                value,
            } => self.translate_condition(field, *operator, value, params),
        }
    }

    fn join_children(
        &self,
        children: &[Filter],
        joiner: &str,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        let start = params.len();
        let mut parts = Vec::new();
        let mut unrestricted = false;
        for child in children {
            let sql = self.translate_node(child, params)?;
            if sql.is_empty() {
                unrestricted = true;
            } else {
                parts.push(sql);
            }
        }
        // An always-true branch makes the whole disjunction always true.
        if joiner == "OR" && unrestricted {
            params.truncate(start);
            return Ok(String::new());
        }
        Ok(match parts.len() {
            0 => String::new(),
            1 => parts.remove(0),
            _ => format!("({})", parts.join(&format!(" {joiner} "))),
        })
    }

    fn translate_condition(
        &self,
        field: &str,
        operator: QueryOperator,
        value: &Value,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        let column = self.escape_id(field);
        let comparison = |sql_op: &str, params: &mut Vec<Value>| -> Result<String> {
            if value.is_null() {
                return Err(GatewayError::InvalidQuery(format!(
                    "{operator} on {field} needs a non-null value"
                )));
            }
            params.push(value.clone());
            Ok(format!("{column} {sql_op} ?"))
        };

        match operator {
            QueryOperator::Eq if value.is_null() => Ok(format!("{column} IS NULL")),
            QueryOperator::Ne if value.is_null() => Ok(format!("{column} IS NOT NULL")),
            QueryOperator::Eq => comparison("=", params),
            QueryOperator::Ne => comparison("<>", params),
            QueryOperator::Lt => comparison("<", params),
            QueryOperator::Lte => comparison("<=", params),
            QueryOperator::Gt => comparison(">", params),
            QueryOperator::Gte => comparison(">=", params),
            QueryOperator::StartsWith => {
                let text = string_operand(field, operator, value)?;
                params.push(Value::String(format!("{}%", escape_like(text))));
                Ok(format!("{column} LIKE ?"))
            }
            QueryOperator::EndsWith => {
                let text = string_operand(field, operator, value)?;
                params.push(Value::String(format!("%{}", escape_like(text))));
                Ok(format!("{column} LIKE ?"))
            }
            QueryOperator::HasSome => {
                let items = match value {
                    Value::Array(items) if !items.is_empty() => items,
                    _ => {
                        return Err(GatewayError::InvalidQuery(format!(
                            "hasSome on {field} needs a non-empty list"
                        )));
                    }
                };
                params.extend(items.iter().cloned());
                let placeholders = vec!["?"; items.len()].join(", ");
                Ok(format!("{column} IN ({placeholders})"))
            }
            QueryOperator::And | QueryOperator::Or | QueryOperator::Not => Err(
                GatewayError::InvalidQuery(format!("{operator} can't be used as a comparison on {field}")),
            ),
        }
    }

    /// `ORDER BY ...`, or nothing when the sort is empty.
    pub fn translate_sort(&self, sort: &Sort) -> String {
        if sort.is_empty() {
            return String::new();
        }
        let keys: Vec<String> = sort
            .iter()
            .map(|s| {
                let direction = match s.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("{} {direction}", self.escape_id(&s.field))
            })
            .collect();
        format!("ORDER BY {}", keys.join(", "))
    }

    /// `LIMIT ?, ?` with skip and limit bound.
    pub fn pagination(&self, skip: u64, limit: u64) -> SqlFragment {
        SqlFragment {
            sql: "LIMIT ?, ?".to_string(),
            params: vec![Value::from(skip), Value::from(limit)],
        }
    }

    pub fn translate_aggregation(&self, aggregation: &Aggregation) -> Result<AggregationFragment> {
        if aggregation.group_by.is_empty() && aggregation.projections.is_empty() {
            return Err(GatewayError::InvalidQuery(
                "aggregation needs a group field or a projection".to_string(),
            ));
        }

        let group_by: Vec<String> = aggregation
            .group_by
            .iter()
            .map(|f| self.escape_id(f))
            .collect();

        let mut select = group_by.clone();
        for projection in &aggregation.projections {
            let function = match projection.function {
                AggregateFunction::Avg => "AVG",
                AggregateFunction::Max => "MAX",
                AggregateFunction::Min => "MIN",
                AggregateFunction::Sum => "SUM",
                AggregateFunction::Count => "COUNT",
            };
            select.push(format!(
                "{function}({}) AS {}",
                self.escape_id(&projection.field),
                self.escape_id(&projection.alias)
            ));
        }

        let having = self.translate(&aggregation.having)?;
        let having_sql = if having.is_empty() {
            String::new()
        } else {
            format!("HAVING {}", having.sql)
        };

        Ok(AggregationFragment {
            select: select.join(", "),
            group_by,
            having: having_sql,
            params: having.params,
        })
    }
}

fn string_operand<'a>(field: &str, operator: QueryOperator, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        GatewayError::InvalidQuery(format!("{operator} on {field} needs a string value"))
    })
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
