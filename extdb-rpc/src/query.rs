use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::{AggregateFunction, QueryOperator};

/// A row as exchanged with callers: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// Engine-agnostic filter tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    /// Matches every row
    #[default]
    Empty,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Condition {
        field: String,
        operator: QueryOperator,
        value: Value,
    },
}

impl Filter {
    pub fn condition(field: &str, operator: QueryOperator, value: impl Into<Value>) -> Self {
        Filter::Condition {
            field: field.to_string(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::condition(field, QueryOperator::Eq, value)
    }

    /// True when the filter cannot restrict any row.
    pub fn is_empty(&self) -> bool {
        match self {
            Filter::Empty => true,
            Filter::And(children) | Filter::Or(children) => children.iter().all(Filter::is_empty),
            Filter::Not(_) | Filter::Condition { .. } => false,
        }
    }

    /// Every leaf condition in the tree, depth first.
    pub fn conditions(&self) -> Vec<(&str, QueryOperator, &Value)> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<(&'a str, QueryOperator, &'a Value)>) {
        match self {
            Filter::Empty => {}
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_conditions(out);
                }
            }
            Filter::Not(inner) => inner.collect_conditions(out),
            Filter::Condition {
                field,
                operator,
                value,
            } => out.push((field.as_str(), *operator, value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// Ordered sort keys. Empty means engine-native (unspecified) order.
pub type Sort = Vec<SortField>;

/// A computed column of an aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub function: AggregateFunction,
    pub field: String,
    /// Output column name; `having` filters refer to it
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub group_by: Vec<String>,
    pub projections: Vec<Projection>,
    /// Post-aggregation filter over group and alias columns
    #[serde(default)]
    pub having: Filter,
}

/// Input of `find`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindQuery {
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub sort: Sort,
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    50
}

impl Default for FindQuery {
    fn default() -> Self {
        Self {
            filter: Filter::Empty,
            sort: Vec::new(),
            skip: 0,
            limit: default_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_empty_filters_are_empty() {
        assert!(Filter::Empty.is_empty());
        assert!(Filter::And(vec![]).is_empty());
        assert!(Filter::Or(vec![Filter::Empty, Filter::And(vec![])]).is_empty());
        assert!(!Filter::eq("a", 1).is_empty());
        assert!(!Filter::Not(Box::new(Filter::Empty)).is_empty());
    }

    #[test]
    fn test_conditions_are_collected_depth_first() {
        let filter = Filter::And(vec![
            Filter::eq("a", 1),
            Filter::Not(Box::new(Filter::Or(vec![
                Filter::condition("b", QueryOperator::Gt, 2),
                Filter::condition("c", QueryOperator::StartsWith, "x"),
            ]))),
        ]);
        let names: Vec<&str> = filter.conditions().into_iter().map(|(f, _, _)| f).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_filter_json_shape() {
        let filter: Filter = serde_json::from_value(json!({
            "and": [
                { "condition": { "field": "age", "operator": "gte", "value": 18 } },
                "empty"
            ]
        }))
        .unwrap();
        assert_eq!(
            filter,
            Filter::And(vec![
                Filter::condition("age", QueryOperator::Gte, 18),
                Filter::Empty
            ])
        );
    }

    #[test]
    fn test_find_query_defaults() {
        let query: FindQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query, FindQuery::default());
        assert_eq!(query.limit, 50);
    }
}
