use extdb_rpc::{
    Aggregation, CollectionOperation, ColumnCapabilities, DataOperation, EngineCapabilities,
    Field, FieldResponse, FieldType, Filter, Sort,
};

use crate::engine::EngineDriver;
use crate::error::{GatewayError, Result};

/// Single place where an engine's declared capabilities are enforced.
///
/// Every check happens before any engine call, so a rejected request
/// leaves both the engine and the schema cache untouched.
#[derive(Debug, Clone)]
pub struct CapabilityGate {
    engine: String,
    capabilities: EngineCapabilities,
}

impl CapabilityGate {
    pub fn new(engine: &str, capabilities: EngineCapabilities) -> Self {
        Self {
            engine: engine.to_string(),
            capabilities,
        }
    }

    pub fn for_driver(driver: &dyn EngineDriver) -> Self {
        Self::new(driver.engine_name(), driver.capabilities())
    }

    pub fn capabilities(&self) -> &EngineCapabilities {
        &self.capabilities
    }

    pub fn supports(&self, operation: CollectionOperation) -> bool {
        self.capabilities.supports_collection_operation(operation)
    }

    pub fn require(&self, operation: CollectionOperation) -> Result<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(self.unsupported(operation.to_string()))
        }
    }

    pub fn require_data(&self, operation: DataOperation) -> Result<()> {
        if self.capabilities.supports_data_operation(operation) {
            Ok(())
        } else {
            Err(self.unsupported(operation.to_string()))
        }
    }

    fn unsupported(&self, operation: String) -> GatewayError {
        tracing::info!("[CapabilityGate] {} rejected {}", self.engine, operation);
        GatewayError::UnsupportedOperation {
            operation,
            engine: self.engine.clone(),
        }
    }

    pub fn require_field_types<'a>(&self, fields: impl IntoIterator<Item = &'a Field>) -> Result<()> {
        for field in fields {
            if !self.capabilities.supports_field_type(field.field_type) {
                return Err(GatewayError::UnsupportedFieldType {
                    engine: self.engine.clone(),
                    field_type: field.field_type,
                });
            }
        }
        Ok(())
    }

    pub fn column_capabilities_for(&self, field_type: FieldType) -> ColumnCapabilities {
        self.capabilities.column_capabilities_for(field_type)
    }

    /// Fields with their display-time capabilities. Computed on every
    /// call, never stored with the schema.
    pub fn annotate(&self, fields: &[Field]) -> Vec<FieldResponse> {
        fields
            .iter()
            .map(|field| FieldResponse {
                field: field.clone(),
                capabilities: self.column_capabilities_for(field.field_type),
            })
            .collect()
    }

    /// Every condition must name an existing field and use an operator
    /// that field's type advertises.
    pub fn validate_filter(&self, collection_id: &str, filter: &Filter, fields: &[Field]) -> Result<()> {
        for (name, operator, _) in filter.conditions() {
            let field = lookup(collection_id, name, fields)?;
            if operator.is_logical() || !self.column_capabilities_for(field.field_type).allows(operator) {
                return Err(GatewayError::UnsupportedOperator {
                    field: name.to_string(),
                    operator: operator.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn validate_sort(&self, collection_id: &str, sort: &Sort, fields: &[Field]) -> Result<()> {
        for key in sort {
            let field = lookup(collection_id, &key.field, fields)?;
            if !self.column_capabilities_for(field.field_type).sortable {
                return Err(GatewayError::UnsupportedOperator {
                    field: key.field.clone(),
                    operator: "sort".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Group and projected fields must exist, functions must be supported,
    /// and `having` may only refer to group columns or aliases.
    pub fn validate_aggregation(
        &self,
        collection_id: &str,
        aggregation: &Aggregation,
        fields: &[Field],
    ) -> Result<()> {
        for name in &aggregation.group_by {
            lookup(collection_id, name, fields)?;
        }
        for projection in &aggregation.projections {
            if !self.capabilities.supports_aggregate(projection.function) {
                return Err(GatewayError::UnsupportedAggregation {
                    engine: self.engine.clone(),
                    function: projection.function,
                });
            }
            lookup(collection_id, &projection.field, fields)?;
        }
        for (name, operator, _) in aggregation.having.conditions() {
            let known = aggregation.group_by.iter().any(|g| g == name)
                || aggregation.projections.iter().any(|p| p.alias == name);
            if !known {
                return Err(GatewayError::FieldDoesNotExist {
                    collection: collection_id.to_string(),
                    field: name.to_string(),
                });
            }
            if operator.is_logical() {
                return Err(GatewayError::UnsupportedOperator {
                    field: name.to_string(),
                    operator: operator.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn lookup<'a>(collection_id: &str, name: &str, fields: &'a [Field]) -> Result<&'a Field> {
    fields
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| GatewayError::FieldDoesNotExist {
            collection: collection_id.to_string(),
            field: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use extdb_rpc::{
        AggregateFunction, ColumnCapabilityRule, FieldSubtype, Projection, QueryOperator,
        SortField,
    };

    use super::*;

    const OPS: &[QueryOperator] = &[QueryOperator::Eq, QueryOperator::Gt];

    fn gate() -> CapabilityGate {
        CapabilityGate::new(
            "Test",
            EngineCapabilities {
                collection_operations: &[CollectionOperation::Create, CollectionOperation::AddColumn],
                data_operations: &[DataOperation::Query],
                field_types: &[FieldType::Number, FieldType::Object],
                aggregate_functions: &[AggregateFunction::Sum],
                columns: &[ColumnCapabilityRule {
                    field_type: FieldType::Number,
                    sortable: true,
                    operators: OPS,
                }],
            },
        )
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::new("age", FieldType::Number).with_subtype(FieldSubtype::Int),
            Field::new("meta", FieldType::Object),
        ]
    }

    #[test]
    fn test_require_names_operation_and_engine() {
        let gate = gate();
        assert!(gate.require(CollectionOperation::AddColumn).is_ok());
        match gate.require(CollectionOperation::ChangeColumnType) {
            Err(GatewayError::UnsupportedOperation { operation, engine }) => {
                assert_eq!(operation, "changeColumnType");
                assert_eq!(engine, "Test");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(gate.require_data(DataOperation::Insert).is_err());
    }

    #[test]
    fn test_field_types() {
        let gate = gate();
        assert!(gate.require_field_types(&fields()).is_ok());
        let boolean = [Field::new("flag", FieldType::Boolean)];
        assert!(matches!(
            gate.require_field_types(&boolean),
            Err(GatewayError::UnsupportedFieldType { field_type: FieldType::Boolean, .. })
        ));
    }

    #[test]
    fn test_filter_operators_enforced_per_type() {
        let gate = gate();
        let ok = Filter::And(vec![
            Filter::condition("age", QueryOperator::Gt, 3),
            Filter::eq("age", 4),
        ]);
        assert!(gate.validate_filter("people", &ok, &fields()).is_ok());

        let bad = Filter::condition("age", QueryOperator::StartsWith, "1");
        assert!(matches!(
            gate.validate_filter("people", &bad, &fields()),
            Err(GatewayError::UnsupportedOperator { .. })
        ));

        let object = Filter::eq("meta", 1);
        assert!(gate.validate_filter("people", &object, &fields()).is_err());

        let missing = Filter::eq("height", 1);
        assert!(matches!(
            gate.validate_filter("people", &missing, &fields()),
            Err(GatewayError::FieldDoesNotExist { .. })
        ));
    }

    #[test]
    fn test_sort_requires_sortable_field() {
        let gate = gate();
        assert!(gate.validate_sort("people", &vec![SortField::desc("age")], &fields()).is_ok());
        assert!(gate.validate_sort("people", &vec![SortField::asc("meta")], &fields()).is_err());
    }

    #[test]
    fn test_aggregation_validation() {
        let gate = gate();
        let mut aggregation = Aggregation {
            group_by: vec!["meta".into()],
            projections: vec![Projection {
                function: AggregateFunction::Sum,
                field: "age".into(),
                alias: "total".into(),
            }],
            having: Filter::condition("total", QueryOperator::Gt, 10),
        };
        assert!(gate.validate_aggregation("people", &aggregation, &fields()).is_ok());

        aggregation.projections[0].function = AggregateFunction::Avg;
        assert!(matches!(
            gate.validate_aggregation("people", &aggregation, &fields()),
            Err(GatewayError::UnsupportedAggregation { .. })
        ));

        aggregation.projections[0].function = AggregateFunction::Sum;
        aggregation.having = Filter::eq("nope", 1);
        assert!(gate.validate_aggregation("people", &aggregation, &fields()).is_err());
    }

    #[test]
    fn test_annotate_derives_capabilities() {
        let annotated = gate().annotate(&fields());
        assert!(annotated[0].capabilities.sortable);
        assert!(annotated[0].capabilities.allows(QueryOperator::Gt));
        assert!(!annotated[1].capabilities.sortable);
    }
}
