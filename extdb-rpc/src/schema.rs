use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::capability::{
    CollectionOperation, ColumnCapabilities, DataOperation, EngineCapabilities,
};

/// Canonical column type, independent of any engine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FieldType {
    Number,
    Text,
    LongText,
    Datetime,
    Boolean,
    Object,
}

/// Optional refinement of a [`FieldType`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FieldSubtype {
    // number
    Int,
    Bigint,
    Float,
    Double,
    Decimal,
    // datetime
    Date,
    Time,
    Year,
    Datetime,
    Timestamp,
    // text
    String,
    Small,
    Medium,
    Large,
    /// Engine type with no canonical mapping
    Unknown,
}

/// A column of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Column name, unique within a collection
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<FieldSubtype>,
    /// Numeric precision ("p,s") or text length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_primary: bool,
}

impl Field {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            subtype: None,
            precision: None,
            is_primary: false,
        }
    }

    pub fn with_subtype(mut self, subtype: FieldSubtype) -> Self {
        self.subtype = Some(subtype);
        self
    }

    pub fn with_precision(mut self, precision: &str) -> Self {
        self.precision = Some(precision.to_string());
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn is_system(&self) -> bool {
        is_system_field(&self.name)
    }
}

// ══════════════════════════════════════════════════════════════════
//  SYSTEM FIELDS
// ══════════════════════════════════════════════════════════════════

/// Identity column present in every collection.
pub const ID_FIELD: &str = "_id";

pub const SYSTEM_FIELD_NAMES: [&str; 4] = [ID_FIELD, "_createdDate", "_updatedDate", "_owner"];

/// The reserved columns every collection carries, in creation order.
pub fn system_fields() -> Vec<Field> {
    vec![
        Field::new(ID_FIELD, FieldType::Text)
            .with_subtype(FieldSubtype::String)
            .with_precision("50")
            .primary(),
        Field::new("_createdDate", FieldType::Datetime).with_subtype(FieldSubtype::Datetime),
        Field::new("_updatedDate", FieldType::Datetime).with_subtype(FieldSubtype::Datetime),
        Field::new("_owner", FieldType::Text)
            .with_subtype(FieldSubtype::String)
            .with_precision("50"),
    ]
}

pub fn is_system_field(name: &str) -> bool {
    SYSTEM_FIELD_NAMES.contains(&name)
}

/// A collection as requested by a client or reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Engine-level table or container name
    pub id: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Collection {
    pub fn new(id: &str, fields: Vec<Field>) -> Self {
        Self {
            id: id.to_string(),
            fields,
        }
    }
}

// ══════════════════════════════════════════════════════════════════
//  RESPONSES
// ══════════════════════════════════════════════════════════════════

/// A field annotated with the operations callers may use on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldResponse {
    #[serde(flatten)]
    pub field: Field,
    pub capabilities: ColumnCapabilities,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionCapabilitiesResponse {
    pub collection_operations: Vec<CollectionOperation>,
    pub data_operations: Vec<DataOperation>,
    pub field_types: Vec<FieldType>,
}

impl From<&EngineCapabilities> for CollectionCapabilitiesResponse {
    fn from(caps: &EngineCapabilities) -> Self {
        Self {
            collection_operations: caps.collection_operations.to_vec(),
            data_operations: caps.data_operations.to_vec(),
            field_types: caps.field_types.to_vec(),
        }
    }
}

/// One entry of a `list` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionResponse {
    pub id: String,
    pub fields: Vec<FieldResponse>,
    pub capabilities: CollectionCapabilitiesResponse,
}

/// Result of dropping a collection: the fields it had just before the drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCollectionResponse {
    pub id: String,
    pub fields: Vec<Field>,
}
