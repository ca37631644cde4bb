use extdb_rpc::{FieldSubtype, FieldType};

use super::{CanonicalTypeRule, NativeTemplate, NativeTypeRule, TypeMapping};

use FieldSubtype as S;
use FieldType as T;
use NativeTemplate::Fixed;

// Native names are BSON type names, as stored in the schema descriptor and
// as reported when sampling documents.
pub static MONGO_TYPES: TypeMapping = TypeMapping {
    engine: "MongoDB",
    native: &[
        NativeTypeRule { native: "int", field_type: T::Number, subtype: Some(S::Int) },
        NativeTypeRule { native: "long", field_type: T::Number, subtype: Some(S::Bigint) },
        NativeTypeRule { native: "double", field_type: T::Number, subtype: Some(S::Double) },
        NativeTypeRule { native: "decimal", field_type: T::Number, subtype: Some(S::Decimal) },
        NativeTypeRule { native: "date", field_type: T::Datetime, subtype: Some(S::Datetime) },
        NativeTypeRule { native: "timestamp", field_type: T::Datetime, subtype: Some(S::Timestamp) },
        NativeTypeRule { native: "string", field_type: T::Text, subtype: Some(S::String) },
        NativeTypeRule { native: "objectid", field_type: T::Text, subtype: Some(S::String) },
        NativeTypeRule { native: "bool", field_type: T::Boolean, subtype: None },
        NativeTypeRule { native: "object", field_type: T::Object, subtype: None },
        NativeTypeRule { native: "array", field_type: T::Object, subtype: None },
    ],
    canonical: &[
        CanonicalTypeRule { field_type: T::Number, subtype: Some(S::Int), native: Fixed("int") },
        CanonicalTypeRule { field_type: T::Number, subtype: Some(S::Bigint), native: Fixed("long") },
        CanonicalTypeRule { field_type: T::Number, subtype: Some(S::Float), native: Fixed("double") },
        CanonicalTypeRule { field_type: T::Number, subtype: Some(S::Double), native: Fixed("double") },
        CanonicalTypeRule { field_type: T::Number, subtype: Some(S::Decimal), native: Fixed("decimal") },
        CanonicalTypeRule { field_type: T::Datetime, subtype: Some(S::Date), native: Fixed("date") },
        CanonicalTypeRule { field_type: T::Datetime, subtype: Some(S::Datetime), native: Fixed("date") },
        CanonicalTypeRule { field_type: T::Datetime, subtype: Some(S::Timestamp), native: Fixed("timestamp") },
        CanonicalTypeRule { field_type: T::Text, subtype: Some(S::String), native: Fixed("string") },
        CanonicalTypeRule { field_type: T::Text, subtype: Some(S::Small), native: Fixed("string") },
        CanonicalTypeRule { field_type: T::Text, subtype: Some(S::Medium), native: Fixed("string") },
        CanonicalTypeRule { field_type: T::Text, subtype: Some(S::Large), native: Fixed("string") },
        CanonicalTypeRule { field_type: T::LongText, subtype: None, native: Fixed("string") },
        CanonicalTypeRule { field_type: T::Boolean, subtype: None, native: Fixed("bool") },
        CanonicalTypeRule { field_type: T::Object, subtype: None, native: Fixed("object") },
    ],
    default_precision: "",
    default_length: 0,
};
