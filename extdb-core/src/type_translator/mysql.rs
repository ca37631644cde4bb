use extdb_rpc::{FieldSubtype, FieldType};

use super::{CanonicalTypeRule, NativeTemplate, NativeTypeRule, TypeMapping};

use FieldSubtype as S;
use FieldType as T;
use NativeTemplate::{Fixed, WithLength, WithPrecision};

const fn native(
    native: &'static str,
    field_type: FieldType,
    subtype: Option<FieldSubtype>,
) -> NativeTypeRule {
    NativeTypeRule {
        native,
        field_type,
        subtype,
    }
}

const fn canonical(
    field_type: FieldType,
    subtype: Option<FieldSubtype>,
    native: NativeTemplate,
) -> CanonicalTypeRule {
    CanonicalTypeRule {
        field_type,
        subtype,
        native,
    }
}

pub static MYSQL_TYPES: TypeMapping = TypeMapping {
    engine: "MySQL",
    native: &[
        native("int", T::Number, Some(S::Int)),
        native("integer", T::Number, Some(S::Int)),
        native("bigint", T::Number, Some(S::Int)),
        native("smallint", T::Number, Some(S::Int)),
        native("float", T::Number, Some(S::Float)),
        native("double", T::Number, Some(S::Float)),
        native("decimal", T::Number, Some(S::Float)),
        native("date", T::Datetime, Some(S::Date)),
        native("datetime", T::Datetime, Some(S::Datetime)),
        native("timestamp", T::Datetime, Some(S::Timestamp)),
        native("time", T::Datetime, Some(S::Time)),
        native("year", T::Datetime, Some(S::Year)),
        native("varchar", T::Text, Some(S::String)),
        native("text", T::Text, Some(S::Small)),
        native("mediumtext", T::Text, Some(S::Medium)),
        native("longtext", T::LongText, None),
        native("tinyint", T::Boolean, None),
        native("bit", T::Boolean, None),
        native("boolean", T::Boolean, None),
        native("bool", T::Boolean, None),
        native("json", T::Object, None),
    ],
    canonical: &[
        canonical(T::Number, Some(S::Int), Fixed("INT")),
        canonical(T::Number, Some(S::Bigint), Fixed("BIGINT")),
        canonical(T::Number, Some(S::Float), WithPrecision("FLOAT")),
        canonical(T::Number, Some(S::Double), WithPrecision("DOUBLE")),
        canonical(T::Number, Some(S::Decimal), WithPrecision("DECIMAL")),
        canonical(T::Datetime, Some(S::Date), Fixed("DATE")),
        canonical(T::Datetime, Some(S::Time), Fixed("TIME")),
        canonical(T::Datetime, Some(S::Year), Fixed("YEAR")),
        canonical(T::Datetime, Some(S::Datetime), Fixed("DATETIME")),
        canonical(
            T::Datetime,
            Some(S::Timestamp),
            Fixed("TIMESTAMP DEFAULT CURRENT_TIMESTAMP"),
        ),
        canonical(T::Text, Some(S::String), WithLength("VARCHAR")),
        canonical(T::Text, Some(S::Small), Fixed("TEXT")),
        canonical(T::Text, Some(S::Medium), Fixed("MEDIUMTEXT")),
        canonical(T::Text, Some(S::Large), Fixed("LONGTEXT")),
        canonical(T::LongText, None, Fixed("LONGTEXT")),
        canonical(T::Boolean, None, Fixed("BOOLEAN")),
        canonical(T::Object, None, Fixed("JSON")),
    ],
    default_precision: "(5,2)",
    default_length: 2048,
};
