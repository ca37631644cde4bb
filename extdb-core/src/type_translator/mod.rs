//! Canonical <-> native column type translation.
//!
//! Each engine contributes a [`TypeMapping`]: two static tables plus the
//! fallback precision and length used when a requested value can't be
//! parsed. The translation code is shared; only the tables differ.

mod mongo;
mod mysql;

pub use mongo::MONGO_TYPES;
pub use mysql::MYSQL_TYPES;

use extdb_rpc::{Field, FieldSubtype, FieldType};

use crate::error::{GatewayError, Result};

/// How a canonical type is rendered in the engine's DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeTemplate {
    /// Emitted as-is
    Fixed(&'static str),
    /// Followed by `(p,s)` parsed from the field precision
    WithPrecision(&'static str),
    /// Followed by `(n)` parsed from the field precision as a length
    WithLength(&'static str),
}

/// Native type name (lower case, no suffix) to canonical type.
#[derive(Debug, Clone, Copy)]
pub struct NativeTypeRule {
    pub native: &'static str,
    pub field_type: FieldType,
    pub subtype: Option<FieldSubtype>,
}

/// Canonical (type, subtype) pair to native DDL type.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalTypeRule {
    pub field_type: FieldType,
    pub subtype: Option<FieldSubtype>,
    pub native: NativeTemplate,
}

#[derive(Debug)]
pub struct TypeMapping {
    pub engine: &'static str,
    pub native: &'static [NativeTypeRule],
    pub canonical: &'static [CanonicalTypeRule],
    /// Used when a numeric precision is missing or malformed
    pub default_precision: &'static str,
    /// Used when a text length is missing, malformed or not positive
    pub default_length: u32,
}

/// Result of reading an engine column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalType {
    pub field_type: FieldType,
    pub subtype: Option<FieldSubtype>,
    /// Parenthesized suffix of the native type, whitespace removed
    pub precision: Option<String>,
}

impl TypeMapping {
    /// Read a native column type such as `varchar(50)` or `int unsigned`.
    ///
    /// Never fails: unknown types come back as text with the
    /// [`FieldSubtype::Unknown`] marker so the collection stays usable.
    pub fn native_to_canonical(&self, native_type: &str) -> CanonicalType {
        let lowered = native_type.trim().to_lowercase();
        let (head, precision) = match lowered.split_once('(') {
            Some((head, rest)) => {
                let inner = rest.split(')').next().unwrap_or_default();
                let inner: String = inner.chars().filter(|c| !c.is_whitespace()).collect();
                (head.to_string(), (!inner.is_empty()).then_some(inner))
            }
            None => (lowered.clone(), None),
        };
        let base = head.split_whitespace().next().unwrap_or_default();

        match self.native.iter().find(|rule| rule.native == base) {
            Some(rule) => CanonicalType {
                field_type: rule.field_type,
                subtype: rule.subtype,
                precision,
            },
            None => {
                tracing::debug!("[TypeTranslator] {} unknown type {}", self.engine, base);
                CanonicalType {
                    field_type: FieldType::Text,
                    subtype: Some(FieldSubtype::Unknown),
                    precision,
                }
            }
        }
    }

    /// Render the native DDL type of a canonical (type, subtype) pair.
    pub fn canonical_to_native(
        &self,
        field_type: FieldType,
        subtype: Option<FieldSubtype>,
        precision: Option<&str>,
    ) -> Result<String> {
        let rule = self
            .canonical
            .iter()
            .find(|rule| rule.field_type == field_type && rule.subtype == subtype)
            .ok_or_else(|| GatewayError::UnsupportedTypeCombination {
                field_type: field_type.to_string(),
                subtype: subtype.map(|s| s.to_string()).unwrap_or_default(),
            })?;

        Ok(match rule.native {
            NativeTemplate::Fixed(native) => native.to_string(),
            NativeTemplate::WithPrecision(native) => {
                format!("{native}{}", self.parse_precision(precision))
            }
            NativeTemplate::WithLength(native) => {
                format!("{native}{}", self.parse_length(precision))
            }
        })
    }

    pub fn native_type_for(&self, field: &Field) -> Result<String> {
        self.canonical_to_native(field.field_type, field.subtype, field.precision.as_deref())
    }

    /// The field as this engine would report it back after creating it.
    /// Fields with no native mapping are returned unchanged.
    pub fn normalize(&self, field: &Field) -> Field {
        match self.native_type_for(field) {
            Ok(native) => {
                let canonical = self.native_to_canonical(&native);
                Field {
                    name: field.name.clone(),
                    field_type: canonical.field_type,
                    subtype: canonical.subtype,
                    precision: canonical.precision,
                    is_primary: field.is_primary,
                }
            }
            Err(_) => field.clone(),
        }
    }

    /// `"10, 2"` -> `"(10,2)"`. One or two unsigned integers are accepted;
    /// anything else falls back to the default precision.
    fn parse_precision(&self, precision: Option<&str>) -> String {
        let parsed: Option<Vec<u32>> = precision.and_then(|p| {
            p.split(',')
                .map(|part| part.trim().parse::<u32>().ok())
                .collect()
        });
        match parsed {
            Some(parts) if (1..=2).contains(&parts.len()) => {
                let joined: Vec<String> = parts.iter().map(u32::to_string).collect();
                format!("({})", joined.join(","))
            }
            _ => self.default_precision.to_string(),
        }
    }

    fn parse_length(&self, length: Option<&str>) -> String {
        match length.and_then(|l| l.trim().parse::<i64>().ok()) {
            Some(n) if n > 0 => format!("({n})"),
            _ => format!("({})", self.default_length),
        }
    }
}
