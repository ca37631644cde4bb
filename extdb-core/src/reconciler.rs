//! Diff between the live schema of a collection and a requested one.

use extdb_rpc::Field;
use indexmap::IndexMap;

/// Column changes needed to turn the live schema into the requested one.
///
/// Adds and retypes keep the order of the requested fields, removes keep
/// the order of the live fields. System fields never appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    pub columns_to_add: Vec<Field>,
    pub columns_to_remove: Vec<String>,
    pub columns_to_change_type: Vec<Field>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.columns_to_add.is_empty()
            && self.columns_to_remove.is_empty()
            && self.columns_to_change_type.is_empty()
    }
}

pub fn reconcile(live: &[Field], requested: &[Field]) -> SchemaDiff {
    reconcile_with(live, requested, Field::clone)
}

/// Like [`reconcile`], but compares types after passing each requested
/// field through `normalize`, typically the engine's own round trip so a
/// lossy native mapping doesn't show up as a retype on every update.
/// The fields in the output are the requested ones, not the normalized.
pub fn reconcile_with<F>(live: &[Field], requested: &[Field], normalize: F) -> SchemaDiff
where
    F: Fn(&Field) -> Field,
{
    let live: IndexMap<&str, &Field> = live
        .iter()
        .filter(|f| !f.is_system())
        .map(|f| (f.name.as_str(), f))
        .collect();
    let mut wanted: IndexMap<&str, &Field> = IndexMap::new();
    for field in requested.iter().filter(|f| !f.is_system()) {
        wanted.entry(field.name.as_str()).or_insert(field);
    }

    let mut diff = SchemaDiff::default();
    for (name, field) in &wanted {
        match live.get(name) {
            None => diff.columns_to_add.push((*field).clone()),
            Some(current) if type_differs(current, &normalize(field)) => {
                diff.columns_to_change_type.push((*field).clone())
            }
            Some(_) => {}
        }
    }
    diff.columns_to_remove = live
        .keys()
        .filter(|name| !wanted.contains_key(*name))
        .map(|name| name.to_string())
        .collect();
    diff
}

/// Type always counts; subtype and precision only when both sides
/// declare one, since engines don't report every detail back.
fn type_differs(live: &Field, requested: &Field) -> bool {
    if live.field_type != requested.field_type {
        return true;
    }
    if let (Some(a), Some(b)) = (live.subtype, requested.subtype) {
        if a != b {
            return true;
        }
    }
    match (&live.precision, &requested.precision) {
        (Some(a), Some(b)) => strip_whitespace(a) != strip_whitespace(b),
        _ => false,
    }
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use extdb_rpc::schema::system_fields;
    use extdb_rpc::{FieldSubtype, FieldType};

    use super::*;

    fn int(name: &str) -> Field {
        Field::new(name, FieldType::Number).with_subtype(FieldSubtype::Int)
    }

    fn float(name: &str) -> Field {
        Field::new(name, FieldType::Number).with_subtype(FieldSubtype::Float)
    }

    fn text(name: &str) -> Field {
        Field::new(name, FieldType::Text).with_subtype(FieldSubtype::String)
    }

    fn datetime(name: &str) -> Field {
        Field::new(name, FieldType::Datetime).with_subtype(FieldSubtype::Datetime)
    }

    #[test]
    fn test_reconcile_add_and_remove() {
        let live = vec![int("a"), text("b")];
        let requested = vec![text("b"), datetime("c")];
        let diff = reconcile(&live, &requested);
        assert_eq!(diff.columns_to_add, vec![datetime("c")]);
        assert_eq!(diff.columns_to_remove, vec!["a".to_string()]);
        assert!(diff.columns_to_change_type.is_empty());
    }

    #[test]
    fn test_reconcile_change_type() {
        let diff = reconcile(&[int("a")], &[float("a")]);
        assert_eq!(diff.columns_to_change_type, vec![float("a")]);
        assert!(diff.columns_to_add.is_empty());
        assert!(diff.columns_to_remove.is_empty());
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut live = system_fields();
        live.extend([int("a"), text("b").with_precision("40"), datetime("c")]);
        assert!(reconcile(&live, &live).is_empty());
    }

    #[test]
    fn test_system_fields_never_diffed() {
        let live = vec![int("a")];
        let mut requested = vec![int("a")];
        requested.push(Field::new("_id", FieldType::Number).with_subtype(FieldSubtype::Int));
        requested.push(Field::new("_owner", FieldType::Boolean));
        let diff = reconcile(&live, &requested);
        assert!(diff.is_empty());

        let mut live = system_fields();
        live.push(int("a"));
        let diff = reconcile(&live, &[]);
        assert_eq!(diff.columns_to_remove, vec!["a".to_string()]);
    }

    #[test]
    fn test_order_follows_inputs() {
        let live = vec![int("z"), int("y"), int("x")];
        let requested = vec![float("x"), text("n2"), text("n1"), float("z")];
        let diff = reconcile(&live, &requested);
        let added: Vec<&str> = diff.columns_to_add.iter().map(|f| f.name.as_str()).collect();
        let changed: Vec<&str> = diff
            .columns_to_change_type
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(added, vec!["n2", "n1"]);
        assert_eq!(changed, vec!["x", "z"]);
        assert_eq!(diff.columns_to_remove, vec!["y".to_string()]);
    }

    #[test]
    fn test_missing_subtype_or_precision_is_not_a_change() {
        let live = vec![text("a").with_precision("2048")];
        let requested = vec![Field::new("a", FieldType::Text)];
        assert!(reconcile(&live, &requested).is_empty());

        let requested = vec![text("a").with_precision("50")];
        assert_eq!(reconcile(&live, &requested).columns_to_change_type.len(), 1);
    }

    #[test]
    fn test_normalized_comparison_hides_lossy_mapping() {
        let live = vec![float("score").with_precision("5,2")];
        let requested =
            vec![Field::new("score", FieldType::Number).with_subtype(FieldSubtype::Double)];
        assert_eq!(reconcile(&live, &requested).columns_to_change_type.len(), 1);

        let normalized = reconcile_with(&live, &requested, |f| {
            crate::type_translator::MYSQL_TYPES.normalize(f)
        });
        assert!(normalized.is_empty());
    }
}
