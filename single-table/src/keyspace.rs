//! Key derivation for the shared table.
//!
//! Primary key: `<model_name>#<unique_value>`.
//! Index key: `<model_name>#<field_name>#<value>`.
//!
//! Both are pure functions of the model name and field values, so the same
//! logical item maps to the same keys in every process.

use std::collections::BTreeMap;

use crate::{
    Attributes, Item,
    error::Error,
    filter::BoundCondition,
    schema::{FieldSpec, ModelSchema},
    store::IndexQuery,
    value::{Value, ValueKind},
};

pub const SEPARATOR: char = '#';

/// Name of the secondary index holding search key and relation entries.
pub const SEARCH_INDEX: &str = "search";

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_empty())
}

pub fn derive_primary_key(model_name: &str, unique_value: Option<&Value>) -> Result<String, Error> {
    let Some(value) = present(unique_value) else {
        return Err(Error::validation(format!(
            "unique key of {} is missing or empty",
            model_name
        )));
    };
    Ok(format!("{}{}{}", model_name, SEPARATOR, value.key_fragment()))
}

pub fn derive_index_key(
    model_name: &str,
    field_name: &str,
    value: Option<&Value>,
) -> Result<String, Error> {
    let Some(value) = present(value) else {
        return Err(Error::validation(format!(
            "index value for {}.{} is missing or empty",
            model_name, field_name
        )));
    };
    Ok(format!(
        "{}{}",
        index_key_prefix(model_name, field_name),
        value.key_fragment()
    ))
}

fn index_key_prefix(model_name: &str, field_name: &str) -> String {
    format!("{}{}{}{}", model_name, SEPARATOR, field_name, SEPARATOR)
}

/// Refuses a value whose kind differs from the one `field` declares. Keys of
/// different kinds could otherwise share a fragment.
pub(crate) fn check_kind(
    schema: &ModelSchema,
    field: &FieldSpec,
    value: &Value,
) -> Result<(), Error> {
    match field.value_kind() {
        Some(kind) if kind != value.value_kind() => Err(Error::validation(format!(
            "{}.{} holds {} values, got {}",
            schema.model_name(),
            field.name(),
            kind,
            value.kind()
        ))),
        _ => Ok(()),
    }
}

/// Shapes raw attributes into a storable item: drops absent values, derives
/// the primary key and one index key per populated indexed field.
pub(crate) fn build_item(schema: &ModelSchema, attributes: Attributes) -> Result<Item, Error> {
    let attributes: Attributes = attributes
        .into_iter()
        .filter(|(_, a)| a.value.is_some())
        .collect();

    if let Some(unknown) = attributes.keys().find(|name| schema.field(name).is_none()) {
        return Err(Error::UnknownField {
            model: schema.model_name().to_string(),
            field: unknown.clone(),
        });
    }

    for field in schema.fields() {
        if let Some(value) = attributes.get(field.name()).and_then(|a| a.value.as_ref()) {
            check_kind(schema, field, value)?;
        }
    }

    let value_of = |name: &str| attributes.get(name).and_then(|a| a.value.as_ref());

    let primary_key =
        derive_primary_key(schema.model_name(), value_of(schema.unique_key().name()))?;

    let mut index_keys = BTreeMap::new();
    for field in schema.fields().iter().filter(|f| f.role().is_indexed()) {
        let Some(value) = present(value_of(field.name())) else {
            continue;
        };
        index_keys.insert(
            field.name().to_string(),
            derive_index_key(schema.model_name(), field.name(), Some(value))?,
        );
    }

    Ok(Item {
        model_name: schema.model_name().to_string(),
        primary_key,
        index_keys,
        attributes,
    })
}

/// Translates a search bound on an indexed field into an index query.
///
/// Returns `None` when the bound cannot match anything (an inverted range).
pub(crate) fn index_query(
    schema: &ModelSchema,
    field: &FieldSpec,
    bound: &BoundCondition,
) -> Result<Option<IndexQuery>, Error> {
    let model_name = schema.model_name();
    match bound {
        BoundCondition::Value(value) => {
            check_kind(schema, field, value)?;
            Ok(Some(IndexQuery::Eq(derive_index_key(
                model_name,
                field.name(),
                Some(value),
            )?)))
        }
        BoundCondition::Prefix(prefix) => {
            if field.value_kind().is_some_and(|k| k != ValueKind::Str) {
                return Err(Error::validation(format!(
                    "{}.{} is not a string field, begins_with does not apply",
                    model_name,
                    field.name()
                )));
            }
            if prefix.is_empty() {
                return Err(Error::validation(format!(
                    "prefix for {}.{} is empty",
                    model_name,
                    field.name()
                )));
            }
            Ok(Some(IndexQuery::Prefix(format!(
                "{}{}",
                index_key_prefix(model_name, field.name()),
                prefix
            ))))
        }
        BoundCondition::Range(low, high) => {
            if low.kind() != high.kind() {
                return Err(Error::validation(format!(
                    "range bounds for {}.{} mix {} and {}",
                    model_name,
                    field.name(),
                    low.kind(),
                    high.kind()
                )));
            }
            check_kind(schema, field, low)?;
            let start = derive_index_key(model_name, field.name(), Some(low))?;
            let end = derive_index_key(model_name, field.name(), Some(high))?;
            if start > end {
                return Ok(None);
            }
            Ok(Some(IndexQuery::Range { start, end }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;
    use crate::schema::ModelRef;

    struct Person;
    struct Letter;

    fn person() -> &'static ModelSchema {
        static SCHEMA: LazyLock<ModelSchema> = LazyLock::new(|| {
            ModelSchema::new::<Person>(
                "person",
                vec![
                    FieldSpec::unique_key("name"),
                    FieldSpec::search_key("age"),
                    FieldSpec::plain("note"),
                ],
            )
            .unwrap()
        });
        &SCHEMA
    }

    fn letter() -> &'static ModelSchema {
        static SCHEMA: LazyLock<ModelSchema> = LazyLock::new(|| {
            ModelSchema::new::<Letter>(
                "letter",
                vec![
                    FieldSpec::unique_key("id"),
                    FieldSpec::relation("sender", ModelRef::new(person)),
                ],
            )
            .unwrap()
        });
        &SCHEMA
    }

    struct Gauge;

    fn gauge() -> &'static ModelSchema {
        static SCHEMA: LazyLock<ModelSchema> = LazyLock::new(|| {
            ModelSchema::new::<Gauge>(
                "gauge",
                vec![
                    FieldSpec::unique_key("id").of_kind(ValueKind::Int),
                    FieldSpec::search_key("label").of_kind(ValueKind::Str),
                    FieldSpec::search_key("level").of_kind(ValueKind::Float),
                ],
            )
            .unwrap()
        });
        &SCHEMA
    }

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone().into()))
            .collect()
    }

    #[test]
    fn primary_key_layout() {
        let key = derive_primary_key("user", Some(&Value::from("alice"))).unwrap();
        assert_eq!(key, "user#alice");
        let key = derive_primary_key("counter", Some(&Value::Int(1))).unwrap();
        assert_eq!(key, "counter#09223372036854775809");
    }

    #[test]
    fn missing_or_empty_values_never_form_keys() {
        assert!(matches!(
            derive_primary_key("user", None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            derive_primary_key("user", Some(&Value::from(""))),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            derive_index_key("user", "email", Some(&Value::from(""))),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn index_key_layout() {
        let key = derive_index_key("blogpost", "author", Some(&Value::from("test"))).unwrap();
        assert_eq!(key, "blogpost#author#test");
    }

    #[test]
    fn build_item_derives_keys_for_populated_fields() {
        let item = build_item(
            person(),
            attrs(&[("name", "bob".into()), ("age", Value::Int(30)), ("note", "hi".into())]),
        )
        .unwrap();
        assert_eq!(item.model_name, "person");
        assert_eq!(item.primary_key, "person#bob");
        assert_eq!(item.index_keys.len(), 1);
        assert_eq!(
            item.index_keys.get("age").map(String::as_str),
            Some("person#age#09223372036854775838")
        );

        let item = build_item(letter(), attrs(&[("id", "l1".into())])).unwrap();
        assert!(item.index_keys.is_empty());

        let item = build_item(
            letter(),
            attrs(&[("id", "l1".into()), ("sender", "bob".into())]),
        )
        .unwrap();
        assert_eq!(
            item.index_keys.get("sender").map(String::as_str),
            Some("letter#sender#bob")
        );
    }

    #[test]
    fn build_item_rejects_bad_input() {
        assert!(matches!(
            build_item(person(), attrs(&[("age", Value::Int(3))])),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            build_item(person(), attrs(&[("name", "x".into()), ("shoe", "9".into())])),
            Err(Error::UnknownField { field, .. }) if field == "shoe"
        ));
    }

    #[test]
    fn values_must_match_the_declared_kind() {
        let schema = gauge();
        assert!(build_item(schema, attrs(&[("id", Value::Int(1))])).is_ok());
        assert!(matches!(
            build_item(schema, attrs(&[("id", "09223372036854775809".into())])),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            build_item(schema, attrs(&[("id", Value::Int(1)), ("label", Value::Int(2))])),
            Err(Error::Validation(_))
        ));

        let level = schema.field("level").unwrap();
        assert!(index_query(schema, level, &BoundCondition::Value(Value::Float(0.5))).is_ok());
        for bound in [
            BoundCondition::Value(Value::Int(1)),
            BoundCondition::Prefix("0".into()),
            BoundCondition::Range(Value::Int(1), Value::Int(2)),
        ] {
            assert!(
                matches!(index_query(schema, level, &bound), Err(Error::Validation(_))),
                "{bound:?}"
            );
        }
        let label = schema.field("label").unwrap();
        assert!(index_query(schema, label, &BoundCondition::Prefix("a".into())).is_ok());
    }

    #[test]
    fn range_queries() {
        let schema = person();
        let age = schema.field("age").unwrap();
        let query = index_query(
            schema,
            age,
            &BoundCondition::Range(Value::Int(18), Value::Int(65)),
        )
        .unwrap();
        assert!(matches!(query, Some(IndexQuery::Range { .. })));

        let inverted = index_query(
            schema,
            age,
            &BoundCondition::Range(Value::Int(65), Value::Int(18)),
        )
        .unwrap();
        assert!(inverted.is_none());

        assert!(matches!(
            index_query(schema, age, &BoundCondition::Range(Value::Int(1), "z".into())),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn prefix_queries() {
        let schema = person();
        let age = schema.field("age").unwrap();
        let query = index_query(schema, age, &BoundCondition::Prefix("09".into())).unwrap();
        assert!(matches!(query, Some(IndexQuery::Prefix(p)) if p == "person#age#09"));
        assert!(index_query(schema, age, &BoundCondition::Prefix(String::new())).is_err());
    }
}
