use std::{
    any::{TypeId, type_name},
    collections::HashMap,
    fmt,
};

use crate::{
    Model, ModelMeta,
    error::{Error, SchemaError},
    keyspace::SEPARATOR,
    value::ValueKind,
};

/// Storage role of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    Plain,
    UniqueKey,
    SearchKey,
    Relation,
}

impl FieldRole {
    /// Roles that carry a derived secondary index key.
    pub fn is_indexed(self) -> bool {
        matches!(self, FieldRole::SearchKey | FieldRole::Relation)
    }
}

/// Points at another model by identity.
///
/// Holds the schema accessor rather than the schema, so a model may refer to
/// itself or to a model whose schema has not been built yet.
#[derive(Clone, Copy)]
pub struct ModelRef(fn() -> &'static ModelSchema);

impl ModelRef {
    pub const fn new(schema: fn() -> &'static ModelSchema) -> Self {
        ModelRef(schema)
    }

    pub fn of<T: Model>() -> Self {
        ModelRef(T::schema)
    }

    pub fn schema(&self) -> &'static ModelSchema {
        (self.0)()
    }

    pub fn id(&self) -> TypeId {
        self.schema().id()
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelRef({})", self.schema().model_name())
    }
}

/// Declarative descriptor of one model attribute.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: &'static str,
    role: FieldRole,
    referenced_model: Option<ModelRef>,
    raise_if_missing: bool,
    kind: Option<ValueKind>,
}

impl FieldSpec {
    const fn with_role(name: &'static str, role: FieldRole) -> Self {
        FieldSpec {
            name,
            role,
            referenced_model: None,
            raise_if_missing: false,
            kind: None,
        }
    }

    pub const fn plain(name: &'static str) -> Self {
        Self::with_role(name, FieldRole::Plain)
    }

    pub const fn unique_key(name: &'static str) -> Self {
        Self::with_role(name, FieldRole::UniqueKey)
    }

    pub const fn search_key(name: &'static str) -> Self {
        Self::with_role(name, FieldRole::SearchKey)
    }

    pub const fn relation(name: &'static str, target: ModelRef) -> Self {
        FieldSpec {
            name,
            role: FieldRole::Relation,
            referenced_model: Some(target),
            raise_if_missing: false,
            kind: None,
        }
    }

    /// Makes writes fail when the referenced item does not exist.
    pub const fn raise_if_missing(mut self, raise: bool) -> Self {
        self.raise_if_missing = raise;
        self
    }

    /// Restricts the field to one value kind. Fields without a kind accept
    /// any value.
    pub const fn of_kind(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value_kind(&self) -> Option<ValueKind> {
        self.kind
    }

    pub fn role(&self) -> FieldRole {
        self.role
    }

    pub fn referenced_model(&self) -> Option<&'static ModelSchema> {
        self.referenced_model.as_ref().map(ModelRef::schema)
    }

    pub fn raises_if_missing(&self) -> bool {
        self.raise_if_missing
    }

    pub fn references(&self, model: TypeId) -> bool {
        self.referenced_model
            .as_ref()
            .is_some_and(|target| target.id() == model)
    }
}

/// The field layout of one model type. Built once, never mutated.
#[derive(Debug)]
pub struct ModelSchema {
    id: TypeId,
    type_name: &'static str,
    model_name: &'static str,
    fields: Vec<FieldSpec>,
    unique_key: usize,
}

fn validate_name(name: &str) -> Result<(), SchemaError> {
    if name.is_empty() || name.contains(SEPARATOR) {
        return Err(SchemaError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl ModelSchema {
    pub fn new<T: 'static>(
        model_name: &'static str,
        fields: Vec<FieldSpec>,
    ) -> Result<Self, SchemaError> {
        validate_name(model_name)?;

        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            validate_name(field.name)?;
            if !seen.insert(field.name) {
                return Err(SchemaError::DuplicateField {
                    model: model_name.to_string(),
                    field: field.name.to_string(),
                });
            }
        }

        let unique_keys: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.role == FieldRole::UniqueKey)
            .map(|(i, _)| i)
            .collect();
        let unique_key = match unique_keys.as_slice() {
            [index] => *index,
            [] => return Err(SchemaError::MissingUniqueKey(model_name.to_string())),
            _ => {
                return Err(SchemaError::MultipleUniqueKeys {
                    model: model_name.to_string(),
                    fields: unique_keys
                        .iter()
                        .map(|i| fields[*i].name.to_string())
                        .collect(),
                });
            }
        };

        Ok(ModelSchema {
            id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            model_name,
            fields,
            unique_key,
        })
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn require_field(&self, name: &str) -> Result<&FieldSpec, Error> {
        self.field(name).ok_or_else(|| Error::UnknownField {
            model: self.model_name.to_string(),
            field: name.to_string(),
        })
    }

    pub fn unique_key(&self) -> &FieldSpec {
        &self.fields[self.unique_key]
    }

    pub fn relations(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.role == FieldRole::Relation)
    }
}

/// The set of model types sharing one table.
#[derive(Debug, Default)]
pub struct Registry {
    models: Vec<&'static ModelSchema>,
    by_id: HashMap<TypeId, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            registry: Registry::default(),
            error: None,
        }
    }

    /// Collects every model declared with `#[derive(Model)]` in the process.
    pub fn discover() -> Result<Self, SchemaError> {
        let mut registry = Registry::default();
        for meta in inventory::iter::<ModelMeta>() {
            registry.insert((meta.schema)())?;
        }
        for schema in registry.models.iter() {
            registry.check_targets(schema)?;
        }
        Ok(registry)
    }

    fn insert(&mut self, schema: &'static ModelSchema) -> Result<(), SchemaError> {
        if self.by_id.contains_key(&schema.id()) {
            return Ok(());
        }
        if self
            .models
            .iter()
            .any(|m| m.model_name() == schema.model_name())
        {
            return Err(SchemaError::DuplicateModelName(
                schema.model_name().to_string(),
            ));
        }
        self.by_id.insert(schema.id(), self.models.len());
        self.models.push(schema);
        Ok(())
    }

    fn check_targets(&self, schema: &ModelSchema) -> Result<(), SchemaError> {
        for field in schema.relations() {
            let Some(target) = field.referenced_model() else {
                continue;
            };
            if target.id() != schema.id() && !self.by_id.contains_key(&target.id()) {
                return Err(SchemaError::UnregisteredTarget {
                    model: schema.model_name().to_string(),
                    field: field.name().to_string(),
                    target: target.model_name().to_string(),
                });
            }
            let kinds = (field.value_kind(), target.unique_key().value_kind());
            if let (Some(kind), Some(key_kind)) = kinds {
                if kind != key_kind {
                    return Err(SchemaError::RelationKindMismatch {
                        model: schema.model_name().to_string(),
                        field: field.name().to_string(),
                        kind: kind.name().to_string(),
                        target: target.model_name().to_string(),
                        key_kind: key_kind.name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: TypeId) -> Option<&'static ModelSchema> {
        self.by_id.get(&id).map(|i| self.models[*i])
    }

    pub fn contains(&self, schema: &ModelSchema) -> bool {
        self.by_id.contains_key(&schema.id())
    }

    pub(crate) fn ensure(&self, schema: &ModelSchema) -> Result<(), Error> {
        if !self.contains(schema) {
            return Err(Error::UnregisteredModel(schema.model_name().to_string()));
        }
        Ok(())
    }

    pub fn models(&self) -> impl Iterator<Item = &'static ModelSchema> + '_ {
        self.models.iter().copied()
    }

    /// Every relation field, across all models, that points at `target`.
    pub fn referrers(&self, target: TypeId) -> Vec<(&'static ModelSchema, &'static FieldSpec)> {
        self.models
            .iter()
            .copied()
            .flat_map(|schema| {
                schema
                    .relations()
                    .filter(move |f| f.references(target))
                    .map(move |f| (schema, f))
            })
            .collect()
    }
}

/// Builds a [`Registry`] in declaration order.
///
/// A relation may only target a model registered before its referrer, or the
/// referrer itself.
pub struct RegistryBuilder {
    registry: Registry,
    error: Option<SchemaError>,
}

impl RegistryBuilder {
    pub fn register<T: Model>(self) -> Self {
        self.register_schema(T::schema())
    }

    pub fn register_schema(mut self, schema: &'static ModelSchema) -> Self {
        if self.error.is_some() {
            return self;
        }
        let result = self
            .registry
            .check_targets(schema)
            .and_then(|_| self.registry.insert(schema));
        if let Err(e) = result {
            self.error = Some(e);
        }
        self
    }

    pub fn build(self) -> Result<Registry, SchemaError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.registry),
        }
    }
}
