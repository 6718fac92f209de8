use crate::{
    Item, Model, Table,
    engine::QueryEngine,
    error::Error,
    filter::{BoundCondition, Field},
    schema::{FieldRole, FieldSpec, ModelRef, ModelSchema},
    store::Store,
};

/// Which relation fields a lookup follows.
#[derive(Debug, Clone, Copy, Default)]
pub enum Relations {
    #[default]
    All,
    /// Fields connecting to one model.
    Model(ModelRef),
    /// Exactly one field, named together with the model declaring it.
    Field { owner: ModelRef, name: &'static str },
}

impl Relations {
    pub fn all() -> Self {
        Relations::All
    }

    pub fn model<T: Model>() -> Self {
        Relations::Model(ModelRef::of::<T>())
    }

    pub fn field<T: Model>(field: Field<T>) -> Self {
        Relations::Field {
            owner: ModelRef::of::<T>(),
            name: field.name(),
        }
    }
}

fn relation_field(owner: &'static ModelSchema, name: &str) -> Result<&'static FieldSpec, Error> {
    let field = owner.require_field(name)?;
    if field.role() != FieldRole::Relation {
        return Err(Error::validation(format!(
            "{}.{} is not a relation",
            owner.model_name(),
            name
        )));
    }
    Ok(field)
}

/// Follows relations in both directions.
///
/// Forward lookups read the target by primary key. Backward lookups search the
/// index entry every relation field carries.
pub struct RelationResolver<'a, S> {
    table: &'a Table<S>,
}

impl<'a, S: Store> RelationResolver<'a, S> {
    pub fn new(table: &'a Table<S>) -> Self {
        Self { table }
    }

    /// Items that `item`'s relation fields point at. Values that no longer
    /// resolve are skipped.
    pub async fn get_relation(
        &self,
        schema: &'static ModelSchema,
        item: &Item,
        selector: &Relations,
    ) -> Result<Vec<Item>, Error> {
        self.table.registry().ensure(schema)?;

        let fields: Vec<&'static FieldSpec> = match selector {
            Relations::All => schema.relations().collect(),
            Relations::Model(target) => {
                let target = target.id();
                schema.relations().filter(|f| f.references(target)).collect()
            }
            Relations::Field { owner, name } => {
                if owner.id() != schema.id() {
                    return Err(Error::validation(format!(
                        "{}.{} is not a field of {}",
                        owner.schema().model_name(),
                        name,
                        schema.model_name()
                    )));
                }
                vec![relation_field(schema, name)?]
            }
        };

        let mut related = Vec::new();
        for field in fields {
            let Some(value) = item.get(field.name()).filter(|v| !v.is_empty()) else {
                continue;
            };
            let Some(target) = field.referenced_model() else {
                continue;
            };
            if let Some(found) = QueryEngine::new(self.table, target)?
                .get_by_unique(value)
                .await?
            {
                related.push(found);
            }
        }
        Ok(related)
    }

    /// Items of any registered model whose relation fields point at `item`.
    pub async fn get_reference(
        &self,
        schema: &'static ModelSchema,
        item: &Item,
        selector: &Relations,
    ) -> Result<Vec<Item>, Error> {
        let registry = self.table.registry();
        registry.ensure(schema)?;

        let unique = schema.unique_key();
        let Some(value) = item.get(unique.name()).filter(|v| !v.is_empty()) else {
            return Err(Error::validation(format!(
                "unique key {}.{} is missing",
                schema.model_name(),
                unique.name()
            )));
        };

        let candidates = match selector {
            Relations::All => registry.referrers(schema.id()),
            Relations::Model(owner) => {
                let owner = owner.id();
                registry
                    .referrers(schema.id())
                    .into_iter()
                    .filter(|(model, _)| model.id() == owner)
                    .collect()
            }
            Relations::Field { owner, name } => {
                let owner = owner.schema();
                let field = relation_field(owner, name)?;
                if !field.references(schema.id()) {
                    return Err(Error::validation(format!(
                        "{}.{} does not reference {}",
                        owner.model_name(),
                        name,
                        schema.model_name()
                    )));
                }
                vec![(owner, field)]
            }
        };

        let bound = BoundCondition::Value(value.clone());
        let mut references = Vec::new();
        for (owner, field) in candidates {
            references.extend(
                QueryEngine::new(self.table, owner)?
                    .search(field.name(), &bound)
                    .await?,
            );
        }
        Ok(references)
    }
}
