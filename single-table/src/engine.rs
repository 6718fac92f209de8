use crate::{
    Attributes, Item, Table,
    error::Error,
    filter::BoundCondition,
    guard::ConsistencyGuard,
    keyspace::{self, SEARCH_INDEX, SEPARATOR},
    schema::{FieldRole, ModelSchema},
    store::{PutCondition, Store},
    value::Value,
};

/// CRUD against the shared table, scoped to one model.
pub struct QueryEngine<'a, S> {
    table: &'a Table<S>,
    schema: &'static ModelSchema,
}

impl<'a, S: Store> QueryEngine<'a, S> {
    pub fn new(table: &'a Table<S>, schema: &'static ModelSchema) -> Result<Self, Error> {
        table.registry().ensure(schema)?;
        Ok(Self { table, schema })
    }

    pub fn schema(&self) -> &'static ModelSchema {
        self.schema
    }

    /// Stores a new item. Fails with [`Error::DuplicateKey`] if the unique key
    /// is taken. Relations are checked before anything is written.
    pub async fn create(&self, attributes: Attributes) -> Result<Item, Error> {
        let item = keyspace::build_item(self.schema, attributes)?;
        ConsistencyGuard::new(self.table)
            .check(self.schema, &item)
            .await?;
        log::debug!("create {}", item.primary_key);
        self.table
            .store()
            .put_item(&item, PutCondition::NotExists)
            .await?;
        Ok(item)
    }

    /// Replaces the item stored under the primary key derived from
    /// `attributes`, index keys included.
    pub async fn update(&self, attributes: Attributes) -> Result<Item, Error> {
        let item = keyspace::build_item(self.schema, attributes)?;
        ConsistencyGuard::new(self.table)
            .check(self.schema, &item)
            .await?;
        log::debug!("update {}", item.primary_key);
        self.table
            .store()
            .put_item(&item, PutCondition::Always)
            .await?;
        Ok(item)
    }

    /// Point lookup. Keys of other models read as absent.
    pub async fn get(&self, primary_key: &str) -> Result<Option<Item>, Error> {
        let item = self.table.store().get_item(primary_key).await?;
        Ok(item.filter(|item| item.model_name == self.schema.model_name()))
    }

    pub async fn get_by_unique(&self, value: &Value) -> Result<Option<Item>, Error> {
        keyspace::check_kind(self.schema, self.schema.unique_key(), value)?;
        let primary_key = keyspace::derive_primary_key(self.schema.model_name(), Some(value))?;
        self.get(&primary_key).await
    }

    /// Items whose `field_name` satisfies `bound`. Unique keys are answered
    /// by a point lookup, search keys and relations through the index.
    pub async fn search(
        &self,
        field_name: &str,
        bound: &BoundCondition,
    ) -> Result<Vec<Item>, Error> {
        let field = self.schema.require_field(field_name)?;
        log::debug!("search {}.{} {:?}", self.schema.model_name(), field_name, bound);

        match field.role() {
            FieldRole::UniqueKey => match bound {
                BoundCondition::Value(value) => {
                    Ok(self.get_by_unique(value).await?.into_iter().collect())
                }
                _ => Err(Error::validation(format!(
                    "unique key {}.{} only supports equality",
                    self.schema.model_name(),
                    field_name
                ))),
            },
            FieldRole::SearchKey | FieldRole::Relation => {
                let Some(query) = keyspace::index_query(self.schema, field, bound)? else {
                    return Ok(Vec::new());
                };
                Ok(self
                    .table
                    .store()
                    .query_index(SEARCH_INDEX, &query)
                    .await?)
            }
            FieldRole::Plain => Err(Error::validation(format!(
                "{}.{} is not a search field",
                self.schema.model_name(),
                field_name
            ))),
        }
    }

    /// Removes the item. Items referencing it are left as they are.
    pub async fn delete(&self, primary_key: &str) -> Result<bool, Error> {
        let own_prefix = format!("{}{}", self.schema.model_name(), SEPARATOR);
        if !primary_key.starts_with(&own_prefix) {
            return Ok(false);
        }
        log::debug!("delete {}", primary_key);
        Ok(self.table.store().delete_item(primary_key).await?)
    }
}
