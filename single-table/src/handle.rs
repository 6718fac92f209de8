use std::marker::PhantomData;

use crate::{
    Item, Model, Table,
    engine::QueryEngine,
    error::Error,
    filter::{Condition, Filter},
    keyspace,
    relation::{RelationResolver, Relations},
    store::Store,
    value::Value,
};

/// Operations on a model type.
pub struct ModelHandle<'a, S, T> {
    table: &'a Table<S>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, S, T> ModelHandle<'a, S, T>
where
    S: Store,
    T: Model,
{
    pub(crate) fn new(table: &'a Table<S>) -> Self {
        Self {
            table,
            _marker: PhantomData,
        }
    }

    fn engine(&self) -> Result<QueryEngine<'a, S>, Error> {
        QueryEngine::new(self.table, T::schema())
    }

    pub async fn get(&self, primary_key: &str) -> Result<Option<T>, Error> {
        self.get_item(primary_key)
            .await?
            .as_ref()
            .map(Item::to_model::<T>)
            .transpose()
    }

    pub async fn get_item(&self, primary_key: &str) -> Result<Option<Item>, Error> {
        self.engine()?.get(primary_key).await
    }

    /// Looks an item up by its unique key value.
    pub async fn find(&self, unique_value: impl Into<Value>) -> Result<Option<T>, Error> {
        self.engine()?
            .get_by_unique(&unique_value.into())
            .await?
            .as_ref()
            .map(Item::to_model::<T>)
            .transpose()
    }

    pub fn search(&self, condition: Condition<T>) -> Filter<'a, S, T> {
        Filter::new(self.table, condition)
    }

    pub async fn delete(&self, primary_key: &str) -> Result<bool, Error> {
        self.engine()?.delete(primary_key).await
    }
}

/// Operations on one model instance.
pub struct ItemHandle<'a, S, T> {
    table: &'a Table<S>,
    model: &'a T,
}

impl<'a, S, T> ItemHandle<'a, S, T>
where
    S: Store,
    T: Model,
{
    pub(crate) fn new(table: &'a Table<S>, model: &'a T) -> Self {
        Self { table, model }
    }

    fn engine(&self) -> Result<QueryEngine<'a, S>, Error> {
        QueryEngine::new(self.table, T::schema())
    }

    fn as_item(&self) -> Result<Item, Error> {
        keyspace::build_item(T::schema(), self.model.to_attributes())
    }

    pub fn primary_key(&self) -> Result<String, Error> {
        keyspace::derive_primary_key(
            T::schema().model_name(),
            self.model.unique_value().as_ref(),
        )
    }

    pub async fn create(&self) -> Result<Item, Error> {
        self.engine()?.create(self.model.to_attributes()).await
    }

    pub async fn update(&self) -> Result<Item, Error> {
        self.engine()?.update(self.model.to_attributes()).await
    }

    pub async fn delete(&self) -> Result<bool, Error> {
        let primary_key = self.primary_key()?;
        self.engine()?.delete(&primary_key).await
    }

    /// Items this instance points at through its relation fields.
    pub async fn get_relation(&self, selector: Relations) -> Result<Vec<Item>, Error> {
        RelationResolver::new(self.table)
            .get_relation(T::schema(), &self.as_item()?, &selector)
            .await
    }

    /// Items pointing at this instance through their relation fields.
    pub async fn get_reference(&self, selector: Relations) -> Result<Vec<Item>, Error> {
        RelationResolver::new(self.table)
            .get_reference(T::schema(), &self.as_item()?, &selector)
            .await
    }

    pub async fn related<U: Model>(&self) -> Result<Vec<U>, Error> {
        self.get_relation(Relations::model::<U>())
            .await?
            .iter()
            .map(Item::to_model::<U>)
            .collect()
    }

    pub async fn referencing<U: Model>(&self) -> Result<Vec<U>, Error> {
        self.get_reference(Relations::model::<U>())
            .await?
            .iter()
            .map(Item::to_model::<U>)
            .collect()
    }
}
