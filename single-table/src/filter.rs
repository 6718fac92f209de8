use std::{fmt, marker::PhantomData};

use crate::{Item, Model, Table, engine::QueryEngine, error::Error, store::Store, value::Value};

#[derive(Debug, Clone, PartialEq)]
pub enum BoundCondition {
    Value(Value),
    /// String prefix of the stored value.
    Prefix(String),
    /// Inclusive bounds of the same value kind.
    Range(Value, Value),
}

/// A typed handle on one field of model `T`, generated by `#[derive(Model)]`.
pub struct Field<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({})", self.name)
    }
}

impl<T> Field<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn condition(&self, bound: BoundCondition) -> Condition<T> {
        Condition {
            field: self.name,
            bound,
            _marker: PhantomData,
        }
    }

    pub fn eq(&self, value: impl Into<Value>) -> Condition<T> {
        self.condition(BoundCondition::Value(value.into()))
    }

    pub fn begins_with(&self, prefix: impl Into<String>) -> Condition<T> {
        self.condition(BoundCondition::Prefix(prefix.into()))
    }

    pub fn between(&self, low: impl Into<Value>, high: impl Into<Value>) -> Condition<T> {
        self.condition(BoundCondition::Range(low.into(), high.into()))
    }
}

/// A search predicate on one field of model `T`.
pub struct Condition<T> {
    field: &'static str,
    bound: BoundCondition,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Condition<T> {
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn bound(&self) -> &BoundCondition {
        &self.bound
    }
}

impl<T> fmt::Debug for Condition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("field", &self.field)
            .field("bound", &self.bound)
            .finish()
    }
}

/// The pending result of a search. Nothing is read until one of the
/// accessors runs.
pub struct Filter<'a, S, T> {
    table: &'a Table<S>,
    condition: Condition<T>,
}

impl<'a, S, T> Filter<'a, S, T>
where
    S: Store,
    T: Model,
{
    pub(crate) fn new(table: &'a Table<S>, condition: Condition<T>) -> Self {
        Self { table, condition }
    }

    /// Matching items as stored.
    pub async fn items(&self) -> Result<Vec<Item>, Error> {
        QueryEngine::new(self.table, T::schema())?
            .search(self.condition.field, &self.condition.bound)
            .await
    }

    pub async fn all(&self) -> Result<Vec<T>, Error> {
        self.items()
            .await?
            .iter()
            .map(Item::to_model::<T>)
            .collect()
    }

    /// The first match, if any.
    pub async fn single(&self) -> Result<Option<T>, Error> {
        self.items()
            .await?
            .first()
            .map(Item::to_model::<T>)
            .transpose()
    }

    pub async fn count(&self) -> Result<usize, Error> {
        Ok(self.items().await?.len())
    }
}
