use std::sync::Arc;

use crate::{
    Model,
    engine::QueryEngine,
    error::Error,
    handle::{ItemHandle, ModelHandle},
    relation::RelationResolver,
    schema::{ModelSchema, Registry},
    store::Store,
};
#[cfg(feature = "tikv")]
use crate::{config::TableConfig, store::TikvStore};

/// One physical table and the models sharing it.
#[derive(Clone)]
pub struct Table<S> {
    store: S,
    registry: Arc<Registry>,
}

impl<S: Store> Table<S> {
    pub fn new(store: S, registry: Registry) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn model<T: Model>(&self) -> ModelHandle<'_, S, T> {
        ModelHandle::new(self)
    }

    pub fn item<'a, T: Model>(&'a self, model: &'a T) -> ItemHandle<'a, S, T> {
        ItemHandle::new(self, model)
    }

    /// Untyped access for models known only by schema.
    pub fn engine(&self, schema: &'static ModelSchema) -> Result<QueryEngine<'_, S>, Error> {
        QueryEngine::new(self, schema)
    }

    pub fn resolver(&self) -> RelationResolver<'_, S> {
        RelationResolver::new(self)
    }
}

#[cfg(feature = "tikv")]
impl Table<TikvStore> {
    pub async fn connect(config: &TableConfig, registry: Registry) -> Result<Self, Error> {
        let store = TikvStore::connect(config).await?;
        Ok(Self::new(store, registry))
    }
}
