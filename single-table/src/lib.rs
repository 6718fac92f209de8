//! Typed models over one schemaless key-value table.
//!
//! Every model shares the table. Items are keyed by
//! `<model>#<unique key>`, search keys and relations get an index entry
//! `<model>#<field>#<value>`, and relations store the target's unique key
//! value. Relations resolve forward by point lookup and backward by index
//! search.

mod config;
mod db;
mod engine;
mod error;
mod filter;
mod guard;
mod handle;
mod item;
pub mod keyspace;
mod relation;
mod schema;
pub mod store;
mod value;

pub use config::{ENV_PAGE_SIZE, ENV_PD_ENDPOINTS, ENV_TABLE_NAME, TableConfig};
pub use db::Table;
pub use engine::QueryEngine;
pub use error::{Error, SchemaError, StoreError};
pub use filter::{BoundCondition, Condition, Field, Filter};
pub use guard::ConsistencyGuard;
pub use handle::{ItemHandle, ModelHandle};
pub use item::{Attributes, Item};
pub use relation::{RelationResolver, Relations};
pub use schema::{FieldRole, FieldSpec, ModelRef, ModelSchema, Registry, RegistryBuilder};
pub use single_table_derive::Model;
pub use store::{MemoryStore, Store};
#[cfg(feature = "tikv")]
pub use store::TikvStore;
pub use value::{AttributeValue, FromValue, ToValue, Value, ValueError, ValueKind, decode_field};

#[doc(hidden)]
pub use inventory;

// 模型元信息，供 Registry::discover 收集
pub struct ModelMeta {
    pub schema: fn() -> &'static ModelSchema,
}

impl std::fmt::Debug for ModelMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModelMeta {{ model: {} }}", (self.schema)().model_name())
    }
}

inventory::collect!(ModelMeta);

/// A model type stored in the shared table. Implement with `#[derive(Model)]`.
pub trait Model: Sized + 'static {
    fn schema() -> &'static ModelSchema;

    fn to_attributes(&self) -> Attributes;

    fn from_attributes(attributes: &Attributes) -> Result<Self, Error>;

    fn unique_value(&self) -> Option<Value> {
        self.to_attributes()
            .remove(Self::schema().unique_key().name())
            .and_then(|a| a.value)
    }
}
