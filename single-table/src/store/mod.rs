//! The key-value store collaborator.
//!
//! A store keeps items by primary key and maintains one or more secondary
//! indexes from each item's derived index keys. It knows nothing about models.

use std::future::Future;

use crate::{Item, error::StoreError};

mod memory;
#[cfg(feature = "tikv")]
mod tikv;

pub use memory::MemoryStore;
#[cfg(feature = "tikv")]
pub use tikv::TikvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutCondition {
    /// Overwrite whatever is stored under the primary key.
    Always,
    /// Fail with [`StoreError::ConditionFailed`] if the primary key exists.
    NotExists,
}

/// Selects index entries by their derived index key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    Eq(String),
    Prefix(String),
    /// Inclusive on both ends.
    Range { start: String, end: String },
}

impl IndexQuery {
    /// Smallest index key the query can match.
    pub fn lower_bound(&self) -> &str {
        match self {
            IndexQuery::Eq(key) => key,
            IndexQuery::Prefix(prefix) => prefix,
            IndexQuery::Range { start, .. } => start,
        }
    }

    /// True when `index_key`, and every key ordered after it, can no longer
    /// match. Only meaningful for keys at or above [`Self::lower_bound`].
    pub fn is_past(&self, index_key: &str) -> bool {
        match self {
            IndexQuery::Eq(key) => index_key > key.as_str(),
            IndexQuery::Prefix(prefix) => {
                index_key > prefix.as_str() && !index_key.starts_with(prefix.as_str())
            }
            IndexQuery::Range { end, .. } => index_key > end.as_str(),
        }
    }

    pub fn matches(&self, index_key: &str) -> bool {
        match self {
            IndexQuery::Eq(key) => index_key == key,
            IndexQuery::Prefix(prefix) => index_key.starts_with(prefix.as_str()),
            IndexQuery::Range { start, end } => {
                index_key >= start.as_str() && index_key <= end.as_str()
            }
        }
    }
}

pub trait Store: Clone + Send + Sync + 'static {
    /// Writes `item` under its primary key, replacing the index entries of any
    /// previous version.
    fn put_item(
        &self,
        item: &Item,
        condition: PutCondition,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_item(
        &self,
        primary_key: &str,
    ) -> impl Future<Output = Result<Option<Item>, StoreError>> + Send;

    /// Items with an entry in `index_name` matching `query`, in index order.
    fn query_index(
        &self,
        index_name: &str,
        query: &IndexQuery,
    ) -> impl Future<Output = Result<Vec<Item>, StoreError>> + Send;

    /// Returns `false` when nothing was stored under the key.
    fn delete_item(&self, primary_key: &str)
    -> impl Future<Output = Result<bool, StoreError>> + Send;
}
