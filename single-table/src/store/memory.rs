use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    Item,
    error::StoreError,
    keyspace::SEARCH_INDEX,
    store::{IndexQuery, PutCondition, Store},
};

/// In-process store with strongly consistent indexes.
///
/// Items are kept encoded, exactly as a remote store would hold them.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryTable>>,
}

#[derive(Default)]
struct MemoryTable {
    items: BTreeMap<String, Vec<u8>>,
    // (index name, index key, primary key)
    index: BTreeSet<(String, String, String)>,
    unavailable: bool,
}

impl MemoryTable {
    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::unavailable("memory store is unavailable"));
        }
        Ok(())
    }

    fn decode(&self, primary_key: &str) -> Result<Option<Item>, StoreError> {
        self.items
            .get(primary_key)
            .map(|data| Item::from_bytes(primary_key, data))
            .transpose()
    }

    fn unindex(&mut self, item: &Item) {
        for index_key in item.index_keys.values() {
            self.index.remove(&(
                SEARCH_INDEX.to_string(),
                index_key.clone(),
                item.primary_key.clone(),
            ));
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryTable>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryTable>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }

    /// Makes every following call fail as a transient store error.
    pub fn set_unavailable(&self, unavailable: bool) -> Result<(), StoreError> {
        self.write()?.unavailable = unavailable;
        Ok(())
    }

    /// The encoded bytes stored under a primary key.
    pub fn raw(&self, primary_key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.read()?.items.get(primary_key).cloned())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.items.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn drop_all(&self) -> Result<(), StoreError> {
        let mut table = self.write()?;
        table.items.clear();
        table.index.clear();
        Ok(())
    }
}

impl Store for MemoryStore {
    async fn put_item(&self, item: &Item, condition: PutCondition) -> Result<(), StoreError> {
        let mut table = self.write()?;
        table.check()?;

        if let Some(old) = table.decode(&item.primary_key)? {
            if condition == PutCondition::NotExists {
                return Err(StoreError::ConditionFailed(item.primary_key.clone()));
            }
            table.unindex(&old);
        }

        for index_key in item.index_keys.values() {
            table.index.insert((
                SEARCH_INDEX.to_string(),
                index_key.clone(),
                item.primary_key.clone(),
            ));
        }
        table
            .items
            .insert(item.primary_key.clone(), item.to_bytes());
        Ok(())
    }

    async fn get_item(&self, primary_key: &str) -> Result<Option<Item>, StoreError> {
        let table = self.read()?;
        table.check()?;
        table.decode(primary_key)
    }

    async fn query_index(
        &self,
        index_name: &str,
        query: &IndexQuery,
    ) -> Result<Vec<Item>, StoreError> {
        let table = self.read()?;
        table.check()?;

        let from = (
            index_name.to_string(),
            query.lower_bound().to_string(),
            String::new(),
        );
        let mut items = Vec::new();
        for (_, _, primary_key) in table
            .index
            .range(from..)
            .take_while(|(name, key, _)| name == index_name && !query.is_past(key))
            .filter(|(_, key, _)| query.matches(key))
        {
            if let Some(item) = table.decode(primary_key)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn delete_item(&self, primary_key: &str) -> Result<bool, StoreError> {
        let mut table = self.write()?;
        table.check()?;

        let Some(old) = table.decode(primary_key)? else {
            return Ok(false);
        };
        table.unindex(&old);
        table.items.remove(primary_key);
        Ok(true)
    }
}
