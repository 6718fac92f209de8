use std::{collections::HashMap, future::Future, pin::Pin};

use async_stream::try_stream;
use futures::{Stream, TryStreamExt};
use tikv_client::{Key, Snapshot, Transaction, TransactionClient, TransactionOptions};

use crate::{
    Item,
    config::TableConfig,
    error::StoreError,
    keyspace::SEARCH_INDEX,
    store::{IndexQuery, PutCondition, Store},
};

/// TiKV backed store. Every key lives under the table name, so several
/// tables can share one cluster.
#[derive(Clone)]
pub struct TikvStore {
    client: TransactionClient,
    namespace: String,
    page_size: u32,
}

fn item_path(namespace: &str, primary_key: &str) -> String {
    format!("{}/item/{}", namespace, primary_key)
}

fn index_root(namespace: &str, index_name: &str) -> String {
    format!("{}/index/{}/", namespace, index_name)
}

fn index_path(namespace: &str, index_name: &str, index_key: &str, primary_key: &str) -> String {
    format!(
        "{}{}\0{}",
        index_root(namespace, index_name),
        index_key,
        primary_key
    )
}

/// Smallest key strictly greater than `key`.
fn key_after(key: &Key) -> Key {
    let mut bytes = Into::<Vec<u8>>::into(key.clone());
    bytes.push(0);
    Key::from(bytes)
}

/// Smallest key greater than every key starting with `prefix`.
fn prefix_end(prefix: &str) -> Key {
    let mut bytes = prefix.as_bytes().to_vec();
    while let Some(last) = bytes.pop() {
        if last < 0xff {
            bytes.push(last + 1);
            return Key::from(bytes);
        }
    }
    // 全部为 0xff 时没有上界
    Key::from(Vec::new())
}

/// Scan range `[start, end)` over index entries selected by `query`.
fn index_range(namespace: &str, index_name: &str, query: &IndexQuery) -> (Key, Key) {
    let root = index_root(namespace, index_name);
    match query {
        IndexQuery::Eq(key) => (
            format!("{}{}\0", root, key).into(),
            format!("{}{}\x01", root, key).into(),
        ),
        IndexQuery::Prefix(prefix) => {
            let start = format!("{}{}", root, prefix);
            let end = prefix_end(&start);
            (start.into(), end)
        }
        IndexQuery::Range { start, end } => (
            format!("{}{}\0", root, start).into(),
            format!("{}{}\x01", root, end).into(),
        ),
    }
}

/// The index key an index row was written for. The row value holds the
/// primary key, which fixes where the index key ends even when it contains NUL.
fn row_index_key<'k>(root: &str, row_key: &'k str, primary_key: &str) -> Option<&'k str> {
    row_key
        .strip_prefix(root)?
        .strip_suffix(primary_key)?
        .strip_suffix('\0')
}

/// Rolls back after `err`. A failing rollback is logged, `err` still wins.
async fn abort<R>(rollback: R, err: StoreError) -> StoreError
where
    R: Future<Output = Result<(), tikv_client::Error>>,
{
    if let Err(e) = rollback.await {
        log::warn!("rollback after \"{}\" failed: {}", err, e);
    }
    err
}

fn key_to_string(key: &Key) -> Result<String, StoreError> {
    Ok(String::from_utf8(Into::<Vec<u8>>::into(key.clone()))?)
}

impl TikvStore {
    pub async fn connect(config: &TableConfig) -> Result<Self, StoreError> {
        let client = TransactionClient::new(config.pd_endpoints.clone()).await?;
        log::debug!(
            "connected to tikv {:?} as table {}",
            config.pd_endpoints,
            config.table_name
        );
        Ok(Self {
            client,
            namespace: config.table_name.clone(),
            page_size: config.page_size,
        })
    }

    /// Removes every key of this table.
    pub async fn drop_all(&self) -> Result<(), StoreError> {
        let mut txn = self.client.begin_optimistic().await?;
        match self.drop_all_in_txn(&mut txn).await {
            Ok(()) => {
                txn.commit().await?;
                Ok(())
            }
            Err(e) => Err(abort(txn.rollback(), e).await),
        }
    }

    async fn drop_all_in_txn(&self, txn: &mut Transaction) -> Result<(), StoreError> {
        let root = format!("{}/", self.namespace);
        let end_key = prefix_end(&root);
        let mut start_key: Key = root.into();
        loop {
            let keys = txn
                .scan_keys(start_key.clone()..end_key.clone(), self.page_size)
                .await?
                .collect::<Vec<_>>();
            let Some(last) = keys.last() else {
                break;
            };
            start_key = key_after(last);
            let len = keys.len();
            for key in keys {
                txn.delete(key).await?;
            }
            if len < self.page_size as usize {
                break;
            }
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.client.snapshot(
            self.client.current_timestamp().await?,
            TransactionOptions::new_optimistic(),
        ))
    }

    async fn put_in_txn(
        &self,
        txn: &mut Transaction,
        item: &Item,
        condition: PutCondition,
    ) -> Result<(), StoreError> {
        let data_key = item_path(&self.namespace, &item.primary_key);

        if let Some(data) = txn.get(data_key.clone()).await? {
            if condition == PutCondition::NotExists {
                return Err(StoreError::ConditionFailed(item.primary_key.clone()));
            }
            let old = Item::from_bytes(&item.primary_key, &data)?;
            for index_key in old.index_keys.values() {
                txn.delete(index_path(
                    &self.namespace,
                    SEARCH_INDEX,
                    index_key,
                    &old.primary_key,
                ))
                .await?;
            }
        }

        for index_key in item.index_keys.values() {
            txn.put(
                index_path(&self.namespace, SEARCH_INDEX, index_key, &item.primary_key),
                item.primary_key.clone(),
            )
            .await?;
        }
        txn.put(data_key, item.to_bytes()).await?;
        Ok(())
    }

    async fn delete_in_txn(
        &self,
        txn: &mut Transaction,
        primary_key: &str,
    ) -> Result<bool, StoreError> {
        let data_key = item_path(&self.namespace, primary_key);
        let Some(data) = txn.get(data_key.clone()).await? else {
            return Ok(false);
        };
        let old = Item::from_bytes(primary_key, &data)?;
        for index_key in old.index_keys.values() {
            txn.delete(index_path(
                &self.namespace,
                SEARCH_INDEX,
                index_key,
                primary_key,
            ))
            .await?;
        }
        txn.delete(data_key).await?;
        Ok(true)
    }

    /// Primary keys of the index entries matching `query`, paged.
    fn scan_index(
        &self,
        index_name: &str,
        query: &IndexQuery,
    ) -> Pin<Box<dyn Stream<Item = Result<String, StoreError>> + Send>> {
        let client = self.client.clone();
        let page_size = self.page_size;
        let root = index_root(&self.namespace, index_name);
        let query = query.clone();
        let (start, end_key) = index_range(&self.namespace, index_name, &query);

        Box::pin(try_stream! {
            let mut snapshot = client.snapshot(
                client.current_timestamp().await?,
                TransactionOptions::new_optimistic(),
            );
            let mut start_key = start;
            loop {
                let kvs = snapshot
                    .scan(start_key.clone()..end_key.clone(), page_size)
                    .await?
                    .collect::<Vec<_>>();
                let Some(last) = kvs.last() else {
                    break;
                };
                start_key = key_after(last.key());
                let len = kvs.len();

                for kv in kvs {
                    let row_key = key_to_string(kv.key())?;
                    let primary_key = String::from_utf8(kv.value().to_vec())?;
                    // NUL 之后的字节也可能落在扫描范围内
                    let matched = row_index_key(&root, &row_key, &primary_key)
                        .is_some_and(|k| query.matches(k));
                    if matched {
                        yield primary_key;
                    }
                }
                if len < page_size as usize {
                    break;
                }
            }
        })
    }
}

impl Store for TikvStore {
    async fn put_item(&self, item: &Item, condition: PutCondition) -> Result<(), StoreError> {
        let mut txn = self.client.begin_optimistic().await?;
        match self.put_in_txn(&mut txn, item, condition).await {
            Ok(()) => {
                txn.commit().await?;
                Ok(())
            }
            Err(e) => Err(abort(txn.rollback(), e).await),
        }
    }

    async fn get_item(&self, primary_key: &str) -> Result<Option<Item>, StoreError> {
        let mut snapshot = self.snapshot().await?;
        let Some(data) = snapshot
            .get(item_path(&self.namespace, primary_key))
            .await?
        else {
            return Ok(None);
        };
        Ok(Some(Item::from_bytes(primary_key, &data)?))
    }

    async fn query_index(
        &self,
        index_name: &str,
        query: &IndexQuery,
    ) -> Result<Vec<Item>, StoreError> {
        let primary_keys: Vec<String> = self.scan_index(index_name, query).try_collect().await?;
        if primary_keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut snapshot = self.snapshot().await?;
        let mut found = HashMap::new();
        for kv in snapshot
            .batch_get(
                primary_keys
                    .iter()
                    .map(|pk| item_path(&self.namespace, pk))
                    .collect::<Vec<_>>(),
            )
            .await?
        {
            let key = key_to_string(kv.key())?;
            let item = Item::from_bytes(&key, kv.value())?;
            found.insert(item.primary_key.clone(), item);
        }

        // 按索引顺序返回
        Ok(primary_keys
            .into_iter()
            .filter_map(|pk| found.remove(&pk))
            .collect())
    }

    async fn delete_item(&self, primary_key: &str) -> Result<bool, StoreError> {
        let mut txn = self.client.begin_optimistic().await?;
        match self.delete_in_txn(&mut txn, primary_key).await {
            Ok(deleted) => {
                txn.commit().await?;
                Ok(deleted)
            }
            Err(e) => Err(abort(txn.rollback(), e).await),
        }
    }
}
