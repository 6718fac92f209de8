use crate::{
    Item, Table, engine::QueryEngine, error::Error, keyspace, schema::ModelSchema, store::Store,
};

/// Write-time check of relation fields.
///
/// The check and the following write are separate store calls, so a target
/// can appear or vanish in between.
pub struct ConsistencyGuard<'a, S> {
    table: &'a Table<S>,
}

impl<'a, S: Store> ConsistencyGuard<'a, S> {
    pub fn new(table: &'a Table<S>) -> Self {
        Self { table }
    }

    /// Looks up every populated relation of `item`. A missing target aborts
    /// with [`Error::NotFound`] when the field raises on missing targets, and
    /// is kept as a dangling value otherwise.
    pub async fn check(&self, schema: &ModelSchema, item: &Item) -> Result<(), Error> {
        for field in schema.relations() {
            let Some(value) = item.get(field.name()).filter(|v| !v.is_empty()) else {
                continue;
            };
            let Some(target) = field.referenced_model() else {
                continue;
            };

            let found = QueryEngine::new(self.table, target)?
                .get_by_unique(value)
                .await?;
            if found.is_some() {
                continue;
            }

            if field.raises_if_missing() {
                let key = keyspace::derive_primary_key(target.model_name(), Some(value))?;
                log::info!(
                    "{}.{} references missing {}, refusing write of {}",
                    schema.model_name(),
                    field.name(),
                    key,
                    item.primary_key
                );
                return Err(Error::NotFound {
                    model: target.model_name().to_string(),
                    field: format!("{}.{}", schema.model_name(), field.name()),
                    key,
                });
            }
            log::debug!(
                "{}.{} = {} does not resolve, keeping dangling value",
                schema.model_name(),
                field.name(),
                value
            );
        }
        Ok(())
    }
}
