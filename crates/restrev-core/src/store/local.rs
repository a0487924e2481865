//! Local store contract and cursors

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::schema::{Keyed, StoreKey, Table};
use crate::error::{Error, Result};

/// Persistent key-value store over the logical tables
///
/// Records are JSON documents. Every operation may fail with
/// [`Error::StoreUnavailable`]; callers fall back to network-only operation.
#[allow(async_fn_in_trait)]
pub trait LocalStore {
    /// Get a record by key
    async fn get(&self, table: Table, key: &StoreKey) -> Result<Option<JsonValue>>;

    /// All records in ascending key order
    async fn get_all(&self, table: Table) -> Result<Vec<Keyed<JsonValue>>>;

    /// All records whose `index` field equals `value`, in ascending key order
    async fn get_all_by_index(
        &self,
        table: Table,
        index: &str,
        value: &StoreKey,
    ) -> Result<Vec<Keyed<JsonValue>>>;

    /// Upsert keyed by the table's key path, or by a generated key when the
    /// record carries none
    async fn put(&self, table: Table, value: &JsonValue) -> Result<StoreKey>;

    /// Upsert under an explicit key
    async fn put_at(&self, table: Table, key: &StoreKey, value: &JsonValue) -> Result<()>;

    /// Delete a record; deleting a missing key is not an error
    async fn delete(&self, table: Table, key: &StoreKey) -> Result<()>;

    /// First record strictly after `after`, optionally restricted to an index
    /// value. Cursors are built on this.
    async fn seek(
        &self,
        table: Table,
        index: Option<(&str, &StoreKey)>,
        after: Option<&StoreKey>,
    ) -> Result<Option<Keyed<JsonValue>>>;

    /// Get a record and decode it into a model type
    async fn get_typed<T: DeserializeOwned>(
        &self,
        table: Table,
        key: &StoreKey,
    ) -> Result<Option<T>> {
        match self.get(table, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Encode a model type and [`put`](Self::put) it
    async fn put_typed<T: Serialize>(&self, table: Table, value: &T) -> Result<StoreKey> {
        let value = serde_json::to_value(value)?;
        self.put(table, &value).await
    }

    /// Lazy cursor over the whole table
    fn iterate(&self, table: Table) -> Cursor<'_, Self>
    where
        Self: Sized,
    {
        Cursor::new(self, table, None)
    }

    /// Lazy cursor over the records matching an index value
    fn iterate_by_index(&self, table: Table, index: &str, value: StoreKey) -> Cursor<'_, Self>
    where
        Self: Sized,
    {
        Cursor::new(self, table, Some((index.to_string(), value)))
    }
}

/// Cursor over a table in ascending key order
///
/// Entries are fetched one at a time, so records deleted or added behind the
/// cursor do not disturb it.
pub struct Cursor<'a, S> {
    store: &'a S,
    table: Table,
    index: Option<(String, StoreKey)>,
    position: Option<StoreKey>,
    current: Option<StoreKey>,
}

impl<'a, S: LocalStore> Cursor<'a, S> {
    const fn new(store: &'a S, table: Table, index: Option<(String, StoreKey)>) -> Self {
        Self {
            store,
            table,
            index,
            position: None,
            current: None,
        }
    }

    /// Advance to the next entry
    pub async fn next(&mut self) -> Result<Option<Keyed<JsonValue>>> {
        let index = self
            .index
            .as_ref()
            .map(|(name, value)| (name.as_str(), value));
        let entry = self
            .store
            .seek(self.table, index, self.position.as_ref())
            .await?;

        self.current = entry.as_ref().map(|entry| entry.key.clone());
        if let Some(key) = &self.current {
            self.position = Some(key.clone());
        }
        Ok(entry)
    }

    /// Replace the current entry's record
    pub async fn update(&self, value: &JsonValue) -> Result<()> {
        let key = self.current_key()?;
        self.store.put_at(self.table, key, value).await
    }

    /// Delete the current entry
    pub async fn delete(&mut self) -> Result<()> {
        let key = self.current_key()?.clone();
        self.store.delete(self.table, &key).await?;
        self.current = None;
        Ok(())
    }

    fn current_key(&self) -> Result<&StoreKey> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::Validation("cursor has no current entry".to_string()))
    }
}

fn unavailable() -> Error {
    Error::StoreUnavailable("no local store is open".to_string())
}

/// An absent store: every call fails with [`Error::StoreUnavailable`]
impl<S: LocalStore> LocalStore for Option<S> {
    async fn get(&self, table: Table, key: &StoreKey) -> Result<Option<JsonValue>> {
        match self {
            Some(store) => store.get(table, key).await,
            None => Err(unavailable()),
        }
    }

    async fn get_all(&self, table: Table) -> Result<Vec<Keyed<JsonValue>>> {
        match self {
            Some(store) => store.get_all(table).await,
            None => Err(unavailable()),
        }
    }

    async fn get_all_by_index(
        &self,
        table: Table,
        index: &str,
        value: &StoreKey,
    ) -> Result<Vec<Keyed<JsonValue>>> {
        match self {
            Some(store) => store.get_all_by_index(table, index, value).await,
            None => Err(unavailable()),
        }
    }

    async fn put(&self, table: Table, value: &JsonValue) -> Result<StoreKey> {
        match self {
            Some(store) => store.put(table, value).await,
            None => Err(unavailable()),
        }
    }

    async fn put_at(&self, table: Table, key: &StoreKey, value: &JsonValue) -> Result<()> {
        match self {
            Some(store) => store.put_at(table, key, value).await,
            None => Err(unavailable()),
        }
    }

    async fn delete(&self, table: Table, key: &StoreKey) -> Result<()> {
        match self {
            Some(store) => store.delete(table, key).await,
            None => Err(unavailable()),
        }
    }

    async fn seek(
        &self,
        table: Table,
        index: Option<(&str, &StoreKey)>,
        after: Option<&StoreKey>,
    ) -> Result<Option<Keyed<JsonValue>>> {
        match self {
            Some(store) => store.seek(table, index, after).await,
            None => Err(unavailable()),
        }
    }
}
