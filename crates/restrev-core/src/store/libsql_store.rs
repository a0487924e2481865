//! libSQL implementation of `LocalStore`

use std::path::Path;
use std::sync::Arc;

use libsql::params::Params;
use libsql::{Connection, Value};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use super::connection::Database;
use super::local::LocalStore;
use super::schema::{KeyGenerator, Keyed, StoreKey, Table};
use crate::error::{Error, Result};

/// Local store backed by a single libSQL connection
///
/// The connection is locked for the duration of one logical operation.
#[derive(Clone)]
pub struct LibSqlStore {
    db: Arc<Mutex<Database>>,
}

impl LibSqlStore {
    /// Open (or create) the store at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreUnavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let db = Database::open(path).await.map_err(|e| {
            Error::StoreUnavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        Ok(Self::from_database(db))
    }

    /// Open an in-memory store (primarily for tests)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(Self::from_database(db))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Index column values for `value`, in declaration order
    fn index_values(table: Table, value: &JsonValue) -> Vec<Value> {
        table
            .indexes()
            .iter()
            .map(|index| {
                value
                    .get(*index)
                    .and_then(StoreKey::from_json)
                    .map_or(Value::Null, |key| key.to_sql())
            })
            .collect()
    }

    async fn insert(
        conn: &Connection,
        table: Table,
        key: Option<&StoreKey>,
        value: &JsonValue,
    ) -> Result<()> {
        let mut columns: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(key) = key {
            columns.push("store_key");
            params.push(key.to_sql());
        }
        columns.extend(table.indexes());
        params.extend(Self::index_values(table, value));
        columns.push("body");
        params.push(Value::Text(serde_json::to_string(value)?));

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({placeholders})",
            table.sql_name(),
            columns.join(", ")
        );
        conn.execute(&sql, Params::Positional(params)).await?;
        Ok(())
    }

    async fn select(
        conn: &Connection,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Keyed<JsonValue>>> {
        let mut rows = conn.query(sql, Params::Positional(params)).await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            let key = StoreKey::from_sql(row.get_value(0)?)?;
            let body: String = row.get(1)?;
            entries.push(Keyed::new(key, serde_json::from_str(&body)?));
        }
        Ok(entries)
    }
}

impl LocalStore for LibSqlStore {
    async fn get(&self, table: Table, key: &StoreKey) -> Result<Option<JsonValue>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT store_key, body FROM {} WHERE store_key = ?",
            table.sql_name()
        );
        let entries = Self::select(db.connection(), &sql, vec![key.to_sql()]).await?;
        Ok(entries.into_iter().next().map(|entry| entry.value))
    }

    async fn get_all(&self, table: Table) -> Result<Vec<Keyed<JsonValue>>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT store_key, body FROM {} ORDER BY store_key",
            table.sql_name()
        );
        Self::select(db.connection(), &sql, Vec::new()).await
    }

    async fn get_all_by_index(
        &self,
        table: Table,
        index: &str,
        value: &StoreKey,
    ) -> Result<Vec<Keyed<JsonValue>>> {
        let column = table.check_index(index)?;
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT store_key, body FROM {} WHERE {column} = ? ORDER BY store_key",
            table.sql_name()
        );
        Self::select(db.connection(), &sql, vec![value.to_sql()]).await
    }

    async fn put(&self, table: Table, value: &JsonValue) -> Result<StoreKey> {
        let key = table
            .key_path()
            .and_then(|path| value.get(path))
            .and_then(StoreKey::from_json);

        let key = match (key, table.key_generator()) {
            (Some(key), _) => key,
            (None, KeyGenerator::Provisional) => StoreKey::provisional(),
            (None, KeyGenerator::Sequence) => {
                let db = self.db.lock().await;
                let conn = db.connection();
                Self::insert(conn, table, None, value).await?;
                return Ok(StoreKey::Int(conn.last_insert_rowid()));
            }
            (None, KeyGenerator::Required) => {
                return Err(Error::Validation(format!(
                    "records in '{table}' must carry an '{}'",
                    table.key_path().unwrap_or("key")
                )));
            }
        };

        self.put_at(table, &key, value).await?;
        Ok(key)
    }

    async fn put_at(&self, table: Table, key: &StoreKey, value: &JsonValue) -> Result<()> {
        let db = self.db.lock().await;
        Self::insert(db.connection(), table, Some(key), value).await
    }

    async fn delete(&self, table: Table, key: &StoreKey) -> Result<()> {
        let db = self.db.lock().await;
        let sql = format!("DELETE FROM {} WHERE store_key = ?", table.sql_name());
        db.connection()
            .execute(&sql, Params::Positional(vec![key.to_sql()]))
            .await?;
        Ok(())
    }

    async fn seek(
        &self,
        table: Table,
        index: Option<(&str, &StoreKey)>,
        after: Option<&StoreKey>,
    ) -> Result<Option<Keyed<JsonValue>>> {
        let mut sql = format!("SELECT store_key, body FROM {} WHERE 1 = 1", table.sql_name());
        let mut params = Vec::new();

        if let Some((index, value)) = index {
            let column = table.check_index(index)?;
            sql.push_str(&format!(" AND {column} = ?"));
            params.push(value.to_sql());
        }
        if let Some(after) = after {
            sql.push_str(" AND store_key > ?");
            params.push(after.to_sql());
        }
        sql.push_str(" ORDER BY store_key LIMIT 1");

        let db = self.db.lock().await;
        let entries = Self::select(db.connection(), &sql, params).await?;
        Ok(entries.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::models::{Restaurant, Review, ReviewDraft};

    async fn store() -> LibSqlStore {
        LibSqlStore::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn put_uses_key_path() {
        let store = store().await;
        let key = store
            .put(Table::Restaurants, &json!({ "id": 7, "name": "A" }))
            .await
            .unwrap();
        assert_eq!(key, StoreKey::Int(7));

        let value = store.get(Table::Restaurants, &key).await.unwrap().unwrap();
        assert_eq!(value["name"], "A");
        assert!(store
            .get(Table::Restaurants, &StoreKey::Int(8))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn put_upserts_existing_record() {
        let store = store().await;
        store
            .put(Table::Restaurants, &json!({ "id": 1, "name": "Old" }))
            .await
            .unwrap();
        store
            .put(Table::Restaurants, &json!({ "id": 1, "name": "New" }))
            .await
            .unwrap();

        let all = store.get_all(Table::Restaurants).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value["name"], "New");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restaurants_require_an_id() {
        let store = store().await;
        let err = store
            .put(Table::Restaurants, &json!({ "name": "Nameless" }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reviews_without_id_get_provisional_keys() {
        let store = store().await;
        let review = ReviewDraft::new(42, "Al", 5, "Great").into_provisional(1);
        let key = store.put_typed(Table::Reviews, &review).await.unwrap();
        assert!(key.is_provisional());

        let stored: Review = store.get_typed(Table::Reviews, &key).await.unwrap().unwrap();
        assert_eq!(stored, review);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queue_keys_increase() {
        let store = store().await;
        let first = store
            .put(Table::OfflineQueue, &json!({ "n": 1 }))
            .await
            .unwrap();
        let second = store
            .put(Table::OfflineQueue, &json!({ "n": 2 }))
            .await
            .unwrap();
        store.delete(Table::OfflineQueue, &second).await.unwrap();
        let third = store
            .put(Table::OfflineQueue, &json!({ "n": 3 }))
            .await
            .unwrap();

        assert!(first < second);
        assert!(second < third);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_all_orders_integer_keys_first() {
        let store = store().await;
        let provisional = store
            .put(Table::Reviews, &json!({ "restaurant_id": 1, "name": "P", "rating": 3 }))
            .await
            .unwrap();
        store
            .put(Table::Reviews, &json!({ "id": 20, "restaurant_id": 1, "name": "B", "rating": 3 }))
            .await
            .unwrap();
        store
            .put(Table::Reviews, &json!({ "id": 3, "restaurant_id": 1, "name": "A", "rating": 3 }))
            .await
            .unwrap();

        let keys: Vec<StoreKey> = store
            .get_all(Table::Reviews)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.key)
            .collect();
        assert_eq!(keys, vec![StoreKey::Int(3), StoreKey::Int(20), provisional]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn index_lookup_matches_field_values() {
        let store = store().await;
        let mut favourite = Restaurant::new(1, "Fav");
        favourite.is_favourite = true;
        store.put_typed(Table::Restaurants, &favourite).await.unwrap();
        store
            .put_typed(Table::Restaurants, &Restaurant::new(2, "Plain"))
            .await
            .unwrap();

        let hits = store
            .get_all_by_index(Table::Restaurants, "is_favourite", &StoreKey::from("true"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, StoreKey::Int(1));

        assert!(store
            .get_all_by_index(Table::Restaurants, "name", &StoreKey::from("Fav"))
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cursor_updates_and_deletes_in_place() {
        let store = store().await;
        for (id, restaurant_id) in [(1, 10), (2, 11), (3, 10), (4, 10)] {
            store
                .put(
                    Table::Reviews,
                    &json!({ "id": id, "restaurant_id": restaurant_id, "name": "R", "rating": 1 }),
                )
                .await
                .unwrap();
        }

        let mut cursor = store.iterate_by_index(Table::Reviews, "restaurant_id", StoreKey::Int(10));
        let mut seen = Vec::new();
        while let Some(entry) = cursor.next().await.unwrap() {
            seen.push(entry.key.clone());
            match entry.key {
                StoreKey::Int(1) => cursor.delete().await.unwrap(),
                StoreKey::Int(3) => {
                    let mut value = entry.value;
                    value["rating"] = json!(5);
                    cursor.update(&value).await.unwrap();
                }
                _ => {}
            }
        }

        assert_eq!(seen, vec![StoreKey::Int(1), StoreKey::Int(3), StoreKey::Int(4)]);
        assert!(store.get(Table::Reviews, &StoreKey::Int(1)).await.unwrap().is_none());
        let updated = store.get(Table::Reviews, &StoreKey::Int(3)).await.unwrap().unwrap();
        assert_eq!(updated["rating"], 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cursor_sees_entries_added_ahead() {
        let store = store().await;
        store.put(Table::OfflineQueue, &json!({ "n": 1 })).await.unwrap();

        let mut cursor = store.iterate(Table::OfflineQueue);
        let first = cursor.next().await.unwrap().unwrap();
        assert_eq!(first.value["n"], 1);

        store.put(Table::OfflineQueue, &json!({ "n": 2 })).await.unwrap();
        let second = cursor.next().await.unwrap().unwrap();
        assert_eq!(second.value["n"], 2);
        assert!(cursor.next().await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cursor_without_entry_rejects_update() {
        let store = store().await;
        let cursor = store.iterate(Table::Restaurants);
        assert!(cursor.update(&json!({})).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn absent_store_is_unavailable() {
        let store: Option<LibSqlStore> = None;
        let err = store.get_all(Table::Restaurants).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
        assert!(err.is_storage());

        let mut cursor = store.iterate(Table::OfflineQueue);
        assert!(cursor.next().await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_store_survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("restrev.db");

        {
            let store = LibSqlStore::open(&path).await.unwrap();
            store
                .put_typed(Table::Restaurants, &Restaurant::new(5, "Kept"))
                .await
                .unwrap();
        }

        let store = LibSqlStore::open(&path).await.unwrap();
        let restaurant: Restaurant = store
            .get_typed(Table::Restaurants, &StoreKey::Int(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restaurant.name, "Kept");
    }
}
