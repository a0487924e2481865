//! libSQL connection backing the local store

use std::path::Path;

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use super::migrations;
use crate::error::Result;

/// A migrated libSQL database holding the local store tables
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open (or create) the store file at `path` and bring its schema up to date
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(&path.as_ref().to_string_lossy()).await
    }

    /// A throwaway store, used by tests and by clients without disk access
    pub async fn open_in_memory() -> Result<Self> {
        Self::build(":memory:").await
    }

    async fn build(location: &str) -> Result<Self> {
        let db = Builder::new_local(location).build().await?;
        let conn = db.connect()?;
        tune(&conn).await?;
        migrations::run(&conn).await?;
        Ok(Self { _db: db, conn })
    }

    pub async fn schema_version(&self) -> Result<i32> {
        migrations::get_version(&self.conn).await
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Pragmas for a single-writer local cache. WAL is best effort since
/// in-memory databases reject it.
async fn tune(conn: &Connection) -> Result<()> {
    for pragma in ["PRAGMA journal_mode = WAL;", "PRAGMA synchronous = NORMAL;"] {
        if let Err(error) = conn.execute(pragma, ()).await {
            tracing::debug!("Ignoring `{pragma}`: {error}");
        }
    }
    conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_store_is_migrated() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), migrations::CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reopening_a_file_keeps_rows() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("restrev.db");

        {
            let db = Database::open(&db_path).await.unwrap();
            db.connection()
                .execute(
                    "INSERT INTO restaurants (store_key, is_favourite, body) VALUES (1, 'false', '{}')",
                    (),
                )
                .await
                .unwrap();
        }

        // Reopening must keep data and not re-run migrations
        let db = Database::open(&db_path).await.unwrap();
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM restaurants", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 1);
        assert_eq!(db.schema_version().await.unwrap(), migrations::CURRENT_VERSION);
    }
}
