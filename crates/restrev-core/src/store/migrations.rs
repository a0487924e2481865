//! Database migrations
//!
//! Each schema version is an explicit step keyed by a monotonic integer.
//! Logical tables keep their JSON body next to the store key and one column
//! per secondary index.

use crate::error::Result;
use libsql::Connection;

/// One schema step, applied in a single transaction
struct Migration {
    version: i32,
    description: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "restaurant cache",
        statements: &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Untyped key column: integer and text keys coexist, integers sort first
            "CREATE TABLE IF NOT EXISTS restaurants (
                store_key PRIMARY KEY NOT NULL,
                body TEXT NOT NULL
            )",
        ],
    },
    Migration {
        version: 2,
        description: "reviews and the offline mutation queue",
        statements: &[
            "CREATE TABLE IF NOT EXISTS reviews (
                store_key PRIMARY KEY NOT NULL,
                restaurant_id,
                body TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_reviews_restaurant_id ON reviews(restaurant_id)",
            "CREATE TABLE IF NOT EXISTS offline_queue (
                store_key INTEGER PRIMARY KEY AUTOINCREMENT,
                body TEXT NOT NULL
            )",
        ],
    },
    Migration {
        version: 3,
        description: "favourites index on restaurants",
        statements: &[
            "ALTER TABLE restaurants ADD COLUMN is_favourite",
            "UPDATE restaurants SET is_favourite = json_extract(body, '$.is_favourite')",
            "CREATE INDEX IF NOT EXISTS idx_restaurants_is_favourite ON restaurants(is_favourite)",
        ],
    },
];

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

/// Apply every migration newer than the stored version
pub async fn run(conn: &Connection) -> Result<()> {
    run_until(conn, CURRENT_VERSION).await
}

async fn run_until(conn: &Connection, target: i32) -> Result<()> {
    let current = get_version(conn).await?;
    for migration in MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current && migration.version <= target)
    {
        apply(conn, migration).await?;
    }
    Ok(())
}

/// Stored schema version; 0 for a fresh database
pub async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            (),
        )
        .await?;
    if rows.next().await?.is_none() {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;
    if let Err(error) = apply_statements(conn, migration).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error);
    }

    tracing::info!(
        "Migrated local store to version {} ({})",
        migration.version,
        migration.description
    );
    Ok(())
}

async fn apply_statements(conn: &Connection, migration: &Migration) -> Result<()> {
    for statement in migration.statements {
        conn.execute(statement, ()).await?;
    }
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        [migration.version],
    )
    .await?;
    conn.execute("COMMIT", ()).await?;
    Ok(())
}
