//! Idempotent schema creation for both stores.
//!
//! The Corpus and the Vector Index live in separate database files, so each
//! gets its own migration and neither can join against the other.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let corpus = db::connect(&config.corpus.path).await?;
    migrate_corpus(&corpus).await?;
    corpus.close().await;

    let index = db::connect(&config.index.path).await?;
    migrate_index(&index).await?;
    index.close().await;

    Ok(())
}

pub async fn migrate_corpus(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            source TEXT NOT NULL,
            cuisine TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            ingredients_json TEXT NOT NULL DEFAULT '[]',
            instructions TEXT NOT NULL DEFAULT '',
            calories REAL NOT NULL DEFAULT 0,
            protein REAL NOT NULL DEFAULT 0,
            carbohydrates REAL NOT NULL DEFAULT 0,
            fat REAL NOT NULL DEFAULT 0,
            tags_json TEXT NOT NULL DEFAULT '[]',
            popularity_score INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            last_seen_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recipes_source ON recipes(source)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recipes_cuisine ON recipes(cuisine)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn migrate_index(pool: &SqlitePool) -> Result<()> {
    // Filter columns are denormalized so the goal predicate runs in SQL.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            name TEXT NOT NULL,
            source TEXT NOT NULL,
            cuisine TEXT NOT NULL,
            calories REAL NOT NULL,
            protein REAL NOT NULL,
            carbohydrates REAL NOT NULL,
            fat REAL NOT NULL,
            tags TEXT NOT NULL DEFAULT '',
            document TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for column in ["calories", "protein"] {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_vectors_{col} ON vectors({col})",
            col = column
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}
