//! Database access for dishwise
//!
//! SQLite-backed persistence for dishes and their ingredient lists.

pub mod dishes;
pub mod memory;

pub use dishes::{DishStore, SqliteDishStore};
pub use memory::MemoryDishStore;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize dish tables
///
/// Creates dishes, ingredients, and the join table if they don't exist.
/// Dish names are unique case-insensitively; ingredient order is kept in
/// the join table's position column.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dishes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL COLLATE NOCASE UNIQUE,
            status TEXT NOT NULL DEFAULT 'processing',
            message_id TEXT,
            channel_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dish_ingredients (
            dish_id INTEGER NOT NULL REFERENCES dishes(id),
            ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
            position INTEGER NOT NULL,
            PRIMARY KEY (dish_id, ingredient_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_dishes_message_id ON dishes(message_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (dishes, ingredients, dish_ingredients)");

    Ok(())
}
