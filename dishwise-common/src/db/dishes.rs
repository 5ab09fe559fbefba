//! Dish store contract and SQLite implementation
//!
//! `create_or_update` keys on `message_id` when the correlation group
//! already has a row, and falls back to an upsert by name for initial
//! creation. A name collision between two correlation groups re-points the
//! row to the newer group. `update_status` only moves rows that are still
//! `processing`, so terminal states never regress.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::dish::{Dish, DishStatus};
use crate::{Error, Result};

/// Dish store contract consumed by worker and status correlator
#[async_trait]
pub trait DishStore: Send + Sync {
    /// Look up the dish created for a correlation group
    async fn find_by_message_id(&self, message_id: Uuid) -> Result<Option<Dish>>;

    /// Look up a dish by its store-assigned id
    async fn find_by_id(&self, id: i64) -> Result<Option<Dish>>;

    /// Look up a dish by name, case-insensitively
    async fn find_by_name(&self, name: &str) -> Result<Option<Dish>>;

    /// Create the dish row or update it in place, returning the stored form
    async fn create_or_update(&self, dish: &Dish) -> Result<Dish>;

    /// Move a row's status, refusing transitions out of terminal states
    ///
    /// Returns the current row (post-update or unchanged) or `None` when no
    /// row carries `message_id`.
    async fn update_status(&self, message_id: Uuid, status: DishStatus) -> Result<Option<Dish>>;

    /// All stored dishes, most recently touched first
    async fn list(&self) -> Result<Vec<Dish>>;

    /// Remove a dish and its ingredient links; true if a row existed
    async fn delete_by_name(&self, name: &str) -> Result<bool>;
}

/// SQLite-backed dish store
#[derive(Clone)]
pub struct SqliteDishStore {
    pool: SqlitePool,
}

impl SqliteDishStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Rebuild a full entity from a dishes row
    async fn rebuild(&self, row: sqlx::sqlite::SqliteRow) -> Result<Dish> {
        let id: i64 = row.get("id");
        let status: String = row.get("status");
        let status: DishStatus = status.parse()?;

        let message_id: Option<String> = row.get("message_id");
        let message_id = message_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| Error::Internal(format!("Failed to parse message_id: {}", e)))?;

        let channel_id: Option<String> = row.get("channel_id");
        let channel_id = channel_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| Error::Internal(format!("Failed to parse channel_id: {}", e)))?;

        let ingredients = self.ingredients_for(id).await?;

        Ok(Dish {
            id: Some(id),
            name: row.get("name"),
            ingredients,
            status,
            message_id,
            channel_id,
        })
    }

    async fn ingredients_for(&self, dish_id: i64) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT i.name
            FROM ingredients i
            JOIN dish_ingredients di ON di.ingredient_id = i.id
            WHERE di.dish_id = ?
            ORDER BY di.position
            "#,
        )
        .bind(dish_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    /// Replace a dish's ingredient links with the given ordered list
    ///
    /// Runs on the caller's transaction so a failed rewrite rolls the row
    /// write back with it.
    async fn replace_ingredients(
        conn: &mut sqlx::SqliteConnection,
        dish_id: i64,
        ingredients: &[String],
    ) -> Result<()> {
        sqlx::query("DELETE FROM dish_ingredients WHERE dish_id = ?")
            .bind(dish_id)
            .execute(&mut *conn)
            .await?;

        for (position, name) in ingredients.iter().enumerate() {
            sqlx::query("INSERT OR IGNORE INTO ingredients (name) VALUES (?)")
                .bind(name)
                .execute(&mut *conn)
                .await?;

            let ingredient_id: i64 =
                sqlx::query_scalar("SELECT id FROM ingredients WHERE name = ?")
                    .bind(name)
                    .fetch_one(&mut *conn)
                    .await?;

            sqlx::query(
                r#"
                INSERT INTO dish_ingredients (dish_id, ingredient_id, position)
                VALUES (?, ?, ?)
                ON CONFLICT(dish_id, ingredient_id) DO UPDATE SET
                    position = excluded.position
                "#,
            )
            .bind(dish_id)
            .bind(ingredient_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn fetch_row(&self, sql: &str, bind: &str) -> Result<Option<Dish>> {
        let row = sqlx::query(sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.rebuild(row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DishStore for SqliteDishStore {
    async fn find_by_message_id(&self, message_id: Uuid) -> Result<Option<Dish>> {
        self.fetch_row(
            "SELECT id, name, status, message_id, channel_id FROM dishes WHERE message_id = ?",
            &message_id.to_string(),
        )
        .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Dish>> {
        let row = sqlx::query(
            "SELECT id, name, status, message_id, channel_id FROM dishes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.rebuild(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Dish>> {
        self.fetch_row(
            "SELECT id, name, status, message_id, channel_id FROM dishes WHERE name = ?",
            name,
        )
        .await
    }

    async fn create_or_update(&self, dish: &Dish) -> Result<Dish> {
        let now = Utc::now().to_rfc3339();
        let message_id = dish.message_id.map(|id| id.to_string());
        let channel_id = dish.channel_id.map(|id| id.to_string());

        // One transaction: the row write and the ingredient rewrite land
        // together or not at all, so a failed rewrite cannot strand the
        // row in a terminal status with stale links.
        let mut tx = self.pool.begin().await?;

        // Subsequent writes for a known correlation group key on message_id
        let existing_id: Option<i64> = match &message_id {
            Some(mid) => {
                sqlx::query_scalar("SELECT id FROM dishes WHERE message_id = ?")
                    .bind(mid)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        let dish_id = match existing_id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE dishes
                    SET name = ?, status = ?, channel_id = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&dish.name)
                .bind(dish.status.as_str())
                .bind(&channel_id)
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await?;

                id
            }
            None => {
                // Initial creation keys on name; a collision with an
                // existing row hands that row to this correlation group.
                sqlx::query(
                    r#"
                    INSERT INTO dishes (name, status, message_id, channel_id, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(name) DO UPDATE SET
                        status = excluded.status,
                        message_id = excluded.message_id,
                        channel_id = excluded.channel_id,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(&dish.name)
                .bind(dish.status.as_str())
                .bind(&message_id)
                .bind(&channel_id)
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await?;

                sqlx::query_scalar("SELECT id FROM dishes WHERE name = ?")
                    .bind(&dish.name)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        Self::replace_ingredients(&mut tx, dish_id, &dish.ingredients).await?;

        tx.commit().await?;

        self.find_by_id(dish_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Dish {} vanished after upsert", dish_id)))
    }

    async fn update_status(&self, message_id: Uuid, status: DishStatus) -> Result<Option<Dish>> {
        let message_id = message_id.to_string();

        // Guarded transition: only rows still processing may move
        let result = sqlx::query(
            r#"
            UPDATE dishes
            SET status = ?, updated_at = ?
            WHERE message_id = ? AND status = 'processing'
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(&message_id)
        .execute(&self.pool)
        .await?;

        let current = self
            .fetch_row(
                "SELECT id, name, status, message_id, channel_id FROM dishes WHERE message_id = ?",
                &message_id,
            )
            .await?;

        if result.rows_affected() == 0 {
            if let Some(dish) = &current {
                tracing::debug!(
                    %message_id,
                    current = %dish.status,
                    requested = %status,
                    "Status update skipped, row already terminal"
                );
            }
        }

        Ok(current)
    }

    async fn list(&self) -> Result<Vec<Dish>> {
        let rows = sqlx::query(
            "SELECT id, name, status, message_id, channel_id FROM dishes ORDER BY updated_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut dishes = Vec::with_capacity(rows.len());
        for row in rows {
            dishes.push(self.rebuild(row).await?);
        }

        Ok(dishes)
    }

    async fn delete_by_name(&self, name: &str) -> Result<bool> {
        let dish_id: Option<i64> = sqlx::query_scalar("SELECT id FROM dishes WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        let Some(dish_id) = dish_id else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM dish_ingredients WHERE dish_id = ?")
            .bind(dish_id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM dishes WHERE id = ?")
            .bind(dish_id)
            .execute(&self.pool)
            .await?;

        Ok(true)
    }
}
