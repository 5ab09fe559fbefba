//! In-memory dish store
//!
//! Mirrors SqliteDishStore behavior for tests and local runs: names are
//! unique ASCII-case-insensitively, `create_or_update` keys on message_id
//! then name, and terminal statuses never regress.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::DishStore;
use crate::dish::{Dish, DishStatus};
use crate::{Error, Result};

struct StoredRow {
    dish: Dish,
    touched: u64,
}

#[derive(Default)]
struct State {
    rows: Vec<StoredRow>,
    next_id: i64,
    seq: u64,
}

/// In-memory dish store double
#[derive(Default)]
pub struct MemoryDishStore {
    state: Mutex<State>,
    fail_upserts: AtomicBool,
}

impl MemoryDishStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `create_or_update` calls fail
    pub fn set_fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Number of stored rows
    pub async fn row_count(&self) -> usize {
        self.state.lock().await.rows.len()
    }
}

impl State {
    fn touch(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn position_by_message_id(&self, message_id: Uuid) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.dish.message_id == Some(message_id))
    }

    fn position_by_name(&self, name: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.dish.name.eq_ignore_ascii_case(name))
    }
}

#[async_trait]
impl DishStore for MemoryDishStore {
    async fn find_by_message_id(&self, message_id: Uuid) -> Result<Option<Dish>> {
        let state = self.state.lock().await;
        Ok(state
            .position_by_message_id(message_id)
            .map(|i| state.rows[i].dish.clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Dish>> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .iter()
            .find(|r| r.dish.id == Some(id))
            .map(|r| r.dish.clone()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Dish>> {
        let state = self.state.lock().await;
        Ok(state
            .position_by_name(name)
            .map(|i| state.rows[i].dish.clone()))
    }

    async fn create_or_update(&self, dish: &Dish) -> Result<Dish> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(Error::Internal(
                "Store write refused (injected failure)".to_string(),
            ));
        }

        let mut state = self.state.lock().await;

        let position = dish
            .message_id
            .and_then(|mid| state.position_by_message_id(mid))
            .or_else(|| state.position_by_name(&dish.name));

        let stored = match position {
            Some(i) => {
                let touched = state.touch();
                let row = &mut state.rows[i];
                row.dish.name = dish.name.clone();
                row.dish.ingredients = dish.ingredients.clone();
                row.dish.status = dish.status;
                row.dish.message_id = dish.message_id;
                row.dish.channel_id = dish.channel_id;
                row.touched = touched;
                row.dish.clone()
            }
            None => {
                state.next_id += 1;
                let id = state.next_id;
                let touched = state.touch();
                let mut stored = dish.clone();
                stored.id = Some(id);
                state.rows.push(StoredRow {
                    dish: stored.clone(),
                    touched,
                });
                stored
            }
        };

        Ok(stored)
    }

    async fn update_status(&self, message_id: Uuid, status: DishStatus) -> Result<Option<Dish>> {
        let mut state = self.state.lock().await;

        let Some(i) = state.position_by_message_id(message_id) else {
            return Ok(None);
        };

        if state.rows[i].dish.status.can_transition_to(status) {
            let touched = state.touch();
            state.rows[i].dish.status = status;
            state.rows[i].touched = touched;
        }

        Ok(Some(state.rows[i].dish.clone()))
    }

    async fn list(&self) -> Result<Vec<Dish>> {
        let state = self.state.lock().await;
        let mut rows: Vec<(u64, Dish)> = state
            .rows
            .iter()
            .map(|r| (r.touched, r.dish.clone()))
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(rows.into_iter().map(|(_, dish)| dish).collect())
    }

    async fn delete_by_name(&self, name: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.rows.len();
        state.rows.retain(|r| !r.dish.name.eq_ignore_ascii_case(name));

        Ok(state.rows.len() < before)
    }
}
