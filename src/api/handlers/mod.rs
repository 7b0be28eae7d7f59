mod auth;
mod books;
mod health;
mod members;
mod transactions;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::response::{ApiError, Pagination};
use crate::storage::Database;
use crate::AppState;

pub use auth::{login, me, register};
pub use books::{book_stats, create_book, delete_book, get_book, list_books, update_book};
pub use health::health;
pub use members::{
    create_member, delete_member, get_member, list_members, member_stats, update_member,
};
pub use transactions::{active_borrows, borrow_book, list_transactions, return_book};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

/// Body of a successful delete
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: u64,
    pub message: String,
}

/// Offset/limit window for list endpoints
#[derive(Debug, Clone, Copy)]
pub struct PaginationParams {
    pub limit: u32,
    pub offset: u32,
}

impl PaginationParams {
    /// Defaults missing values and rejects a zero or oversized limit.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Result<Self, ApiError> {
        let params = Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT),
            offset: offset.unwrap_or(0),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(ApiError::unprocessable(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Cut one page out of the full result set.
    pub fn apply<T>(&self, items: Vec<T>) -> (Vec<T>, Pagination) {
        let total = items.len() as u64;
        let page = items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect();
        (
            page,
            Pagination {
                limit: self.limit,
                offset: self.offset,
                total,
            },
        )
    }
}

/// Run a storage call on the blocking pool.
async fn with_db<F, T, E>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await?
        .map_err(Into::into)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}
