use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::{timestamp, with_db, DeletedResponse, PaginationParams};
use crate::api::response::{ApiError, AppJson, AppPath, AppQuery, JSend, JSendPaginated};
use crate::storage::models::{Book, BookFilter, BookPatch, BookStats, BookStatus, NewBook};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListBooksParams {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default, alias = "skip")]
    pub offset: Option<u32>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<BookStatus>,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub author: String,
    pub category: String,
    pub copies: u32,
    pub created_at: String,
    pub id: u64,
    pub isbn: String,
    pub status: BookStatus,
    pub title: String,
    pub updated_at: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_books(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListBooksParams>,
) -> Result<Json<JSendPaginated<BookResponse>>, ApiError> {
    let page = PaginationParams::new(params.limit, params.offset)?;
    let filter = BookFilter {
        category: params.category.filter(|c| !c.is_empty()),
        search: params.search,
        status: params.status,
    };

    let books = with_db(&state, move |db| db.list_books(&filter)).await?;
    let (books, pagination) = page.apply(books);
    let items = books.iter().map(book_to_response).collect();
    Ok(JSendPaginated::success(items, pagination))
}

pub async fn create_book(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<NewBook>,
) -> Result<(StatusCode, Json<JSend<BookResponse>>), ApiError> {
    req.validate()?;
    let book = with_db(&state, move |db| db.create_book(req)).await?;
    Ok(JSend::created(book_to_response(&book)))
}

pub async fn get_book(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<u64>,
) -> Result<Json<JSend<BookResponse>>, ApiError> {
    let book = with_db(&state, move |db| db.get_book(id)).await?;
    Ok(JSend::success(book_to_response(&book)))
}

pub async fn update_book(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<u64>,
    AppJson(req): AppJson<BookPatch>,
) -> Result<Json<JSend<BookResponse>>, ApiError> {
    req.validate()?;
    let book = with_db(&state, move |db| db.update_book(id, req)).await?;
    Ok(JSend::success(book_to_response(&book)))
}

pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<u64>,
) -> Result<Json<JSend<DeletedResponse>>, ApiError> {
    with_db(&state, move |db| db.delete_book(id)).await?;
    Ok(JSend::success(DeletedResponse {
        id,
        message: "Book deleted successfully".to_string(),
    }))
}

pub async fn book_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<BookStats>>, ApiError> {
    let stats = with_db(&state, |db| db.book_stats()).await?;
    Ok(JSend::success(stats))
}

fn book_to_response(book: &Book) -> BookResponse {
    BookResponse {
        author: book.author.clone(),
        category: book.category.clone(),
        copies: book.copies,
        created_at: timestamp(book.created_at),
        id: book.id,
        isbn: book.isbn.clone(),
        status: book.status,
        title: book.title.clone(),
        updated_at: timestamp(book.updated_at),
    }
}
