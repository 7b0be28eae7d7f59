use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::{timestamp, with_db, PaginationParams};
use crate::api::response::{ApiError, AppJson, AppQuery, JSend, JSendPaginated};
use crate::circulation;
use crate::storage::models::{ActiveBorrow, Transaction, TransactionFilter, TransactionKind};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct BorrowRequest {
    pub book_id: u64,
    /// Loan length in days; the configured default when omitted
    #[serde(default)]
    #[validate(range(min = 1, max = 365))]
    pub due_days: Option<u32>,
    pub member_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    pub book_id: u64,
    pub member_id: u64,
}

#[derive(Debug, Serialize)]
pub struct BorrowResponse {
    pub due_date: String,
    pub message: String,
    pub transaction_id: u64,
}

#[derive(Debug, Serialize)]
pub struct ReturnResponse {
    pub is_late: bool,
    pub message: String,
    pub return_date: String,
    pub transaction_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsParams {
    #[serde(default)]
    pub book_id: Option<u64>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub member_id: Option<u64>,
    #[serde(default, alias = "skip")]
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub book_id: u64,
    pub due_date: Option<String>,
    pub id: u64,
    pub kind: TransactionKind,
    pub member_id: u64,
    pub return_date: Option<String>,
    pub transaction_date: String,
}

#[derive(Debug, Serialize)]
pub struct ActiveBorrowResponse {
    pub book_id: u64,
    pub book_title: String,
    pub borrow_date: String,
    pub due_date: Option<String>,
    pub is_overdue: bool,
    pub member_id: u64,
    pub member_name: String,
    pub transaction_id: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<BorrowRequest>,
) -> Result<Json<JSend<BorrowResponse>>, ApiError> {
    req.validate()?;
    let loan_days = req
        .due_days
        .unwrap_or(state.config.circulation.default_loan_days);

    let receipt = with_db(&state, move |db| {
        circulation::borrow(db, req.book_id, req.member_id, loan_days, Utc::now())
    })
    .await?;

    Ok(JSend::success(BorrowResponse {
        due_date: timestamp(receipt.due_at),
        message: "Book borrowed successfully".to_string(),
        transaction_id: receipt.transaction_id,
    }))
}

pub async fn return_book(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ReturnRequest>,
) -> Result<Json<JSend<ReturnResponse>>, ApiError> {
    let receipt = with_db(&state, move |db| {
        circulation::return_book(db, req.book_id, req.member_id, Utc::now())
    })
    .await?;

    Ok(JSend::success(ReturnResponse {
        is_late: receipt.is_late,
        message: "Book returned successfully".to_string(),
        return_date: timestamp(receipt.returned_at),
        transaction_id: receipt.transaction_id,
    }))
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListTransactionsParams>,
) -> Result<Json<JSendPaginated<TransactionResponse>>, ApiError> {
    let page = PaginationParams::new(params.limit, params.offset)?;
    let filter = TransactionFilter {
        book_id: params.book_id,
        member_id: params.member_id,
    };

    let entries = with_db(&state, move |db| db.list_transactions(&filter)).await?;
    let (entries, pagination) = page.apply(entries);
    let items = entries.iter().map(transaction_to_response).collect();
    Ok(JSendPaginated::success(items, pagination))
}

pub async fn active_borrows(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<ActiveBorrowResponse>>>, ApiError> {
    let borrows = with_db(&state, |db| db.active_borrows(Utc::now())).await?;
    Ok(JSend::success(
        borrows.iter().map(active_borrow_to_response).collect(),
    ))
}

fn transaction_to_response(txn: &Transaction) -> TransactionResponse {
    TransactionResponse {
        book_id: txn.book_id,
        due_date: txn.due_at.map(timestamp),
        id: txn.id,
        kind: txn.kind,
        member_id: txn.member_id,
        return_date: txn.returned_at.map(timestamp),
        transaction_date: timestamp(txn.occurred_at),
    }
}

fn active_borrow_to_response(borrow: &ActiveBorrow) -> ActiveBorrowResponse {
    ActiveBorrowResponse {
        book_id: borrow.book_id,
        book_title: borrow.book_title.clone(),
        borrow_date: timestamp(borrow.borrowed_at),
        due_date: borrow.due_at.map(timestamp),
        is_overdue: borrow.is_overdue,
        member_id: borrow.member_id,
        member_name: borrow.member_name.clone(),
        transaction_id: borrow.transaction_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circulation::MAX_LOAN_DAYS;

    fn request(due_days: Option<u32>) -> BorrowRequest {
        BorrowRequest {
            book_id: 1,
            due_days,
            member_id: 1,
        }
    }

    #[test]
    fn test_due_days_range_matches_circulation_limit() {
        assert!(request(None).validate().is_ok());
        assert!(request(Some(1)).validate().is_ok());
        assert!(request(Some(MAX_LOAN_DAYS)).validate().is_ok());
        assert!(request(Some(0)).validate().is_err());
        assert!(request(Some(MAX_LOAN_DAYS + 1)).validate().is_err());
    }
}
