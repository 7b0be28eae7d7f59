//! Borrow/return workflow.
//!
//! Each operation reads and writes the catalog, membership and ledger inside
//! a single [`UnitOfWork`]. redb serializes write transactions, so two
//! concurrent borrows of one book observe each other: the second sees the
//! book as `borrowed` and fails. Any early return drops the unit of work
//! uncommitted, so failed calls leave no trace.
//!
//! The clock is an argument; handlers pass `Utc::now()`.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::storage::models::{Book, BookStatus, Member, MemberStatus, NewTransaction};
use crate::storage::{Database, DatabaseError, UnitOfWork};

/// Longest loan a single borrow may request
pub const MAX_LOAN_DAYS: u32 = 365;

#[derive(Debug, Error)]
pub enum CirculationError {
    #[error("Book not found")]
    BookNotFound(u64),
    #[error("Book is not available")]
    BookUnavailable { book_id: u64, status: BookStatus },
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("due_days must be between 1 and {max}", max = MAX_LOAN_DAYS)]
    InvalidLoanPeriod(u32),
    #[error("Member is not active")]
    MemberInactive { member_id: u64, status: MemberStatus },
    #[error("Member not found")]
    MemberNotFound(u64),
    #[error("No active borrow record found")]
    NoActiveLoan { book_id: u64, member_id: u64 },
}

impl CirculationError {
    /// Business-rule rejections, as opposed to missing records or faults
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CirculationError::BookUnavailable { .. }
                | CirculationError::MemberInactive { .. }
                | CirculationError::NoActiveLoan { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BorrowReceipt {
    pub due_at: DateTime<Utc>,
    pub transaction_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnReceipt {
    pub is_late: bool,
    pub returned_at: DateTime<Utc>,
    pub transaction_id: u64,
}

/// Lend a book to a member for `loan_days` days starting at `now`.
pub fn borrow(
    db: &Database,
    book_id: u64,
    member_id: u64,
    loan_days: u32,
    now: DateTime<Utc>,
) -> Result<BorrowReceipt, CirculationError> {
    let uow = db.begin_unit_of_work()?;
    let (book, member) = load_pair(&uow, book_id, member_id)?;

    if loan_days == 0 || loan_days > MAX_LOAN_DAYS {
        return Err(CirculationError::InvalidLoanPeriod(loan_days));
    }

    if book.status != BookStatus::Available {
        tracing::debug!(book_id, status = book.status.as_str(), "Borrow refused");
        return Err(CirculationError::BookUnavailable {
            book_id,
            status: book.status,
        });
    }
    if member.status != MemberStatus::Active {
        tracing::debug!(member_id, status = member.status.as_str(), "Borrow refused");
        return Err(CirculationError::MemberInactive {
            member_id,
            status: member.status,
        });
    }

    let due_at = now + Duration::days(i64::from(loan_days));
    let txn = uow.append_transaction(NewTransaction::borrow(book_id, member_id, now, due_at))?;
    uow.put_book(&book.with_status(BookStatus::Borrowed, now))?;
    uow.put_member(&member.with_loan_opened(now))?;
    uow.commit()?;

    tracing::info!(
        transaction_id = txn.id,
        book_id,
        member_id,
        due_at = %due_at.to_rfc3339(),
        "Book borrowed"
    );

    Ok(BorrowReceipt {
        due_at,
        transaction_id: txn.id,
    })
}

/// Close the member's open loan of a book at `now`.
pub fn return_book(
    db: &Database,
    book_id: u64,
    member_id: u64,
    now: DateTime<Utc>,
) -> Result<ReturnReceipt, CirculationError> {
    let uow = db.begin_unit_of_work()?;
    let (book, member) = load_pair(&uow, book_id, member_id)?;

    let loan = uow
        .open_loan(book_id, member_id)?
        .ok_or(CirculationError::NoActiveLoan { book_id, member_id })?;

    let txn = uow.append_transaction(NewTransaction::return_of(book_id, member_id, now))?;
    uow.close_loan(&loan, now)?;
    uow.put_book(&book.with_status(BookStatus::Available, now))?;
    uow.put_member(&member.with_loan_closed(now))?;
    uow.commit()?;

    let is_late = loan.is_late_at(now);
    tracing::info!(
        transaction_id = txn.id,
        borrow_transaction_id = loan.transaction_id,
        book_id,
        member_id,
        is_late,
        "Book returned"
    );

    Ok(ReturnReceipt {
        is_late,
        returned_at: now,
        transaction_id: txn.id,
    })
}

fn load_pair(
    uow: &UnitOfWork,
    book_id: u64,
    member_id: u64,
) -> Result<(Book, Member), CirculationError> {
    let book = uow.book(book_id)?;
    let member = uow.member(member_id)?;
    match (book, member) {
        (Some(book), Some(member)) => Ok((book, member)),
        (None, _) => Err(CirculationError::BookNotFound(book_id)),
        (_, None) => Err(CirculationError::MemberNotFound(member_id)),
    }
}
