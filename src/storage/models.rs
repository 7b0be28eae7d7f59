use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// ============================================================================
// Catalog
// ============================================================================

/// Availability of a book. `Borrowed` is owned by the circulation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Available,
    Borrowed,
    Reserved,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Borrowed => "borrowed",
            BookStatus::Reserved => "reserved",
        }
    }
}

/// A catalog entry. Books with the same title/author are distinct by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub author: String,
    pub category: String,
    pub copies: u32,
    pub created_at: DateTime<Utc>,
    pub id: u64,
    pub isbn: String,
    pub status: BookStatus,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Snapshot of this book with a new status.
    pub fn with_status(&self, status: BookStatus, at: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at: at,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBook {
    #[validate(length(min = 1))]
    pub author: String,
    #[validate(length(min = 1))]
    pub category: String,
    #[serde(default = "default_copies")]
    #[validate(range(min = 1))]
    pub copies: u32,
    #[validate(length(min = 1))]
    pub isbn: String,
    #[serde(default)]
    pub status: BookStatus,
    #[validate(length(min = 1))]
    pub title: String,
}

fn default_copies() -> u32 {
    1
}

/// Partial book update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BookPatch {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub author: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub category: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub copies: Option<u32>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub isbn: Option<String>,
    #[serde(default)]
    pub status: Option<BookStatus>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub category: Option<String>,
    /// Case-insensitive substring over title, author and isbn
    pub search: Option<String>,
    pub status: Option<BookStatus>,
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(ref category) = self.category {
            if &book.category != category {
                return false;
            }
        }
        if let Some(status) = self.status {
            if book.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                [&book.title, &book.author, &book.isbn]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookStats {
    pub available: u64,
    pub borrowed: u64,
    pub reserved: u64,
    pub total_books: u64,
}

// ============================================================================
// Membership
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MembershipType {
    #[default]
    #[serde(alias = "Basic")]
    Basic,
    #[serde(alias = "Premium")]
    Premium,
    #[serde(alias = "VIP")]
    Vip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Expired,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Expired => "expired",
            MemberStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Open loans held by this member; maintained by the circulation workflow
    pub active_loan_count: u32,
    pub created_at: DateTime<Utc>,
    pub email: String,
    pub id: u64,
    pub joined_at: DateTime<Utc>,
    pub membership_type: MembershipType,
    pub name: String,
    pub phone: String,
    pub status: MemberStatus,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    /// Snapshot after a loan has been opened.
    pub fn with_loan_opened(&self, at: DateTime<Utc>) -> Self {
        Self {
            active_loan_count: self.active_loan_count.saturating_add(1),
            updated_at: at,
            ..self.clone()
        }
    }

    /// Snapshot after a loan has been closed. Never drops below zero.
    pub fn with_loan_closed(&self, at: DateTime<Utc>) -> Self {
        Self {
            active_loan_count: self.active_loan_count.saturating_sub(1),
            updated_at: at,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMember {
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub membership_type: MembershipType,
    #[validate(length(min = 1))]
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub status: MemberStatus,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MemberPatch {
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub membership_type: Option<MembershipType>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<MemberStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    /// Case-insensitive substring over name and email
    pub search: Option<String>,
    pub status: Option<MemberStatus>,
}

impl MemberFilter {
    pub fn matches(&self, member: &Member) -> bool {
        if let Some(status) = self.status {
            if member.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                member.name.to_lowercase().contains(&needle)
                    || member.email.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemberStats {
    pub active: u64,
    pub expired: u64,
    pub inactive: u64,
    pub total_members: u64,
}

// ============================================================================
// Credentials
// ============================================================================

/// A login account. Only `is_active` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub created_at: DateTime<Utc>,
    pub email: String,
    pub id: u64,
    pub is_active: bool,
    /// Argon2id PHC string
    pub password_hash: String,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub username: String,
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Borrow,
    Return,
}

/// A ledger entry. Immutable except `returned_at` on borrow entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub book_id: u64,
    /// Set on borrow entries only
    pub due_at: Option<DateTime<Utc>>,
    pub id: u64,
    pub kind: TransactionKind,
    pub member_id: u64,
    pub occurred_at: DateTime<Utc>,
    /// Set once, when the matching return is recorded
    pub returned_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_open(&self) -> bool {
        self.kind == TransactionKind::Borrow && self.returned_at.is_none()
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && self.due_at.is_some_and(|due| now > due)
    }

    /// The open loan this entry represents, if it is an unreturned borrow.
    pub fn as_open_loan(&self) -> Option<OpenLoan> {
        self.is_open().then(|| OpenLoan {
            book_id: self.book_id,
            borrowed_at: self.occurred_at,
            due_at: self.due_at,
            member_id: self.member_id,
            transaction_id: self.id,
        })
    }
}

/// Ledger entry before an id has been assigned.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub book_id: u64,
    pub due_at: Option<DateTime<Utc>>,
    pub kind: TransactionKind,
    pub member_id: u64,
    pub occurred_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn borrow(book_id: u64, member_id: u64, at: DateTime<Utc>, due_at: DateTime<Utc>) -> Self {
        Self {
            book_id,
            due_at: Some(due_at),
            kind: TransactionKind::Borrow,
            member_id,
            occurred_at: at,
        }
    }

    pub fn return_of(book_id: u64, member_id: u64, at: DateTime<Utc>) -> Self {
        Self {
            book_id,
            due_at: None,
            kind: TransactionKind::Return,
            member_id,
            occurred_at: at,
        }
    }
}

/// A borrow that has not been matched by a return yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenLoan {
    pub book_id: u64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    pub member_id: u64,
    pub transaction_id: u64,
}

impl OpenLoan {
    /// Strictly after the due date; returning exactly at `due_at` is on time.
    pub fn is_late_at(&self, at: DateTime<Utc>) -> bool {
        self.due_at.is_some_and(|due| at > due)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub book_id: Option<u64>,
    pub member_id: Option<u64>,
}

impl TransactionFilter {
    pub fn matches(&self, txn: &Transaction) -> bool {
        self.book_id.is_none_or(|id| txn.book_id == id)
            && self.member_id.is_none_or(|id| txn.member_id == id)
    }
}

/// Open borrow joined with the book title and member name for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveBorrow {
    pub book_id: u64,
    pub book_title: String,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub member_id: u64,
    pub member_name: String,
    pub transaction_id: u64,
}
