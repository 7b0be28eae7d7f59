//! End-to-end integration tests

use chrono::{DateTime, Duration, Utc};
use library_manager::circulation::{self, CirculationError};
use library_manager::storage::models::{
    BookFilter, BookStatus, MemberFilter, NewBook, NewMember, TransactionFilter, TransactionKind,
};
use library_manager::storage::{Database, StoreError};
use tempfile::TempDir;

fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

fn make_book(isbn: &str, title: &str) -> NewBook {
    NewBook {
        author: "Octavia E. Butler".to_string(),
        category: "Science Fiction".to_string(),
        copies: 1,
        isbn: isbn.to_string(),
        status: BookStatus::Available,
        title: title.to_string(),
    }
}

fn make_member(name: &str, email: &str) -> NewMember {
    NewMember {
        email: email.to_string(),
        membership_type: Default::default(),
        name: name.to_string(),
        phone: "555-0199".to_string(),
        status: Default::default(),
    }
}

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn test_borrow_return_lifecycle() {
    let (db, _temp) = setup_db();

    let book = db.create_book(make_book("978-0807083697", "Kindred")).unwrap();
    let member = db.create_member(make_member("Ada", "ada@example.com")).unwrap();
    let borrowed_at = at("2024-05-01T09:00:00Z");

    // Borrow for the default fourteen days
    let lent = circulation::borrow(&db, book.id, member.id, 14, borrowed_at).unwrap();
    assert_eq!(lent.due_at, at("2024-05-15T09:00:00Z"));
    assert_eq!(db.get_book(book.id).unwrap().status, BookStatus::Borrowed);
    assert_eq!(db.get_member(member.id).unwrap().active_loan_count, 1);

    let active = db.active_borrows(borrowed_at).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].book_title, "Kindred");
    assert_eq!(active[0].member_name, "Ada");

    // Return a day late
    let returned = circulation::return_book(&db, book.id, member.id, at("2024-05-16T09:00:00Z"))
        .unwrap();
    assert!(returned.is_late);
    assert_eq!(db.get_book(book.id).unwrap().status, BookStatus::Available);
    assert_eq!(db.get_member(member.id).unwrap().active_loan_count, 0);
    assert!(db.active_borrows(Utc::now()).unwrap().is_empty());

    let ledger = db.list_transactions(&TransactionFilter::default()).unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[0].kind, TransactionKind::Return);
    assert_eq!(ledger[1].returned_at, Some(returned.returned_at));
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let (book_id, member_id) = {
        let db = Database::open(temp_dir.path()).unwrap();
        let book = db.create_book(make_book("978-1", "Dawn")).unwrap();
        let member = db.create_member(make_member("Grace", "grace@example.com")).unwrap();
        circulation::borrow(&db, book.id, member.id, 7, Utc::now()).unwrap();
        (book.id, member.id)
    };

    let db = Database::open(temp_dir.path()).unwrap();
    assert_eq!(db.get_book(book_id).unwrap().status, BookStatus::Borrowed);

    // The open loan is still found after reopening
    circulation::return_book(&db, book_id, member_id, Utc::now()).unwrap();

    // Ids keep counting from where they left off
    let next = db.create_book(make_book("978-2", "Adulthood Rites")).unwrap();
    assert!(next.id > book_id);
}

#[tokio::test]
async fn test_failed_calls_leave_no_trace() {
    let (db, _temp) = setup_db();

    let book = db.create_book(make_book("978-1", "Parable of the Sower")).unwrap();
    let member = db.create_member(make_member("Lauren", "lauren@example.com")).unwrap();

    let err = circulation::return_book(&db, book.id, member.id, Utc::now()).unwrap_err();
    assert!(matches!(err, CirculationError::NoActiveLoan { .. }));

    let err = circulation::borrow(&db, book.id, member.id + 1, 14, Utc::now()).unwrap_err();
    assert!(matches!(err, CirculationError::MemberNotFound(_)));

    assert!(db
        .list_transactions(&TransactionFilter::default())
        .unwrap()
        .is_empty());
    assert_eq!(db.book_stats().unwrap().available, 1);
    assert_eq!(db.get_member(member.id).unwrap().active_loan_count, 0);
}

#[tokio::test]
async fn test_open_loan_blocks_deletes() {
    let (db, _temp) = setup_db();

    let book = db.create_book(make_book("978-1", "Wild Seed")).unwrap();
    let member = db.create_member(make_member("Anyanwu", "a@example.com")).unwrap();
    let lent = circulation::borrow(&db, book.id, member.id, 14, Utc::now()).unwrap();

    // Guards keep both records while the loan is open
    assert!(matches!(db.delete_book(book.id), Err(StoreError::Conflict(_))));
    assert!(matches!(db.delete_member(member.id), Err(StoreError::Conflict(_))));

    let active = db.active_borrows(Utc::now()).unwrap();
    assert_eq!(active[0].transaction_id, lent.transaction_id);
    assert_ne!(active[0].book_title, "Unknown");
}

#[tokio::test]
async fn test_overdue_report_uses_supplied_clock() {
    let (db, _temp) = setup_db();

    let book = db.create_book(make_book("978-1", "Fledgling")).unwrap();
    let member = db.create_member(make_member("Shori", "shori@example.com")).unwrap();
    let now = at("2024-01-10T00:00:00Z");
    let lent = circulation::borrow(&db, book.id, member.id, 3, now).unwrap();

    assert!(!db.active_borrows(lent.due_at).unwrap()[0].is_overdue);
    let later = lent.due_at + Duration::seconds(1);
    assert!(db.active_borrows(later).unwrap()[0].is_overdue);
}

#[tokio::test]
async fn test_catalog_and_membership_queries() {
    let (db, _temp) = setup_db();

    db.create_book(make_book("978-1", "Lilith's Brood")).unwrap();
    db.create_book(make_book("978-2", "Bloodchild")).unwrap();
    db.create_member(make_member("Ada", "ada@example.com")).unwrap();

    let search = BookFilter {
        search: Some("blood".to_string()),
        ..Default::default()
    };
    let found = db.list_books(&search).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Bloodchild");

    let members = db.list_members(&MemberFilter::default()).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(db.member_stats().unwrap().total_members, 1);
}
