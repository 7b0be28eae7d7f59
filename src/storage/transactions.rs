use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{decode, Database, DatabaseError, StoreError, UnitOfWork};
use super::models::{
    ActiveBorrow, Book, Member, NewTransaction, OpenLoan, Transaction, TransactionFilter,
    TransactionKind,
};
use super::tables::*;

const UNKNOWN: &str = "Unknown";

impl UnitOfWork {
    // ========================================================================
    // Ledger writes (only valid inside a unit of work)
    // ========================================================================

    /// Append a ledger entry. Borrow entries also open the (book, member) loan.
    pub fn append_transaction(&self, new: NewTransaction) -> Result<Transaction, DatabaseError> {
        let txn = Transaction {
            book_id: new.book_id,
            due_at: new.due_at,
            id: self.next_id("transactions")?,
            kind: new.kind,
            member_id: new.member_id,
            occurred_at: new.occurred_at,
            returned_at: None,
        };
        self.store(TRANSACTIONS, txn.id, &txn)?;

        if txn.kind == TransactionKind::Borrow {
            let mut open = self.open_loans()?;
            open.insert((txn.book_id, txn.member_id), txn.id)?;
        }

        Ok(txn)
    }

    /// The open borrow for a (book, member) pair, if any
    pub fn open_loan(&self, book_id: u64, member_id: u64) -> Result<Option<OpenLoan>, DatabaseError> {
        let transaction_id = {
            let open = self.open_loans()?;
            let id = open.get((book_id, member_id))?.map(|v| v.value());
            id
        };

        let Some(transaction_id) = transaction_id else {
            return Ok(None);
        };
        let txn: Option<Transaction> = self.load(TRANSACTIONS, transaction_id)?;
        Ok(txn.and_then(|t| t.as_open_loan()))
    }

    /// Stamp `returned_at` on the borrow entry and close the loan.
    /// A loan closes once; closing it again changes nothing.
    pub fn close_loan(&self, loan: &OpenLoan, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let txn: Option<Transaction> = self.load(TRANSACTIONS, loan.transaction_id)?;
        if let Some(mut txn) = txn {
            if txn.returned_at.is_none() {
                txn.returned_at = Some(at);
                self.store(TRANSACTIONS, txn.id, &txn)?;
            }
        }

        let mut open = self.open_loans()?;
        open.remove((loan.book_id, loan.member_id))?;
        Ok(())
    }

    pub fn book(&self, id: u64) -> Result<Option<Book>, DatabaseError> {
        self.load(BOOKS, id)
    }

    pub fn put_book(&self, book: &Book) -> Result<(), DatabaseError> {
        self.store(BOOKS, book.id, book)
    }

    pub fn member(&self, id: u64) -> Result<Option<Member>, DatabaseError> {
        self.load(MEMBERS, id)
    }

    pub fn put_member(&self, member: &Member) -> Result<(), DatabaseError> {
        self.store(MEMBERS, member.id, member)
    }
}

impl Database {
    // ========================================================================
    // Ledger reads
    // ========================================================================

    pub fn get_transaction(&self, id: u64) -> Result<Transaction, StoreError> {
        self.fetch(TRANSACTIONS, id)?.ok_or(StoreError::NotFound("Transaction"))
    }

    /// Ledger entries matching the filter, newest first
    pub fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, StoreError> {
        let entries: Vec<Transaction> = self.scan(TRANSACTIONS)?;
        let mut entries: Vec<Transaction> = entries
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();
        entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    /// Every open borrow joined with its book title and member name,
    /// in borrow order
    pub fn active_borrows(&self, now: DateTime<Utc>) -> Result<Vec<ActiveBorrow>, StoreError> {
        Ok(self.join_open_loans(now)?)
    }

    // One read snapshot, so the loans and the joined records agree
    fn join_open_loans(&self, now: DateTime<Utc>) -> Result<Vec<ActiveBorrow>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let open_table = read_txn.open_table(OPEN_LOANS)?;
        let ledger = read_txn.open_table(TRANSACTIONS)?;
        let books = read_txn.open_table(BOOKS)?;
        let members = read_txn.open_table(MEMBERS)?;

        let mut borrows = Vec::new();
        for result in open_table.iter()? {
            let (_, transaction_id) = result?;
            let txn: Transaction = match ledger.get(transaction_id.value())? {
                Some(data) => decode(data.value())?,
                None => continue,
            };
            let Some(loan) = txn.as_open_loan() else {
                continue;
            };

            let book_title = match books.get(loan.book_id)? {
                Some(data) => decode::<Book>(data.value())?.title,
                None => UNKNOWN.to_string(),
            };
            let member_name = match members.get(loan.member_id)? {
                Some(data) => decode::<Member>(data.value())?.name,
                None => UNKNOWN.to_string(),
            };

            borrows.push(ActiveBorrow {
                book_id: loan.book_id,
                book_title,
                borrowed_at: loan.borrowed_at,
                due_at: loan.due_at,
                is_overdue: txn.is_overdue_at(now),
                member_id: loan.member_id,
                member_name,
                transaction_id: loan.transaction_id,
            });
        }

        borrows.sort_by_key(|b| b.transaction_id);
        Ok(borrows)
    }
}
