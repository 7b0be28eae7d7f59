use redb::{
    Database as RedbDatabase, ReadTransaction, ReadableTable, ReadableTableMetadata,
    Table, WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// Outcome of a catalog, membership or credential store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("{0}")]
    Invalid(String),
    #[error("{0} not found")]
    NotFound(&'static str),
}

/// Handle to the embedded store. Cheap to clone; clones share one redb file.
#[derive(Clone)]
pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("library.redb");
        let db = RedbDatabase::create(db_path)?;

        // Create tables up front so read transactions never see a missing table
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BOOKS)?;
            let _ = write_txn.open_table(MEMBERS)?;
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(BOOK_ISBNS)?;
            let _ = write_txn.open_table(MEMBER_EMAILS)?;
            let _ = write_txn.open_table(ACCOUNT_USERNAMES)?;
            let _ = write_txn.open_table(ACCOUNT_EMAILS)?;
            let _ = write_txn.open_table(OPEN_LOANS)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin an atomic unit of work. Dropping it without `commit` rolls back.
    pub fn begin_unit_of_work(&self) -> Result<UnitOfWork, DatabaseError> {
        Ok(UnitOfWork {
            txn: self.db.begin_write()?,
        })
    }

    /// Read one record by id
    pub(crate) fn fetch<T: DeserializeOwned>(
        &self,
        table_def: RecordTable,
        id: u64,
    ) -> Result<Option<T>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(table_def)?;

        let record = match table.get(id)? {
            Some(data) => Some(decode(data.value())?),
            None => None,
        };
        Ok(record)
    }

    /// Read every record of a table in id order
    pub(crate) fn scan<T: DeserializeOwned>(
        &self,
        table_def: RecordTable,
    ) -> Result<Vec<T>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(table_def)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            records.push(decode(value.value())?);
        }

        Ok(records)
    }

    /// Resolve a unique index entry to an id
    pub(crate) fn lookup(&self, index: UniqueIndex, key: &str) -> Result<Option<u64>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(index)?;
        let id = table.get(key)?.map(|v| v.value());
        Ok(id)
    }
}

/// One redb write transaction. Every read and write of a borrow or return
/// goes through a single `UnitOfWork`, and redb admits one writer at a time.
pub struct UnitOfWork {
    txn: WriteTransaction,
}

impl UnitOfWork {
    pub fn commit(self) -> Result<(), DatabaseError> {
        self.txn.commit()?;
        Ok(())
    }

    /// Allocate the next id of a named sequence (first id is 1)
    pub(crate) fn next_id(&self, sequence: &str) -> Result<u64, DatabaseError> {
        let mut table = self.txn.open_table(SEQUENCES)?;
        let current = table.get(sequence)?.map(|v| v.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(sequence, next)?;
        Ok(next)
    }

    pub(crate) fn load<T: DeserializeOwned>(
        &self,
        table_def: RecordTable,
        id: u64,
    ) -> Result<Option<T>, DatabaseError> {
        let table = self.txn.open_table(table_def)?;
        let record = match table.get(id)? {
            Some(data) => Some(decode(data.value())?),
            None => None,
        };
        Ok(record)
    }

    pub(crate) fn store<T: Serialize>(
        &self,
        table_def: RecordTable,
        id: u64,
        record: &T,
    ) -> Result<(), DatabaseError> {
        let mut table = self.txn.open_table(table_def)?;
        let data = encode(record)?;
        table.insert(id, data.as_slice())?;
        Ok(())
    }

    pub(crate) fn delete(&self, table_def: RecordTable, id: u64) -> Result<bool, DatabaseError> {
        let mut table = self.txn.open_table(table_def)?;
        let removed = table.remove(id)?.is_some();
        Ok(removed)
    }

    pub(crate) fn open_loans(&self) -> Result<Table<'_, (u64, u64), u64>, DatabaseError> {
        Ok(self.txn.open_table(OPEN_LOANS)?)
    }

    pub(crate) fn count(&self, table_def: RecordTable) -> Result<u64, DatabaseError> {
        let table = self.txn.open_table(table_def)?;
        Ok(table.len()?)
    }

    pub(crate) fn lookup(&self, index: UniqueIndex, key: &str) -> Result<Option<u64>, DatabaseError> {
        let table = self.txn.open_table(index)?;
        let id = table.get(key)?.map(|v| v.value());
        Ok(id)
    }

    pub(crate) fn link(&self, index: UniqueIndex, key: &str, id: u64) -> Result<(), DatabaseError> {
        let mut table = self.txn.open_table(index)?;
        table.insert(key, id)?;
        Ok(())
    }

    pub(crate) fn unlink(&self, index: UniqueIndex, key: &str) -> Result<(), DatabaseError> {
        let mut table = self.txn.open_table(index)?;
        table.remove(key)?;
        Ok(())
    }

    /// Claim `key` in a unique index for `id`. Returns false if another id holds it.
    pub(crate) fn claim(&self, index: UniqueIndex, key: &str, id: u64) -> Result<bool, DatabaseError> {
        match self.lookup(index, key)? {
            Some(owner) if owner != id => Ok(false),
            Some(_) => Ok(true),
            None => {
                self.link(index, key, id)?;
                Ok(true)
            }
        }
    }
}

pub(crate) fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, DatabaseError> {
    Ok(rmp_serde::to_vec_named(record)?)
}

pub(crate) fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, DatabaseError> {
    Ok(rmp_serde::from_slice(data)?)
}

/// Emails are unique case-insensitively.
pub(crate) fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}
